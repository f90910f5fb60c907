use shorts_pipeline::classify::evaluate_rules;
use shorts_pipeline::{classify, ClassifierConfig, NarrativeKind, ThreadRecord};

const WEDDING_STORY: &str = "Last summer I went to my cousin's wedding \
and I thought it would be a quiet weekend. \
When we arrived, my aunt told me I had to give a speech. \
I panicked, walked outside, and called my best friend. \
She laughed and said I should just wing it, so I did and it turned into the best night of my life.";

fn story_thread(title: &str) -> ThreadRecord {
    ThreadRecord::new("story", "r/tifu", title).with_body(WEDDING_STORY)
}

#[test]
fn first_person_past_tense_reads_as_storytelling() {
    let tag = classify(&story_thread("The wedding speech"), &ClassifierConfig::default());
    assert_eq!(tag.kind, NarrativeKind::Storytelling);
    assert!(tag.confidence >= 0.55);
}

#[test]
fn storytelling_outranks_a_stronger_confession_signal() {
    let thread = story_thread("AITA for leaving my cousin's wedding? I never told anyone");
    let config = ClassifierConfig::default();

    let evaluations = evaluate_rules(&thread, &config);
    let confession = evaluations
        .iter()
        .find(|evaluation| evaluation.kind == NarrativeKind::Confession)
        .unwrap();
    assert!(confession.fired);

    assert_eq!(classify(&thread, &config).kind, NarrativeKind::Storytelling);
}

#[test]
fn admissions_read_as_confession_at_any_length() {
    let thread = ThreadRecord::new("c1", "r/offmychest", "I never told anyone this")
        .with_body("It still bothers me.");
    let tag = classify(&thread, &ClassifierConfig::default());
    assert_eq!(tag.kind, NarrativeKind::Confession);
    assert!((tag.confidence - 0.6).abs() < 1e-9);
}

#[test]
fn question_with_disagreeing_comments_reads_as_debate() {
    let thread = ThreadRecord::new("d1", "r/food", "Is pineapple on pizza actually good?")
        .with_body("Genuinely curious what people think.")
        .with_comments([
            "No, it is not good and never will be.",
            "Don't listen to them, it is great.",
        ]);
    let tag = classify(&thread, &ClassifierConfig::default());
    assert_eq!(tag.kind, NarrativeKind::Debate);
    assert!((tag.confidence - 1.0).abs() < 1e-9);
}

#[test]
fn question_without_comments_stays_below_default_threshold() {
    let thread = ThreadRecord::new("d2", "r/food", "Is pineapple on pizza actually good?")
        .with_body("Genuinely curious what people think.");
    let tag = classify(&thread, &ClassifierConfig::default());
    assert_eq!(tag.kind, NarrativeKind::Unknown);
    assert_eq!(tag.confidence, 0.0);
}

#[test]
fn listing_of_facts_reads_as_informational() {
    let body = "According to researchers, octopuses have three hearts.\n\
1. Two pump blood to the gills.\n\
2. One pumps it to the rest of the body.\n\
3. The main heart stops when they swim.";
    let thread = ThreadRecord::new("i1", "r/todayilearned", "TIL octopuses have three hearts")
        .with_body(body);
    let tag = classify(&thread, &ClassifierConfig::default());
    assert_eq!(tag.kind, NarrativeKind::Informational);
    assert_eq!(tag.confidence, 1.0);
}

#[test]
fn plain_post_is_unknown() {
    let thread =
        ThreadRecord::new("u1", "r/pics", "Sunset photo").with_body("Took this yesterday.");
    let tag = classify(&thread, &ClassifierConfig::default());
    assert_eq!(tag.kind, NarrativeKind::Unknown);
    assert_eq!(tag.confidence, 0.0);
}

#[test]
fn short_story_body_is_not_storytelling() {
    let thread = ThreadRecord::new("s2", "r/tifu", "Quick one")
        .with_body("I went out and I forgot my keys.");
    assert_ne!(
        classify(&thread, &ClassifierConfig::default()).kind,
        NarrativeKind::Storytelling
    );
}

#[test]
fn classification_is_deterministic() {
    let config = ClassifierConfig::default();
    let thread = story_thread("AITA for leaving early?");
    let first = classify(&thread, &config);
    for _ in 0..20 {
        assert_eq!(classify(&thread, &config), first);
    }
}

#[test]
fn lower_priority_rule_wins_once_storytelling_is_gated_off() {
    let thread = story_thread("I never told anyone about the wedding");
    let config = ClassifierConfig {
        story_min_body_chars: 10_000,
        ..ClassifierConfig::default()
    };

    let evaluations = evaluate_rules(&thread, &config);
    assert_eq!(evaluations[0].kind, NarrativeKind::Storytelling);
    assert!(!evaluations[0].fired);
    assert_eq!(classify(&thread, &config).kind, NarrativeKind::Confession);
}

#[test]
fn first_person_list_is_not_informational() {
    let body = "1. I went to my car.\n2. I drove to my mom.\n3. I told my dad I love him.";
    let thread = ThreadRecord::new("i2", "r/CasualConversation", "My weekend").with_body(body);
    let config = ClassifierConfig::default();

    let informational = evaluate_rules(&thread, &config)
        .into_iter()
        .find(|evaluation| evaluation.kind == NarrativeKind::Informational)
        .unwrap();
    assert_eq!(informational.confidence, 0.0);
    assert!(!informational.fired);
    assert_ne!(classify(&thread, &config).kind, NarrativeKind::Informational);
}
