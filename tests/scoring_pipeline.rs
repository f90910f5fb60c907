use chrono::{TimeZone, Utc};
use std::time::Duration;

use shorts_pipeline::scoring::virality::{
    FACTOR_CONSENSUS, FACTOR_DISCUSSION, FACTOR_ENGAGEMENT, FACTOR_NARRATIVE, FACTOR_RECENCY,
};
use shorts_pipeline::scoring::{NarrativeBonus, ScorerWeights, MAX_SCORE};
use shorts_pipeline::{
    normalize, score, ConfigError, FeatureWeights, NarrativeKind, NarrativeTag, NormalizedFeatures,
    PipelineConfig, ReferenceScale, ScoreTier, ThreadRecord, ViralityScorer,
};

const HALF_LIFE: Duration = Duration::from_secs(48 * 3600);

fn tag(kind: NarrativeKind) -> NarrativeTag {
    NarrativeTag {
        kind,
        confidence: 0.8,
    }
}

fn features(values: [f64; 4]) -> NormalizedFeatures {
    NormalizedFeatures::new(values[0], values[1], values[2], values[3])
}

#[test]
fn default_weights_cover_the_subtotal() {
    let scorer = ViralityScorer::default();
    let full = scorer.score(&features([1.0; 4]), &NarrativeTag::unknown());
    assert_eq!(full.total, 16.0);

    let best = scorer.score(&features([1.0; 4]), &tag(NarrativeKind::Storytelling));
    assert_eq!(best.total, MAX_SCORE);
    assert_eq!(best.tier(), ScoreTier::Breakout);
}

#[test]
fn total_stays_in_range_and_matches_breakdown() {
    let scorer = ViralityScorer::default();
    let samples = [0.0, 0.13, 0.5, 0.77, 1.0];
    for &a in &samples {
        for &b in &samples {
            for kind in NarrativeKind::ALL {
                let result = scorer.score(&features([a, b, 1.0 - a, b * 0.5]), &tag(kind));
                assert!((0.0..=MAX_SCORE).contains(&result.total));
                let sum: f64 = result.breakdown.values().sum();
                assert!((sum - result.total).abs() <= 0.05, "{sum} vs {}", result.total);
                assert_eq!(result.breakdown.len(), 5);
            }
        }
    }
}

#[test]
fn total_is_monotone_in_every_feature() {
    let scorer = ViralityScorer::default();
    let tag = tag(NarrativeKind::Debate);
    let base = [0.2, 0.4, 0.6, 0.3];

    for field in 0..4 {
        let mut previous = f64::MIN;
        for step in 0..=10 {
            let mut values = base;
            values[field] = step as f64 / 10.0;
            let total = scorer.score(&features(values), &tag).total;
            assert!(total >= previous, "field {field} decreased at step {step}");
            previous = total;
        }
    }
}

#[test]
fn breakdown_names_every_factor() {
    let result = ViralityScorer::default().score(
        &features([0.5, 0.5, 0.5, 0.5]),
        &tag(NarrativeKind::Informational),
    );
    assert_eq!(result.contribution(FACTOR_ENGAGEMENT), 3.0);
    assert_eq!(result.contribution(FACTOR_DISCUSSION), 2.5);
    assert_eq!(result.contribution(FACTOR_CONSENSUS), 1.5);
    assert_eq!(result.contribution(FACTOR_RECENCY), 1.0);
    assert_eq!(result.contribution(FACTOR_NARRATIVE), 2.0);
    assert_eq!(result.total, 10.0);
    assert_eq!(result.tier(), ScoreTier::Moderate);
}

#[test]
fn unknown_tag_gets_no_bonus() {
    let scorer = ViralityScorer::default();
    assert_eq!(scorer.narrative_bonus(NarrativeKind::Unknown), 0.0);
    let result = scorer.score(&features([0.0; 4]), &NarrativeTag::unknown());
    assert_eq!(result.total, 0.0);
}

#[test]
fn popular_story_scores_above_fifteen() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let thread = ThreadRecord::new("big", "tifu", "A very popular story")
        .with_engagement(50_000, 3_000, Some(0.97))
        .with_created_at("2024-04-20T12:00:00Z");

    let reference = ReferenceScale::fixed(50_000, 5_000);
    let normalized = normalize(&thread, &reference, HALF_LIFE, now);
    let result = score(
        &ViralityScorer::default(),
        &normalized,
        &tag(NarrativeKind::Storytelling),
    );
    assert!(result.total > 15.0, "got {}", result.total);
}

#[test]
fn weights_must_sum_to_sixteen() {
    let err = FeatureWeights::new(8.0, 6.0, 4.0, 2.0).unwrap_err();
    assert!(matches!(err, ConfigError::WeightSum { actual, .. } if (actual - 20.0).abs() < 1e-9));

    assert!(matches!(
        FeatureWeights::new(-1.0, 9.0, 6.0, 2.0),
        Err(ConfigError::InvalidWeight { factor: "engagement_intensity", .. })
    ));
    assert!(FeatureWeights::new(4.0, 4.0, 4.0, 4.0).is_ok());
}

#[test]
fn custom_weights_shift_contributions() {
    let weights = FeatureWeights::new(16.0, 0.0, 0.0, 0.0).unwrap();
    let scorer = ViralityScorer::new(weights, NarrativeBonus::default());
    let result = scorer.score(&features([0.25, 1.0, 1.0, 1.0]), &NarrativeTag::unknown());
    assert_eq!(result.total, 4.0);
}

#[test]
fn config_with_bad_weights_fails_validation() {
    let config = PipelineConfig {
        scorer_weights: ScorerWeights {
            engagement_intensity: 8.0,
            discussion_density: 6.0,
            consensus_strength: 4.0,
            recency_decay: 2.0,
        },
        ..PipelineConfig::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::WeightSum { .. })));
}
