use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::thread::ThreadRecord;
use crate::{format_number, stable_hash64};

/// Placeholders a hook template may reference.
pub const PLACEHOLDERS: &[&str] = &["title", "subject", "action", "score", "comments", "community"];

/// RNG seeded from the thread id so every selection is reproducible per
/// thread. `salt` keeps the hook, interrupt and CTA draws independent.
pub fn seeded_rng(thread_id: &str, salt: &str) -> StdRng {
    StdRng::seed_from_u64(stable_hash64(&format!("{salt}:{thread_id}")))
}

pub fn pick<'a>(pool: &'a [String], rng: &mut StdRng) -> Option<&'a str> {
    pool.choose(rng).map(String::as_str)
}

/// Names inside `{...}` in a template, in order of appearance.
pub fn placeholders_in(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                names.push(after[..end].to_string());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    names
}

/// Values substituted into hook templates.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub title: String,
    pub subject: String,
    pub action: String,
    pub score: String,
    pub comments: String,
    pub community: String,
}

impl HookContext {
    pub fn from_thread(thread: &ThreadRecord, title: &str) -> Self {
        let (subject, action) = subject_and_action(title);
        Self {
            title: title.trim_end_matches(['.', ' ']).to_string(),
            subject,
            action,
            score: format_number(thread.raw_score.max(0) as f64),
            comments: format_number(thread.comment_count as f64),
            community: thread
                .source_subcommunity
                .trim()
                .trim_start_matches("r/")
                .to_string(),
        }
    }

    pub fn fill(&self, template: &str) -> String {
        template
            .replace("{title}", &self.title)
            .replace("{subject}", &self.subject)
            .replace("{action}", &self.action)
            .replace("{score}", &self.score)
            .replace("{comments}", &self.comments)
            .replace("{community}", &self.community)
    }
}

/// Splits a title into a rough subject and action phrase. First-person
/// titles are narrated in the third person.
fn subject_and_action(title: &str) -> (String, String) {
    let words: Vec<&str> = title.split_whitespace().collect();
    let mut subject = "this person".to_string();
    let mut action = "did something unbelievable".to_string();

    if words.len() >= 3 {
        let first = words[0].to_lowercase();
        if !matches!(first.as_str(), "i" | "my" | "me") && words.len() >= 4 {
            subject = words[..2].join(" ");
        }
        let start = 2.min(words.len() - 1);
        let end = (start + 4).min(words.len());
        action = words[start..end]
            .join(" ")
            .trim_end_matches(['.', '!', '?', ','])
            .to_string();
    }

    (subject, action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_listed_in_order() {
        assert_eq!(
            placeholders_in("{title} got {score} votes in {community"),
            vec!["title".to_string(), "score".to_string()]
        );
    }

    #[test]
    fn first_person_titles_become_third_person() {
        let (subject, action) = subject_and_action("I quit my job today!");
        assert_eq!(subject, "this person");
        assert_eq!(action, "my job today");
    }

    #[test]
    fn short_titles_keep_generic_phrasing() {
        let (subject, action) = subject_and_action("Wow");
        assert_eq!(subject, "this person");
        assert_eq!(action, "did something unbelievable");
    }

    #[test]
    fn hook_context_fills_engagement_numbers() {
        let thread = ThreadRecord::new("t1", "r/tifu", "Landlord secretly changed the locks")
            .with_engagement(48_213, 1_204, None);
        let context = HookContext::from_thread(&thread, &thread.title);
        assert_eq!(
            context.fill("{score} upvotes, {comments} comments on r/{community}"),
            "48,213 upvotes, 1,204 comments on r/tifu"
        );
        assert_eq!(context.fill("{subject}"), "Landlord secretly");
    }

    #[test]
    fn same_thread_draws_same_item() {
        let pool: Vec<String> = (0..20).map(|i| format!("item {i}")).collect();
        let first = pick(&pool, &mut seeded_rng("abc", "hook")).map(str::to_string);
        let second = pick(&pool, &mut seeded_rng("abc", "hook")).map(str::to_string);
        assert_eq!(first, second);
    }
}
