/// Lexical and structural measurements the narrative rules read from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextSignals {
    pub body_chars: usize,
    pub body_words: usize,
    pub first_person: usize,
    pub past_markers: usize,
    pub confession_hits: usize,
    pub title_is_question: bool,
    pub title_polarizing: bool,
    pub comment_words: usize,
    pub comment_negations: usize,
    pub enumerated_lines: usize,
    pub factual_hits: usize,
    pub community: String,
}

const FIRST_PERSON: &[&str] = &[
    "i", "me", "my", "mine", "myself", "i'm", "i've", "i'd", "i'll", "im", "ive", "we", "us",
    "our", "ours", "ourselves", "we're", "we've",
];

const PAST_MARKERS: &[&str] = &[
    "was", "were", "had", "did", "said", "told", "went", "got", "found", "decided", "realized",
    "started", "thought", "knew", "came", "left", "asked", "saw", "took", "made", "happened",
    "tried", "ended", "turned", "called", "walked", "yelled", "began", "felt", "heard",
];

const CONFESSION_PHRASES: &[&str] = &[
    "never told anyone",
    "confess",
    "i have to admit",
    "i admit",
    "aita",
    "am i the asshole",
    "wibta",
    "would i be the asshole",
    "tifu",
    "i lied",
    "been hiding",
    "my secret",
    "nobody knows",
    "throwaway",
];

const POLARIZING_PHRASES: &[&str] = &[
    "unpopular opinion",
    "hot take",
    "cmv",
    "change my view",
    "overrated",
    "underrated",
    " vs ",
    " vs. ",
    "versus",
    "controversial",
    "debate",
    "better than",
    "worst",
];

const INTERROGATIVES: &[&str] = &[
    "should", "is", "are", "do", "does", "did", "would", "will", "can", "could", "why", "how",
    "what", "which", "who", "am", "was", "were",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nope", "nah", "wrong", "disagree", "nobody", "nothing", "don't",
    "dont", "doesn't", "doesnt", "isn't", "isnt", "aren't", "arent", "wasn't", "wasnt", "can't",
    "cant", "won't", "wont", "shouldn't", "wouldn't", "didn't", "didnt",
];

const FACTUAL_WORDS: &[&str] = &[
    "fact", "facts", "study", "studies", "research", "researchers", "according", "evidence",
    "percent", "data", "source", "sources", "scientists", "discovered", "statistics", "til",
];

impl TextSignals {
    pub fn extract(title: &str, body: &str, comments: &[String], community: &str) -> Self {
        let title_lower = normalize_quotes(&title.to_lowercase());
        let body_lower = normalize_quotes(&body.to_lowercase());

        let body_tokens = tokenize(&body_lower);
        let first_person = body_tokens
            .iter()
            .filter(|token| FIRST_PERSON.contains(&token.as_str()))
            .count();
        let past_markers = body_tokens
            .iter()
            .filter(|token| is_past_marker(token))
            .count();

        let framing = format!(" {} {} ", title_lower, body_lower);
        let confession_hits = CONFESSION_PHRASES
            .iter()
            .filter(|phrase| framing.contains(*phrase))
            .count();

        let title_tokens = tokenize(&title_lower);
        let title_is_question = title_lower.trim_end().ends_with('?')
            || title_tokens
                .first()
                .map(|first| INTERROGATIVES.contains(&first.as_str()))
                .unwrap_or(false);
        let padded_title = format!(" {} ", title_lower);
        let title_polarizing = POLARIZING_PHRASES
            .iter()
            .any(|phrase| padded_title.contains(phrase));

        let mut comment_words = 0usize;
        let mut comment_negations = 0usize;
        for comment in comments {
            let tokens = tokenize(&normalize_quotes(&comment.to_lowercase()));
            comment_words += tokens.len();
            comment_negations += tokens
                .iter()
                .filter(|token| NEGATIONS.contains(&token.as_str()))
                .count();
        }

        let enumerated_lines = body.lines().filter(|line| is_enumerated(line)).count();
        let factual_hits = body_tokens
            .iter()
            .chain(title_tokens.iter())
            .filter(|token| FACTUAL_WORDS.contains(&token.as_str()))
            .count();

        Self {
            body_chars: body.trim().chars().count(),
            body_words: body_tokens.len(),
            first_person,
            past_markers,
            confession_hits,
            title_is_question,
            title_polarizing,
            comment_words,
            comment_negations,
            enumerated_lines,
            factual_hits,
            community: community.trim().trim_start_matches("r/").to_lowercase(),
        }
    }

    pub fn first_person_density(&self) -> f64 {
        if self.body_words == 0 {
            return 0.0;
        }
        self.first_person as f64 / self.body_words as f64
    }

    pub fn negation_density(&self) -> f64 {
        if self.comment_words == 0 {
            return 0.0;
        }
        self.comment_negations as f64 / self.comment_words as f64
    }
}

fn normalize_quotes(text: &str) -> String {
    text.replace(['\u{2019}', '\u{2018}'], "'")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !(ch.is_alphanumeric() || ch == '\''))
        .map(|token| token.trim_matches('\''))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_past_marker(token: &str) -> bool {
    if PAST_MARKERS.contains(&token) {
        return true;
    }
    token.len() >= 5 && token.ends_with("ed") && token.chars().all(|ch| ch.is_alphabetic())
}

fn is_enumerated(line: &str) -> bool {
    let trimmed = line.trim_start();
    if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("\u{2022}") {
        return true;
    }
    let digits = trimmed.chars().take_while(|ch| ch.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return false;
    }
    matches!(trimmed[digits..].chars().next(), Some('.') | Some(')'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_first_person_and_past_markers() {
        let signals = TextSignals::extract(
            "title",
            "I walked in and my boss said I was fired.",
            &[],
            "r/TIFU",
        );
        assert_eq!(signals.first_person, 3);
        // walked, said, was, fired
        assert_eq!(signals.past_markers, 4);
        assert_eq!(signals.community, "tifu");
    }

    #[test]
    fn detects_question_titles() {
        let question = TextSignals::extract("Should tipping be banned", "", &[], "");
        let statement = TextSignals::extract("Tipping is fine.", "", &[], "");
        assert!(question.title_is_question);
        assert!(!statement.title_is_question);
    }

    #[test]
    fn enumerated_lines_accept_common_markers() {
        let body = "Things:\n1. one\n2) two\n- three\n* four\n\u{2022} five\n2024 was odd";
        let signals = TextSignals::extract("", body, &[], "");
        assert_eq!(signals.enumerated_lines, 5);
    }

    #[test]
    fn negation_density_spans_all_comments() {
        let comments = vec!["no way".to_string(), "that is not right".to_string()];
        let signals = TextSignals::extract("", "", &comments, "");
        assert_eq!(signals.comment_words, 6);
        assert_eq!(signals.comment_negations, 2);
    }

    #[test]
    fn curly_apostrophes_are_normalized() {
        let signals = TextSignals::extract("", "I\u{2019}ve never been here", &[], "");
        assert_eq!(signals.first_person, 1);
    }
}
