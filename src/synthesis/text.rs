use regex::Regex;
use std::sync::OnceLock;

struct Cleaners {
    url: Regex,
    link: Regex,
    bold: Regex,
    italic: Regex,
    whitespace: Regex,
    edit_note: Regex,
}

fn cleaners() -> &'static Cleaners {
    static CLEANERS: OnceLock<Cleaners> = OnceLock::new();
    CLEANERS.get_or_init(|| Cleaners {
        url: Regex::new(r"https?://\S+").expect("valid url pattern"),
        link: Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("valid link pattern"),
        bold: Regex::new(r"\*\*(.*?)\*\*").expect("valid bold pattern"),
        italic: Regex::new(r"\*(.*?)\*").expect("valid italic pattern"),
        whitespace: Regex::new(r"\s+").expect("valid whitespace pattern"),
        edit_note: Regex::new(r"(?i)\b(edit|update)\s*\d*\s*:.*$")
            .expect("valid edit pattern"),
    })
}

/// Strips platform formatting so the text reads cleanly aloud: markdown
/// links keep their label, bare URLs and trailing edit notes are dropped,
/// whitespace is collapsed.
pub fn clean_text(text: &str) -> String {
    let text = strip_markup(text);
    cleaners().edit_note.replace_all(&text, "").trim().to_string()
}

/// Like [`clean_text`] but keeps `Edit:`/`Update:` prefixes, which in a
/// title carry the headline rather than an afterthought.
pub fn clean_title(title: &str) -> String {
    strip_markup(title).trim().to_string()
}

fn strip_markup(text: &str) -> String {
    let cleaners = cleaners();
    let text = cleaners.link.replace_all(text, "$1");
    let text = cleaners.url.replace_all(&text, "");
    let text = cleaners.bold.replace_all(&text, "$1");
    let text = cleaners.italic.replace_all(&text, "$1");
    cleaners.whitespace.replace_all(&text, " ").into_owned()
}

/// Splits on `.`, `!` or `?` runs followed by whitespace or end of text.
/// Closing quotes and brackets stay with the sentence they end.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut idx = 0;

    while idx < chars.len() {
        let ch = chars[idx];
        current.push(ch);
        idx += 1;

        if !matches!(ch, '.' | '!' | '?') {
            continue;
        }
        while idx < chars.len()
            && matches!(chars[idx], '.' | '!' | '?' | '"' | '\'' | ')' | '\u{201d}')
        {
            current.push(chars[idx]);
            idx += 1;
        }
        if idx == chars.len() || chars[idx].is_whitespace() {
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);
    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Result of fitting sentences into a character budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Condensed {
    pub sentences: Vec<String>,
    pub truncated: bool,
}

impl Condensed {
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn render(&self, marker: &str) -> String {
        join_with_marker(&self.sentences, self.truncated, marker)
    }
}

pub fn join_with_marker(sentences: &[String], truncated: bool, marker: &str) -> String {
    let mut text = sentences.join(" ");
    if truncated && !marker.is_empty() && !text.is_empty() {
        text.push(' ');
        text.push_str(marker);
    }
    text
}

/// Keeps the longest prefix of whole sentences that fits in `budget`
/// characters, reserving room for `marker` when anything is dropped.
///
/// When not even the first sentence fits, it is cut at the last word
/// boundary inside the budget.
pub fn condense(sentences: &[String], budget: usize, marker: &str) -> Condensed {
    let full: usize = joined_len(sentences);
    if full <= budget {
        return Condensed {
            sentences: sentences.to_vec(),
            truncated: false,
        };
    }

    let reserve = if marker.is_empty() { 0 } else { char_len(marker) + 1 };
    let available = budget.saturating_sub(reserve);

    let mut kept = Vec::new();
    let mut used = 0usize;
    for sentence in sentences {
        let extra = char_len(sentence) + usize::from(!kept.is_empty());
        if used + extra > available {
            break;
        }
        used += extra;
        kept.push(sentence.clone());
    }

    if kept.is_empty() {
        if let Some(first) = sentences.first() {
            let cut = cut_at_word(first, available);
            if !cut.is_empty() {
                kept.push(cut);
            }
        }
    }

    Condensed {
        sentences: kept,
        truncated: true,
    }
}

fn joined_len(sentences: &[String]) -> usize {
    let chars: usize = sentences.iter().map(|sentence| char_len(sentence)).sum();
    chars + sentences.len().saturating_sub(1)
}

fn cut_at_word(text: &str, limit: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for word in text.split_whitespace() {
        let extra = char_len(word) + usize::from(!out.is_empty());
        if used + extra > limit {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
        used += extra;
    }
    out
}

/// Index after which the interrupt goes: the sentence boundary whose offset
/// is closest to the body's midpoint. Earlier boundaries win ties.
pub fn midpoint_boundary(sentences: &[String]) -> usize {
    if sentences.len() <= 1 {
        return sentences.len();
    }
    let total = joined_len(sentences) as f64;
    let target = total / 2.0;

    let mut best = 1usize;
    let mut best_distance = f64::MAX;
    let mut offset = 0usize;
    for (idx, sentence) in sentences.iter().enumerate().take(sentences.len() - 1) {
        offset += char_len(sentence) + usize::from(idx > 0);
        let distance = (offset as f64 - target).abs();
        if distance < best_distance {
            best_distance = distance;
            best = idx + 1;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn clean_text_strips_platform_formatting() {
        let raw = "So **this** happened. See [my post](https://example.com/x) \
                   and https://foo.bar/baz\n\n*really*.   Edit: thanks for the gold!";
        assert_eq!(clean_text(raw), "So this happened. See my post and really.");
    }

    #[test]
    fn clean_title_keeps_update_prefix() {
        let title = "UPDATE: **My landlord** finally fixed   the heating";
        assert_eq!(clean_title(title), "UPDATE: My landlord finally fixed the heating");
        assert_eq!(clean_text(title), "");
    }

    #[test]
    fn split_sentences_keeps_terminal_punctuation() {
        let sentences = split_sentences("It began at 3.5 miles. Then what?! He said \"no.\" Done");
        assert_eq!(
            sentences,
            owned(&["It began at 3.5 miles.", "Then what?!", "He said \"no.\"", "Done"])
        );
    }

    #[test]
    fn condense_keeps_everything_within_budget() {
        let sentences = owned(&["One.", "Two."]);
        let condensed = condense(&sentences, 20, "...");
        assert!(!condensed.truncated);
        assert_eq!(condensed.render("..."), "One. Two.");
    }

    #[test]
    fn condense_never_cuts_mid_sentence() {
        let sentences = owned(&["First sentence here.", "Second sentence is longer.", "Third."]);
        let condensed = condense(&sentences, 30, "...");
        assert!(condensed.truncated);
        assert_eq!(condensed.sentences, owned(&["First sentence here."]));
        let rendered = condensed.render("...");
        assert_eq!(rendered, "First sentence here. ...");
        assert!(char_len(&rendered) <= 30);
    }

    #[test]
    fn condense_falls_back_to_word_boundary_for_giant_sentence() {
        let sentences = owned(&["alpha beta gamma delta epsilon zeta eta theta."]);
        let condensed = condense(&sentences, 20, "...");
        assert_eq!(condensed.sentences, owned(&["alpha beta gamma"]));
        assert!(char_len(&condensed.render("...")) <= 20);
    }

    #[test]
    fn midpoint_prefers_balanced_split() {
        let sentences = owned(&["aaaa.", "bbbb.", "cccc.", "dddd."]);
        assert_eq!(midpoint_boundary(&sentences), 2);
        assert_eq!(midpoint_boundary(&owned(&["only."])), 1);
    }
}
