//! Rule-based narrative classification.
//!
//! Rules run in a fixed priority order and the first one whose confidence
//! clears its threshold wins. A lower-priority rule never overrides a
//! higher-priority match, whatever its confidence.

pub mod signals;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::clamp01;
use crate::error::ConfigError;
use crate::thread::ThreadRecord;

pub use signals::TextSignals;

const STORY_COMMUNITIES: &[&str] = &[
    "tifu",
    "amitheasshole",
    "maliciouscompliance",
    "prorevenge",
    "pettyrevenge",
    "entitledparents",
    "relationship_advice",
];

const FACT_COMMUNITIES: &[&str] = &[
    "todayilearned",
    "science",
    "explainlikeimfive",
    "askscience",
    "youshouldknow",
    "lifeprotips",
];

const COMMUNITY_HINT: f64 = 0.2;
/// Above this share of first-person tokens a post is personal, not informational.
const INFORMATIONAL_MAX_FIRST_PERSON: f64 = 0.04;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrativeKind {
    Storytelling,
    Confession,
    Debate,
    Informational,
    Unknown,
}

impl NarrativeKind {
    pub const ALL: [NarrativeKind; 5] = [
        NarrativeKind::Storytelling,
        NarrativeKind::Confession,
        NarrativeKind::Debate,
        NarrativeKind::Informational,
        NarrativeKind::Unknown,
    ];

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "storytelling" | "story" => Some(NarrativeKind::Storytelling),
            "confession" => Some(NarrativeKind::Confession),
            "debate" | "question" => Some(NarrativeKind::Debate),
            "informational" | "fact" => Some(NarrativeKind::Informational),
            "unknown" => Some(NarrativeKind::Unknown),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            NarrativeKind::Storytelling => "storytelling",
            NarrativeKind::Confession => "confession",
            NarrativeKind::Debate => "debate",
            NarrativeKind::Informational => "informational",
            NarrativeKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NarrativeTag {
    pub kind: NarrativeKind,
    pub confidence: f64,
}

impl NarrativeTag {
    pub fn unknown() -> Self {
        Self {
            kind: NarrativeKind::Unknown,
            confidence: 0.0,
        }
    }
}

impl Default for NarrativeTag {
    fn default() -> Self {
        Self::unknown()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub storytelling_threshold: f64,
    pub confession_threshold: f64,
    pub debate_threshold: f64,
    pub informational_threshold: f64,
    /// Bodies shorter than this never classify as storytelling.
    pub story_min_body_chars: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            storytelling_threshold: 0.55,
            confession_threshold: 0.5,
            debate_threshold: 0.5,
            informational_threshold: 0.5,
            story_min_body_chars: 200,
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("classifier.storytelling_threshold", self.storytelling_threshold),
            ("classifier.confession_threshold", self.confession_threshold),
            ("classifier.debate_threshold", self.debate_threshold),
            ("classifier.informational_threshold", self.informational_threshold),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("threshold must be within (0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}

type Predicate = fn(&TextSignals, &ClassifierConfig) -> f64;

/// One entry of the priority chain.
struct NarrativeRule {
    kind: NarrativeKind,
    threshold: f64,
    predicate: Predicate,
}

fn rule_chain(config: &ClassifierConfig) -> [NarrativeRule; 4] {
    [
        NarrativeRule {
            kind: NarrativeKind::Storytelling,
            threshold: config.storytelling_threshold,
            predicate: storytelling_confidence,
        },
        NarrativeRule {
            kind: NarrativeKind::Confession,
            threshold: config.confession_threshold,
            predicate: confession_confidence,
        },
        NarrativeRule {
            kind: NarrativeKind::Debate,
            threshold: config.debate_threshold,
            predicate: debate_confidence,
        },
        NarrativeRule {
            kind: NarrativeKind::Informational,
            threshold: config.informational_threshold,
            predicate: informational_confidence,
        },
    ]
}

/// Outcome of a single rule, kept for auditing why a tag was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RuleEvaluation {
    pub kind: NarrativeKind,
    pub confidence: f64,
    pub threshold: f64,
    pub fired: bool,
}

pub fn classify(thread: &ThreadRecord, config: &ClassifierConfig) -> NarrativeTag {
    classify_text(
        &thread.title,
        &thread.body_text,
        &thread.top_comments,
        &thread.source_subcommunity,
        config,
    )
}

pub fn classify_text(
    title: &str,
    body: &str,
    comments: &[String],
    community: &str,
    config: &ClassifierConfig,
) -> NarrativeTag {
    let signals = TextSignals::extract(title, body, comments, community);
    for rule in rule_chain(config) {
        let confidence = clamp01((rule.predicate)(&signals, config));
        if confidence > 0.0 && confidence >= rule.threshold {
            return NarrativeTag {
                kind: rule.kind,
                confidence,
            };
        }
    }
    NarrativeTag::unknown()
}

/// Evaluates every rule without short-circuiting.
pub fn evaluate_rules(thread: &ThreadRecord, config: &ClassifierConfig) -> Vec<RuleEvaluation> {
    let signals = TextSignals::extract(
        &thread.title,
        &thread.body_text,
        &thread.top_comments,
        &thread.source_subcommunity,
    );
    rule_chain(config)
        .iter()
        .map(|rule| {
            let confidence = clamp01((rule.predicate)(&signals, config));
            RuleEvaluation {
                kind: rule.kind,
                confidence,
                threshold: rule.threshold,
                fired: confidence > 0.0 && confidence >= rule.threshold,
            }
        })
        .collect()
}

fn first_person_score(signals: &TextSignals) -> f64 {
    (signals.first_person_density() / 0.04).min(1.0)
}

fn storytelling_confidence(signals: &TextSignals, config: &ClassifierConfig) -> f64 {
    if signals.body_chars < config.story_min_body_chars {
        return 0.0;
    }
    if signals.first_person == 0 || signals.past_markers == 0 {
        return 0.0;
    }
    let past = (signals.past_markers as f64 / 6.0).min(1.0);
    let mut confidence = 0.5 * first_person_score(signals) + 0.5 * past;
    if STORY_COMMUNITIES.contains(&signals.community.as_str()) {
        confidence += COMMUNITY_HINT;
    }
    confidence
}

fn confession_confidence(signals: &TextSignals, _config: &ClassifierConfig) -> f64 {
    if signals.confession_hits == 0 {
        return 0.0;
    }
    0.35 + 0.25 * signals.confession_hits as f64
}

fn debate_confidence(signals: &TextSignals, _config: &ClassifierConfig) -> f64 {
    if !(signals.title_is_question || signals.title_polarizing) {
        return 0.0;
    }
    // Roughly one negation every sixteen words reads as an argument.
    let disagreement = (signals.negation_density() / 0.06).min(1.0);
    0.4 + 0.6 * disagreement
}

fn informational_confidence(signals: &TextSignals, _config: &ClassifierConfig) -> f64 {
    if signals.body_words == 0 {
        return 0.0;
    }
    if signals.first_person_density() > INFORMATIONAL_MAX_FIRST_PERSON {
        return 0.0;
    }
    let listing = (signals.enumerated_lines as f64 / 3.0).min(1.0);
    let factual = (signals.factual_hits as f64 / 3.0).min(1.0);
    let structure = listing.max(factual);
    if structure == 0.0 {
        return 0.0;
    }
    let mut confidence = 0.6 * structure + 0.4 * (1.0 - first_person_score(signals));
    if FACT_COMMUNITIES.contains(&signals.community.as_str()) {
        confidence += COMMUNITY_HINT;
    }
    confidence
}
