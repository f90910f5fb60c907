//! Script synthesis: hook, condensed body, pattern interrupt and
//! call-to-action assembled under a hard character ceiling.

pub mod templates;
pub mod text;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::classify::{NarrativeKind, NarrativeTag};
use crate::config::{PipelineConfig, GENERIC_POOL};
use crate::error::{ConfigError, SynthesisError};
use crate::scoring::ViralityScore;
use crate::thread::ThreadRecord;

use templates::{pick, placeholders_in, seeded_rng, HookContext, PLACEHOLDERS};
use text::{
    char_len, clean_text, clean_title, condense, join_with_marker, midpoint_boundary,
    split_sentences,
};

const SEPARATOR: &str = "\n\n";
/// Narration pace used for duration estimates.
const WORDS_PER_SECOND: f64 = 3.0;
/// Comments at or under this length are reactions, not narration.
const MIN_COMMENT_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortBodyPolicy {
    /// Report `SynthesisSkipped` for bodies under `min_body_length`.
    Skip,
    /// Produce the script but mark it low-confidence.
    Flag,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub body_budget: usize,
    pub top_comment_count: usize,
    pub continuation_marker: String,
    pub short_body_policy: ShortBodyPolicy,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            body_budget: 320,
            top_comment_count: 2,
            continuation_marker: "...".to_string(),
            short_body_policy: ShortBodyPolicy::Flag,
        }
    }
}

/// Validated template pools and limits.
#[derive(Debug, Clone)]
pub struct SynthesisSettings {
    generic_hooks: Vec<String>,
    hooks_by_tag: HashMap<NarrativeKind, Vec<String>>,
    interrupts: Vec<String>,
    ctas: Vec<String>,
    ctas_by_tag: HashMap<NarrativeKind, Vec<String>>,
    pub max_script_length: usize,
    pub min_body_length: usize,
    pub body_budget: usize,
    pub top_comment_count: usize,
    pub continuation_marker: String,
    pub short_body_policy: ShortBodyPolicy,
}

impl SynthesisSettings {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let mut generic_hooks = Vec::new();
        let mut hooks_by_tag = HashMap::new();
        for (key, pool) in &config.hook_templates {
            let pool = clean_pool(pool);
            for template in &pool {
                check_placeholders(template)?;
            }
            if key.eq_ignore_ascii_case(GENERIC_POOL) {
                generic_hooks = pool;
                continue;
            }
            let kind = NarrativeKind::from_str(key)
                .ok_or_else(|| ConfigError::UnknownTag(key.clone()))?;
            if !pool.is_empty() {
                hooks_by_tag.insert(kind, pool);
            }
        }
        if generic_hooks.is_empty() {
            return Err(ConfigError::EmptyPool(GENERIC_POOL.to_string()));
        }

        let interrupts = clean_pool(&config.pattern_interrupt_pool);
        if interrupts.is_empty() {
            return Err(ConfigError::EmptyPool("pattern_interrupt_pool".to_string()));
        }
        let ctas = clean_pool(&config.cta_pool);
        if ctas.is_empty() {
            return Err(ConfigError::EmptyPool("cta_pool".to_string()));
        }

        let mut ctas_by_tag = HashMap::new();
        for (key, pool) in &config.cta_by_tag {
            let kind = NarrativeKind::from_str(key)
                .ok_or_else(|| ConfigError::UnknownTag(key.clone()))?;
            let pool = clean_pool(pool);
            if !pool.is_empty() {
                ctas_by_tag.insert(kind, pool);
            }
        }

        if config.max_script_length == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_script_length",
                reason: "must be positive".to_string(),
            });
        }
        let continuation_marker = config.synthesis.continuation_marker.trim().to_string();
        // A truncated body needs room for at least one character plus " <marker>".
        let marker_room = match char_len(&continuation_marker) {
            0 => 0,
            len => len + 1,
        };
        if config.synthesis.body_budget <= marker_room {
            return Err(ConfigError::InvalidValue {
                field: "synthesis.body_budget",
                reason: format!(
                    "must exceed {marker_room} to fit the continuation marker {:?}",
                    continuation_marker
                ),
            });
        }

        Ok(Self {
            generic_hooks,
            hooks_by_tag,
            interrupts,
            ctas,
            ctas_by_tag,
            max_script_length: config.max_script_length,
            min_body_length: config.min_body_length,
            body_budget: config.synthesis.body_budget,
            top_comment_count: config.synthesis.top_comment_count,
            continuation_marker,
            short_body_policy: config.synthesis.short_body_policy,
        })
    }

    fn hook_pool(&self, kind: NarrativeKind) -> &[String] {
        self.hooks_by_tag
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&self.generic_hooks)
    }

    fn cta_pool(&self, kind: NarrativeKind) -> &[String] {
        self.ctas_by_tag
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&self.ctas)
    }
}

fn clean_pool(pool: &[String]) -> Vec<String> {
    pool.iter()
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

fn check_placeholders(template: &str) -> Result<(), ConfigError> {
    for placeholder in placeholders_in(template) {
        if !PLACEHOLDERS.contains(&placeholder.as_str()) {
            return Err(ConfigError::UnknownPlaceholder {
                template: template.to_string(),
                placeholder,
            });
        }
    }
    Ok(())
}

/// A finished script. Never mutated; a later run produces a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRecord {
    pub source_thread_id: String,
    pub narrative: NarrativeKind,
    pub hook: String,
    pub body: String,
    pub pattern_interrupt: String,
    pub cta: String,
    pub full_text: String,
    pub score: f64,
    /// Set when the body was shorter than `min_body_length` under the `flag` policy.
    pub low_confidence: bool,
    pub word_count: usize,
    pub character_count: usize,
    pub estimated_duration_seconds: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    EmptyBody,
    BodyTooShort { length: usize, minimum: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptyBody => write!(f, "body is empty, nothing to narrate"),
            SkipReason::BodyTooShort { length, minimum } => {
                write!(f, "body has {length} characters, minimum is {minimum}")
            }
        }
    }
}

/// Policy outcome distinct from both success and failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisSkipped {
    pub thread_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    Script(ScriptRecord),
    Skipped(SynthesisSkipped),
}

impl SynthesisOutcome {
    pub fn script(&self) -> Option<&ScriptRecord> {
        match self {
            SynthesisOutcome::Script(record) => Some(record),
            SynthesisOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SynthesisOutcome::Skipped(_))
    }
}

pub fn synthesize(
    thread: &ThreadRecord,
    tag: &NarrativeTag,
    score: &ViralityScore,
    settings: &SynthesisSettings,
) -> Result<SynthesisOutcome, SynthesisError> {
    let body = clean_text(&thread.body_text);
    if body.is_empty() {
        return Ok(skipped(thread, SkipReason::EmptyBody));
    }

    let body_length = char_len(&body);
    let low_confidence = body_length < settings.min_body_length;
    if low_confidence && settings.short_body_policy == ShortBodyPolicy::Skip {
        return Ok(skipped(
            thread,
            SkipReason::BodyTooShort {
                length: body_length,
                minimum: settings.min_body_length,
            },
        ));
    }

    let title = clean_title(&thread.title);
    let context = HookContext::from_thread(thread, &title);
    let hook = fill_hook(settings, tag.kind, &context, &thread.id).ok_or_else(|| {
        SynthesisError::EmptyHook {
            thread_id: thread.id.clone(),
        }
    })?;
    let pattern_interrupt = pick(&settings.interrupts, &mut seeded_rng(&thread.id, "interrupt"))
        .unwrap_or_default()
        .to_string();
    let cta = pick(settings.cta_pool(tag.kind), &mut seeded_rng(&thread.id, "cta"))
        .unwrap_or_default()
        .to_string();

    let mut source = split_sentences(&body);
    let comments = thread
        .top_comments
        .iter()
        .map(|comment| clean_text(comment))
        .filter(|comment| char_len(comment) > MIN_COMMENT_CHARS)
        .take(settings.top_comment_count);
    for comment in comments {
        source.extend(split_sentences(&comment));
    }

    let marker = settings.continuation_marker.as_str();
    let fixed = char_len(&hook)
        + char_len(&pattern_interrupt)
        + char_len(&cta)
        + 4 * char_len(SEPARATOR);

    let mut condensed = condense(&source, settings.body_budget, marker);
    let mut assembled = assemble(
        &hook,
        &condensed.sentences,
        condensed.truncated,
        &pattern_interrupt,
        &cta,
        marker,
    );

    if char_len(&assembled) > settings.max_script_length {
        let available = settings
            .max_script_length
            .checked_sub(fixed)
            .filter(|available| *available > 0)
            .ok_or(SynthesisError::ScriptOverflow {
                max: settings.max_script_length,
                fixed,
            })?;
        debug!(
            thread_id = %thread.id,
            budget = available.min(settings.body_budget),
            "re-condensing body to fit script ceiling"
        );
        condensed = condense(&source, available.min(settings.body_budget), marker);
        assembled = assemble(
            &hook,
            &condensed.sentences,
            condensed.truncated,
            &pattern_interrupt,
            &cta,
            marker,
        );
    }

    if condensed.is_empty() || char_len(&assembled) > settings.max_script_length {
        return Err(SynthesisError::ScriptOverflow {
            max: settings.max_script_length,
            fixed,
        });
    }

    let word_count = assembled.split_whitespace().count();
    Ok(SynthesisOutcome::Script(ScriptRecord {
        source_thread_id: thread.id.clone(),
        narrative: tag.kind,
        hook,
        body: condensed.render(marker),
        pattern_interrupt,
        cta,
        character_count: char_len(&assembled),
        full_text: assembled,
        score: score.total,
        low_confidence,
        word_count,
        estimated_duration_seconds: word_count as f64 / WORDS_PER_SECOND,
        generated_at: Utc::now(),
    }))
}

/// Fills the seeded pick from the tag's pool. A template that renders empty,
/// such as `{title}` on a title that was only a link, falls back to the first
/// generic template that renders text.
fn fill_hook(
    settings: &SynthesisSettings,
    kind: NarrativeKind,
    context: &HookContext,
    thread_id: &str,
) -> Option<String> {
    let render = |template: &str| {
        let hook = context.fill(template).trim().to_string();
        (!hook.is_empty()).then_some(hook)
    };
    pick(settings.hook_pool(kind), &mut seeded_rng(thread_id, "hook"))
        .and_then(|template| render(template))
        .or_else(|| {
            settings
                .generic_hooks
                .iter()
                .find_map(|template| render(template.as_str()))
        })
}

fn skipped(thread: &ThreadRecord, reason: SkipReason) -> SynthesisOutcome {
    SynthesisOutcome::Skipped(SynthesisSkipped {
        thread_id: thread.id.clone(),
        reason,
    })
}

/// Hook, first half of the body, interrupt, second half, call-to-action.
fn assemble(
    hook: &str,
    sentences: &[String],
    truncated: bool,
    interrupt: &str,
    cta: &str,
    marker: &str,
) -> String {
    let split = midpoint_boundary(sentences);
    let (before, after) = sentences.split_at(split);

    let mut parts: Vec<String> = vec![hook.to_string()];
    if after.is_empty() {
        parts.push(join_with_marker(before, truncated, marker));
        parts.push(interrupt.to_string());
    } else {
        parts.push(before.join(" "));
        parts.push(interrupt.to_string());
        parts.push(join_with_marker(after, truncated, marker));
    }
    parts.push(cta.to_string());
    parts.retain(|part| !part.is_empty());
    parts.join(SEPARATOR)
}
