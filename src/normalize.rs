//! Engagement normalization.
//!
//! Heterogeneous counters from the discovery sources are mapped onto four
//! dimensionless features in `[0, 1]`. Nothing here fails: missing or garbled
//! fields fall back to documented defaults and are reported through
//! [`inspect`] instead.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::clamp01;
use crate::error::ConfigError;
use crate::thread::ThreadRecord;

/// Value used when a distribution is degenerate or a ratio is missing.
pub const NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceMode {
    /// Scale against configured ceilings so scores are comparable across runs.
    Fixed,
    /// Scale against the min/max observed in the current batch.
    Batch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub reference: ReferenceMode,
    pub score_ceiling: i64,
    pub comment_ceiling: u64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            reference: ReferenceMode::Fixed,
            score_ceiling: 50_000,
            comment_ceiling: 5_000,
        }
    }
}

impl NormalizerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.score_ceiling <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "normalizer.score_ceiling",
                reason: format!("must be positive, got {}", self.score_ceiling),
            });
        }
        if self.comment_ceiling == 0 {
            return Err(ConfigError::InvalidValue {
                field: "normalizer.comment_ceiling",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Reference distribution for a batch under this configuration.
    pub fn reference_for(&self, threads: &[ThreadRecord]) -> ReferenceScale {
        match self.reference {
            ReferenceMode::Fixed => ReferenceScale::fixed(self.score_ceiling, self.comment_ceiling),
            ReferenceMode::Batch => ReferenceScale::from_batch(threads),
        }
    }
}

/// Bounds used to scale `raw_score` and `comment_count`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceScale {
    pub score_min: f64,
    pub score_max: f64,
    pub comments_min: u64,
    pub comments_max: u64,
}

impl ReferenceScale {
    pub fn fixed(score_ceiling: i64, comment_ceiling: u64) -> Self {
        Self {
            score_min: 0.0,
            score_max: score_ceiling as f64,
            comments_min: 0,
            comments_max: comment_ceiling,
        }
    }

    pub fn from_batch(threads: &[ThreadRecord]) -> Self {
        let mut scale = Self {
            score_min: 0.0,
            score_max: 0.0,
            comments_min: 0,
            comments_max: 0,
        };
        let mut first = true;
        for thread in threads {
            let score = thread.raw_score as f64;
            if first {
                scale.score_min = score;
                scale.score_max = score;
                scale.comments_min = thread.comment_count;
                scale.comments_max = thread.comment_count;
                first = false;
                continue;
            }
            scale.score_min = scale.score_min.min(score);
            scale.score_max = scale.score_max.max(score);
            scale.comments_min = scale.comments_min.min(thread.comment_count);
            scale.comments_max = scale.comments_max.max(thread.comment_count);
        }
        scale
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatures {
    pub engagement_intensity: f64,
    pub discussion_density: f64,
    pub consensus_strength: f64,
    pub recency_decay: f64,
}

impl NormalizedFeatures {
    pub fn new(
        engagement_intensity: f64,
        discussion_density: f64,
        consensus_strength: f64,
        recency_decay: f64,
    ) -> Self {
        Self {
            engagement_intensity: clamp01(engagement_intensity),
            discussion_density: clamp01(discussion_density),
            consensus_strength: clamp01(consensus_strength),
            recency_decay: clamp01(recency_decay),
        }
    }
}

pub fn normalize(
    thread: &ThreadRecord,
    reference: &ReferenceScale,
    half_life: Duration,
    now: DateTime<Utc>,
) -> NormalizedFeatures {
    let engagement_intensity = min_max(
        thread.raw_score as f64,
        reference.score_min,
        reference.score_max,
    );

    let discussion_density = min_max(
        (thread.comment_count as f64).ln_1p(),
        (reference.comments_min as f64).ln_1p(),
        (reference.comments_max as f64).ln_1p(),
    );

    let consensus_strength = match thread.upvote_ratio {
        Some(ratio) if ratio.is_finite() => ratio,
        _ => NEUTRAL,
    };

    let recency_decay = thread
        .created_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|created| recency(created, half_life, now))
        .unwrap_or(0.0);

    NormalizedFeatures::new(
        engagement_intensity,
        discussion_density,
        consensus_strength,
        recency_decay,
    )
}

fn min_max(value: f64, min: f64, max: f64) -> f64 {
    let span = max - min;
    if !span.is_finite() || span.abs() <= f64::EPSILON {
        return NEUTRAL;
    }
    clamp01((value - min) / span)
}

fn recency(created: DateTime<Utc>, half_life: Duration, now: DateTime<Utc>) -> f64 {
    let half_life_secs = half_life.as_secs_f64();
    if half_life_secs <= 0.0 {
        return 0.0;
    }
    let elapsed = (now - created).num_milliseconds() as f64 / 1000.0;
    if elapsed <= 0.0 {
        return 1.0;
    }
    clamp01(0.5_f64.powf(elapsed / half_life_secs))
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) and unix seconds.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    let seconds = value.parse::<f64>().ok().filter(|secs| secs.is_finite() && *secs >= 0.0)?;
    let whole = seconds.trunc() as i64;
    let nanos = ((seconds - seconds.trunc()) * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single()
}

/// A malformed-input condition that normalization recovered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum InputIssue {
    MissingTimestamp,
    MalformedTimestamp(String),
    MissingUpvoteRatio,
    UpvoteRatioOutOfRange(f64),
}

impl fmt::Display for InputIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputIssue::MissingTimestamp => {
                write!(f, "missing timestamp, recency treated as stale")
            }
            InputIssue::MalformedTimestamp(raw) => {
                write!(f, "malformed timestamp `{raw}`, recency treated as stale")
            }
            InputIssue::MissingUpvoteRatio => write!(f, "missing upvote ratio, using neutral 0.5"),
            InputIssue::UpvoteRatioOutOfRange(ratio) => {
                write!(f, "upvote ratio {ratio} outside 0..=1, clipped")
            }
        }
    }
}

pub fn inspect(thread: &ThreadRecord) -> Vec<InputIssue> {
    let mut issues = Vec::new();
    match thread.created_at.as_deref() {
        None => issues.push(InputIssue::MissingTimestamp),
        Some(raw) if parse_timestamp(raw).is_none() => {
            issues.push(InputIssue::MalformedTimestamp(raw.to_string()))
        }
        Some(_) => {}
    }
    match thread.upvote_ratio {
        None => issues.push(InputIssue::MissingUpvoteRatio),
        Some(ratio) if !ratio.is_finite() => issues.push(InputIssue::MissingUpvoteRatio),
        Some(ratio) if !(0.0..=1.0).contains(&ratio) => {
            issues.push(InputIssue::UpvoteRatioOutOfRange(ratio))
        }
        Some(_) => {}
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn thread(score: i64, comments: u64) -> ThreadRecord {
        ThreadRecord::new("t", "sub", "title").with_engagement(score, comments, Some(0.9))
    }

    #[test]
    fn degenerate_batch_yields_neutral_values() {
        let threads = vec![thread(100, 10), thread(100, 10)];
        let reference = ReferenceScale::from_batch(&threads);
        let features = normalize(&threads[0], &reference, DAY, Utc::now());
        assert_eq!(features.engagement_intensity, NEUTRAL);
        assert_eq!(features.discussion_density, NEUTRAL);
    }

    #[test]
    fn batch_extremes_map_to_unit_bounds() {
        let threads = vec![thread(10, 0), thread(1_000, 500)];
        let reference = ReferenceScale::from_batch(&threads);
        let low = normalize(&threads[0], &reference, DAY, Utc::now());
        let high = normalize(&threads[1], &reference, DAY, Utc::now());
        assert_eq!(low.engagement_intensity, 0.0);
        assert_eq!(high.engagement_intensity, 1.0);
        assert_eq!(low.discussion_density, 0.0);
        assert_eq!(high.discussion_density, 1.0);
    }

    #[test]
    fn log_scaling_dampens_comment_outliers() {
        let reference = ReferenceScale::fixed(50_000, 5_000);
        let features = normalize(&thread(0, 500), &reference, DAY, Utc::now());
        // Linear scaling would give 0.1.
        assert!(features.discussion_density > 0.7);
    }

    #[test]
    fn values_above_fixed_ceiling_are_clipped() {
        let reference = ReferenceScale::fixed(1_000, 10);
        let features = normalize(&thread(90_000, 9_000), &reference, DAY, Utc::now());
        assert_eq!(features.engagement_intensity, 1.0);
        assert_eq!(features.discussion_density, 1.0);

        let negative = normalize(&thread(-40, 0), &reference, DAY, Utc::now());
        assert_eq!(negative.engagement_intensity, 0.0);
    }

    #[test]
    fn missing_ratio_defaults_to_neutral() {
        let mut record = thread(10, 1);
        record.upvote_ratio = None;
        let reference = ReferenceScale::fixed(100, 100);
        let features = normalize(&record, &reference, DAY, Utc::now());
        assert_eq!(features.consensus_strength, NEUTRAL);
        assert_eq!(inspect(&record)[1], InputIssue::MissingUpvoteRatio);
    }

    #[test]
    fn recency_halves_every_half_life() {
        let now = Utc::now();
        let created = (now - ChronoDuration::hours(24)).to_rfc3339();
        let record = thread(1, 1).with_created_at(created);
        let features = normalize(&record, &ReferenceScale::fixed(10, 10), DAY, now);
        assert!((features.recency_decay - 0.5).abs() < 1e-3);
    }

    #[test]
    fn future_timestamps_count_as_fresh() {
        let now = Utc::now();
        let created = (now + ChronoDuration::hours(3)).to_rfc3339();
        let record = thread(1, 1).with_created_at(created);
        let features = normalize(&record, &ReferenceScale::fixed(10, 10), DAY, now);
        assert_eq!(features.recency_decay, 1.0);
    }

    #[test]
    fn malformed_timestamp_is_maximally_stale() {
        let record = thread(1, 1).with_created_at("last tuesday-ish");
        let features = normalize(&record, &ReferenceScale::fixed(10, 10), DAY, Utc::now());
        assert_eq!(features.recency_decay, 0.0);
        assert_eq!(
            inspect(&record)[0],
            InputIssue::MalformedTimestamp("last tuesday-ish".to_string())
        );
    }

    #[test]
    fn timestamp_formats_are_accepted() {
        assert!(parse_timestamp("2024-03-01T12:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01 12:00:00").is_some());
        assert!(parse_timestamp("1700000000").is_some());
        assert!(parse_timestamp("1700000000.5").is_some());
        assert!(parse_timestamp("-5").is_none());
        assert!(parse_timestamp("").is_none());
    }
}
