pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod scoring;
pub mod store;
pub mod synthesis;
pub mod thread;

pub use classify::{classify, classify_text, ClassifierConfig, NarrativeKind, NarrativeTag};
pub use config::{PipelineConfig, ValidatedConfig};
pub use discovery::{DiscoveryConfig, DiscoverySource, JsonDirSource, VecSource};
pub use error::{ConfigError, DiscoveryError, StoreError, SynthesisError};
pub use normalize::{inspect, normalize, InputIssue, NormalizedFeatures, ReferenceScale};
pub use pipeline::{
    evaluate, process_batch, run_source, BatchOptions, BatchReport, FailureReport, Stage,
    ThreadEvaluation,
};
pub use scoring::{FeatureWeights, ScoreTier, ViralityScore, ViralityScorer};
pub use store::{
    DedupStore, JsonDedupStore, JsonScriptStore, MemoryDedupStore, MemoryScriptSink, ScriptSink,
};
pub use synthesis::{
    synthesize, ScriptRecord, ShortBodyPolicy, SkipReason, SynthesisOutcome, SynthesisSettings,
    SynthesisSkipped,
};
pub use thread::{RawThread, ThreadRecord};

/// Scores normalized features and a narrative tag with `scorer`.
pub fn score(
    scorer: &ViralityScorer,
    features: &NormalizedFeatures,
    tag: &NarrativeTag,
) -> ViralityScore {
    scorer.score(features, tag)
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// First eight bytes of the SHA-256 digest, big-endian. Stable across
/// processes and platforms, unlike `std::hash`.
pub fn stable_hash64(value: &str) -> u64 {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

pub fn format_number(value: f64) -> String {
    let rounded = value.round().max(0.0) as i64;
    let mut chars: Vec<char> = rounded.to_string().chars().collect();
    let mut result = String::new();
    let mut count = 0usize;

    while let Some(ch) = chars.pop() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(ch);
        count += 1;
    }

    result.chars().rev().collect()
}

pub fn format_float(value: f64, digits: usize) -> String {
    format!("{:.1$}", value, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_groups_thousands() {
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(999.0), "999");
        assert_eq!(format_number(48_213.4), "48,213");
        assert_eq!(format_number(1_234_567.0), "1,234,567");
    }

    #[test]
    fn stable_hash_is_reproducible() {
        assert_eq!(stable_hash64("thread-1"), stable_hash64("thread-1"));
        assert_ne!(stable_hash64("thread-1"), stable_hash64("thread-2"));
    }

    #[test]
    fn clamp01_maps_nan_to_zero() {
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(-0.2), 0.0);
    }
}
