use thiserror::Error;

/// Raised while loading or validating configuration. Fatal: no thread is
/// processed while the configuration is inconsistent.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(String),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("failed to write config: {0}")]
    Write(String),

    #[error("scorer weights must sum to {expected}, got {actual}")]
    WeightSum { expected: f64, actual: f64 },

    #[error("scorer weight `{factor}` must be finite and non-negative, got {value}")]
    InvalidWeight { factor: &'static str, value: f64 },

    #[error("narrative bonus for `{tag}` must be within 0..={max}, got {value}")]
    InvalidBonus {
        tag: &'static str,
        value: f64,
        max: f64,
    },

    #[error("required template pool `{0}` is empty")]
    EmptyPool(String),

    #[error("unknown narrative tag `{0}` in template table")]
    UnknownTag(String),

    #[error("template `{template}` uses unknown placeholder `{{{placeholder}}}`")]
    UnknownPlaceholder { template: String, placeholder: String },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Per-thread synthesis failure. Reported against the thread id, never fatal
/// to the batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SynthesisError {
    #[error(
        "script cannot fit in {max} characters: hook, interrupt and call-to-action need {fixed}"
    )]
    ScriptOverflow { max: usize, fixed: usize },

    #[error("no hook template produced text for thread {thread_id}")]
    EmptyHook { thread_id: String },
}

/// Signals raised by a discovery collaborator. `SourceUnavailable` and
/// `RateLimited` end the current run gracefully.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DiscoveryError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("rate limited by source{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(" (retry after {secs}s)"),
        None => String::new(),
    }
}

/// Failure reported by a dedup store or script sink.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store data at {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("failed to serialize store data: {0}")]
    Serialize(#[from] serde_json::Error),
}
