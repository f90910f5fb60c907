//! Batch orchestration: dedup claim, normalize, classify, score, synthesize,
//! persist. Each thread runs as its own task so one failure never touches
//! another thread's outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classify::{classify, NarrativeTag};
use crate::config::{PipelineConfig, ValidatedConfig};
use crate::discovery::DiscoverySource;
use crate::error::{ConfigError, DiscoveryError};
use crate::normalize::{inspect, normalize, InputIssue, NormalizedFeatures, ReferenceScale};
use crate::scoring::{ViralityScore, MAX_SCORE};
use crate::store::{DedupStore, ScriptSink};
use crate::synthesis::{synthesize, ScriptRecord, SynthesisOutcome, SynthesisSkipped};
use crate::thread::ThreadRecord;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound on threads processed at the same time.
    pub max_concurrency: usize,
    /// Scripts at or above this total are reported as high potential.
    pub viral_score_threshold: f64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            viral_score_threshold: 12.0,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.max_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.viral_score_threshold.is_finite()
            || !(0.0..=MAX_SCORE).contains(&self.viral_score_threshold)
        {
            return Err(ConfigError::InvalidValue {
                field: "pipeline.viral_score_threshold",
                reason: format!(
                    "must be within 0..={MAX_SCORE}, got {}",
                    self.viral_score_threshold
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Reprocess threads the dedup store already knows. Ids are still
    /// deduplicated within the run.
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dedup,
    Synthesis,
    Persistence,
    Task,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Dedup => "dedup",
            Stage::Synthesis => "synthesis",
            Stage::Persistence => "persistence",
            Stage::Task => "task",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub thread_id: String,
    pub stage: Stage,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredIssue {
    pub thread_id: String,
    pub issue: InputIssue,
}

/// Everything a batch produced. Every list follows input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub scripts: Vec<ScriptRecord>,
    pub failures: Vec<FailureReport>,
    pub skipped: Vec<SynthesisSkipped>,
    pub duplicates: Vec<String>,
    pub issues: Vec<RecoveredIssue>,
    /// Threads never dispatched because the run was cancelled.
    pub cancelled: Vec<String>,
    /// Discovery signal that ended the run early, if any.
    pub halted_by: Option<DiscoveryError>,
}

impl BatchReport {
    pub fn processed(&self) -> usize {
        self.scripts.len() + self.failures.len() + self.skipped.len()
    }

    /// Highest scoring scripts first; equal scores keep processing order.
    pub fn top_scripts(&self, n: usize) -> Vec<&ScriptRecord> {
        let mut ranked: Vec<&ScriptRecord> = self.scripts.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked.truncate(n);
        ranked
    }

    pub fn high_potential(&self, threshold: f64) -> Vec<&ScriptRecord> {
        self.scripts
            .iter()
            .filter(|script| script.score >= threshold)
            .collect()
    }

    fn absorb(&mut self, other: BatchReport) {
        self.scripts.extend(other.scripts);
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
        self.duplicates.extend(other.duplicates);
        self.issues.extend(other.issues);
        self.cancelled.extend(other.cancelled);
        if self.halted_by.is_none() {
            self.halted_by = other.halted_by;
        }
    }
}

/// Scoring-side view of one thread, without synthesis or persistence.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadEvaluation {
    pub thread_id: String,
    pub features: NormalizedFeatures,
    pub tag: NarrativeTag,
    pub score: ViralityScore,
    pub issues: Vec<InputIssue>,
}

pub fn evaluate(
    thread: &ThreadRecord,
    config: &ValidatedConfig,
    reference: &ReferenceScale,
    now: DateTime<Utc>,
) -> ThreadEvaluation {
    let issues = inspect(thread);
    let features = normalize(thread, reference, config.recency_half_life, now);
    let tag = classify(thread, &config.classifier);
    let score = config.scorer.score(&features, &tag);
    debug!(
        thread_id = %thread.id,
        narrative = %tag.kind,
        confidence = tag.confidence,
        total = score.total,
        "scored thread"
    );
    ThreadEvaluation {
        thread_id: thread.id.clone(),
        features,
        tag,
        score,
        issues,
    }
}

/// Validates `config`, then processes `threads`. A configuration error is
/// returned before any thread is touched.
pub async fn process_batch(
    threads: Vec<ThreadRecord>,
    config: &PipelineConfig,
    dedup: Arc<dyn DedupStore>,
    sink: Arc<dyn ScriptSink>,
    options: BatchOptions,
    cancel: CancellationToken,
) -> Result<BatchReport, ConfigError> {
    let validated = Arc::new(config.validate()?);
    let mut seen = HashSet::new();
    Ok(run_batch(threads, &validated, &dedup, &sink, options, &cancel, &mut seen).await)
}

/// Pulls batches from `source` until it is exhausted, signals
/// `SourceUnavailable`/`RateLimited`, or `cancel` fires. Results gathered
/// before a discovery signal are kept.
pub async fn run_source(
    source: &mut dyn DiscoverySource,
    config: &PipelineConfig,
    dedup: Arc<dyn DedupStore>,
    sink: Arc<dyn ScriptSink>,
    options: BatchOptions,
    cancel: CancellationToken,
) -> Result<BatchReport, ConfigError> {
    let validated = Arc::new(config.validate()?);
    let mut seen = HashSet::new();
    let mut report = BatchReport::default();
    let mut batches = 0usize;

    while !cancel.is_cancelled() {
        match source.next_batch().await {
            Ok(Some(threads)) => {
                batches += 1;
                let batch = run_batch(
                    threads, &validated, &dedup, &sink, options, &cancel, &mut seen,
                )
                .await;
                report.absorb(batch);
            }
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, batches, "discovery halted the run");
                report.halted_by = Some(err);
                break;
            }
        }
    }

    info!(
        batches,
        scripts = report.scripts.len(),
        failures = report.failures.len(),
        halted = report.halted_by.is_some(),
        "run finished"
    );
    Ok(report)
}

enum ThreadOutcome {
    Script(ScriptRecord),
    Skipped(SynthesisSkipped),
    Duplicate,
    Failed { stage: Stage, reason: String },
}

struct ThreadResult {
    issues: Vec<InputIssue>,
    outcome: ThreadOutcome,
}

async fn run_batch(
    threads: Vec<ThreadRecord>,
    config: &Arc<ValidatedConfig>,
    dedup: &Arc<dyn DedupStore>,
    sink: &Arc<dyn ScriptSink>,
    options: BatchOptions,
    cancel: &CancellationToken,
    seen: &mut HashSet<String>,
) -> BatchReport {
    let reference = config.normalizer.reference_for(&threads);
    let now = Utc::now();
    let semaphore = Arc::new(Semaphore::new(config.orchestrator.max_concurrency));
    let mut report = BatchReport::default();
    let mut handles: Vec<(String, Option<JoinHandle<ThreadResult>>)> =
        Vec::with_capacity(threads.len());

    info!(threads = threads.len(), force = options.force, "processing batch");

    let mut pending = threads.into_iter();
    while let Some(thread) = pending.next() {
        if cancel.is_cancelled() {
            report.cancelled.push(thread.id);
            report.cancelled.extend(pending.by_ref().map(|thread| thread.id));
            break;
        }
        if !seen.insert(thread.id.clone()) {
            handles.push((thread.id, None));
            continue;
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = semaphore.clone().acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            seen.remove(&thread.id);
            report.cancelled.push(thread.id);
            report.cancelled.extend(pending.by_ref().map(|thread| thread.id));
            break;
        };

        let id = thread.id.clone();
        let config = Arc::clone(config);
        let dedup = Arc::clone(dedup);
        let sink = Arc::clone(sink);
        let handle = tokio::spawn(async move {
            let result = process_thread(
                thread,
                &config,
                &reference,
                now,
                dedup.as_ref(),
                sink.as_ref(),
                options,
            )
            .await;
            drop(permit);
            result
        });
        handles.push((id, Some(handle)));
    }

    for (thread_id, handle) in handles {
        let Some(handle) = handle else {
            debug!(thread_id = %thread_id, "duplicate id within run");
            report.duplicates.push(thread_id);
            continue;
        };
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => ThreadResult {
                issues: Vec::new(),
                outcome: ThreadOutcome::Failed {
                    stage: Stage::Task,
                    reason: err.to_string(),
                },
            },
        };

        for issue in result.issues {
            warn!(thread_id = %thread_id, issue = %issue, "recovered malformed input");
            report.issues.push(RecoveredIssue {
                thread_id: thread_id.clone(),
                issue,
            });
        }
        match result.outcome {
            ThreadOutcome::Script(script) => report.scripts.push(script),
            ThreadOutcome::Skipped(skipped) => {
                info!(thread_id = %thread_id, reason = %skipped.reason, "synthesis skipped");
                report.skipped.push(skipped);
            }
            ThreadOutcome::Duplicate => report.duplicates.push(thread_id),
            ThreadOutcome::Failed { stage, reason } => {
                warn!(thread_id = %thread_id, stage = %stage, reason = %reason, "thread failed");
                report.failures.push(FailureReport {
                    thread_id,
                    stage,
                    reason,
                });
            }
        }
    }

    info!(
        scripts = report.scripts.len(),
        skipped = report.skipped.len(),
        duplicates = report.duplicates.len(),
        failures = report.failures.len(),
        cancelled = report.cancelled.len(),
        "batch finished"
    );
    report
}

async fn process_thread(
    thread: ThreadRecord,
    config: &ValidatedConfig,
    reference: &ReferenceScale,
    now: DateTime<Utc>,
    dedup: &dyn DedupStore,
    sink: &dyn ScriptSink,
    options: BatchOptions,
) -> ThreadResult {
    let claimed = match dedup.claim(&thread.id).await {
        Ok(claimed) => claimed,
        Err(err) => return failed(Vec::new(), Stage::Dedup, err.to_string()),
    };
    if !claimed && !options.force {
        return ThreadResult {
            issues: Vec::new(),
            outcome: ThreadOutcome::Duplicate,
        };
    }

    let evaluation = evaluate(&thread, config, reference, now);
    let issues = evaluation.issues;

    let outcome = match synthesize(&thread, &evaluation.tag, &evaluation.score, &config.synthesis) {
        Ok(outcome) => outcome,
        Err(err) => {
            release(dedup, &thread.id, claimed).await;
            return failed(issues, Stage::Synthesis, err.to_string());
        }
    };

    let script = match outcome {
        SynthesisOutcome::Skipped(skipped) => {
            return ThreadResult {
                issues,
                outcome: ThreadOutcome::Skipped(skipped),
            }
        }
        SynthesisOutcome::Script(script) => script,
    };

    if let Err(err) = sink.persist(&script).await {
        release(dedup, &thread.id, claimed).await;
        return failed(issues, Stage::Persistence, err.to_string());
    }
    debug!(thread_id = %thread.id, characters = script.character_count, "script persisted");

    ThreadResult {
        issues,
        outcome: ThreadOutcome::Script(script),
    }
}

/// Only a claim made by this run is undone; a forced rerun leaves the
/// earlier mark in place.
async fn release(dedup: &dyn DedupStore, thread_id: &str, claimed: bool) {
    if !claimed {
        return;
    }
    if let Err(err) = dedup.release(thread_id).await {
        warn!(thread_id = %thread_id, error = %err, "failed to release dedup claim");
    }
}

fn failed(issues: Vec<InputIssue>, stage: Stage, reason: String) -> ThreadResult {
    ThreadResult {
        issues,
        outcome: ThreadOutcome::Failed { stage, reason },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = OrchestratorConfig {
            max_concurrency: 0,
            ..OrchestratorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "pipeline.max_concurrency", .. })
        ));
    }

    #[test]
    fn threshold_must_be_on_score_scale() {
        let config = OrchestratorConfig {
            viral_score_threshold: 25.0,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
