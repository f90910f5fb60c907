//! Discovery collaborators: anything that yields batches of threads.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::thread::{RawThread, ThreadRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub minimum_score: i64,
    pub minimum_comments: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            minimum_score: 300,
            minimum_comments: 15,
        }
    }
}

impl DiscoveryConfig {
    pub fn accepts(&self, thread: &ThreadRecord) -> bool {
        thread.raw_score >= self.minimum_score && thread.comment_count >= self.minimum_comments
    }
}

/// Yields finite batches of threads. `Ok(None)` means the source is
/// exhausted.
#[async_trait]
pub trait DiscoverySource: Send {
    async fn next_batch(&mut self) -> Result<Option<Vec<ThreadRecord>>, DiscoveryError>;
}

/// In-memory source replaying prepared batches. A queued error is returned
/// once, in order, in place of a batch.
#[derive(Debug, Default)]
pub struct VecSource {
    queue: VecDeque<Result<Vec<ThreadRecord>, DiscoveryError>>,
}

impl VecSource {
    pub fn new(batches: Vec<Vec<ThreadRecord>>) -> Self {
        Self {
            queue: batches.into_iter().map(Ok).collect(),
        }
    }

    pub fn push_batch(&mut self, batch: Vec<ThreadRecord>) {
        self.queue.push_back(Ok(batch));
    }

    pub fn push_error(&mut self, error: DiscoveryError) {
        self.queue.push_back(Err(error));
    }
}

#[async_trait]
impl DiscoverySource for VecSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<ThreadRecord>>, DiscoveryError> {
        match self.queue.pop_front() {
            Some(Ok(batch)) => Ok(Some(batch)),
            Some(Err(err)) => Err(err),
            None => Ok(None),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DumpFile {
    List(Vec<RawThread>),
    Wrapped { threads: Vec<RawThread> },
}

/// Reads scraped thread dumps from a directory, one batch per `*.json` file
/// in file-name order.
pub struct JsonDirSource {
    pending: VecDeque<PathBuf>,
    filters: DiscoveryConfig,
}

impl JsonDirSource {
    pub async fn open(dir: &Path, filters: DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|err| {
            DiscoveryError::SourceUnavailable(format!("failed to read {}: {}", dir.display(), err))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|err| {
            DiscoveryError::SourceUnavailable(format!("failed to list {}: {}", dir.display(), err))
        })? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        debug!(dir = %dir.display(), files = files.len(), "opened thread dump directory");

        Ok(Self {
            pending: files.into(),
            filters,
        })
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<ThreadRecord>, DiscoveryError> {
        let data = tokio::fs::read_to_string(path).await.map_err(|err| {
            DiscoveryError::SourceUnavailable(format!("failed to read {}: {}", path.display(), err))
        })?;
        let dump: DumpFile = serde_json::from_str(&data).map_err(|err| {
            DiscoveryError::SourceUnavailable(format!(
                "failed to parse {}: {}",
                path.display(),
                err
            ))
        })?;
        let rows = match dump {
            DumpFile::List(rows) => rows,
            DumpFile::Wrapped { threads } => threads,
        };

        let total = rows.len();
        let mut unusable = 0usize;
        let threads: Vec<ThreadRecord> = rows
            .into_iter()
            .filter_map(|row| {
                let record = row.into_record();
                if record.is_none() {
                    unusable += 1;
                }
                record
            })
            .filter(|thread| self.filters.accepts(thread))
            .collect();

        if unusable > 0 {
            warn!(file = %path.display(), unusable, "dropped rows without id or title");
        }
        debug!(file = %path.display(), total, kept = threads.len(), "loaded thread dump");
        Ok(threads)
    }
}

#[async_trait]
impl DiscoverySource for JsonDirSource {
    async fn next_batch(&mut self) -> Result<Option<Vec<ThreadRecord>>, DiscoveryError> {
        match self.pending.pop_front() {
            Some(path) => self.read_file(&path).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn vec_source_replays_batches_then_errors() {
        let mut source = VecSource::new(vec![vec![ThreadRecord::new("a", "sub", "title")]]);
        source.push_error(DiscoveryError::RateLimited {
            retry_after_secs: Some(30),
        });

        let first = source.next_batch().await;
        assert!(matches!(first, Ok(Some(ref batch)) if batch.len() == 1));
        assert_eq!(
            source.next_batch().await,
            Err(DiscoveryError::RateLimited {
                retry_after_secs: Some(30)
            })
        );
        assert_eq!(source.next_batch().await, Ok(None));
    }

    #[tokio::test]
    async fn json_dir_source_applies_filters_in_file_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = r#"[
            {"id": "a1", "subreddit": "tifu", "title": "Kept", "selftext": "body",
             "score": 900, "num_comments": 40},
            {"id": "a2", "subreddit": "tifu", "title": "Too quiet",
             "score": 100, "num_comments": 40},
            {"subreddit": "tifu", "title": "No id", "score": 900, "num_comments": 40}
        ]"#;
        let second = r#"{"threads": [
            {"id": "b1", "subreddit": "science", "title": "Also kept",
             "score": 5000, "num_comments": 15}
        ]}"#;
        std::fs::write(dir.path().join("01.json"), first).expect("write first");
        std::fs::write(dir.path().join("02.json"), second).expect("write second");
        std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write notes");

        let mut source = JsonDirSource::open(dir.path(), DiscoveryConfig::default())
            .await
            .expect("open");

        let batch = source.next_batch().await.expect("first").expect("batch");
        let ids: Vec<&str> = batch.iter().map(|thread| thread.id.as_str()).collect();
        assert_eq!(ids, vec!["a1"]);

        let batch = source.next_batch().await.expect("second").expect("batch");
        assert_eq!(batch[0].id, "b1");
        assert_eq!(batch[0].source_subcommunity, "science");

        assert_eq!(source.next_batch().await, Ok(None));
    }

    #[tokio::test]
    async fn missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result =
            JsonDirSource::open(&dir.path().join("absent"), DiscoveryConfig::default()).await;
        assert!(matches!(result, Err(DiscoveryError::SourceUnavailable(_))));
    }
}
