//! Persistence collaborators injected into the orchestrator.

mod json;
mod memory;
mod report;

pub use json::{JsonDedupStore, JsonScriptStore};
pub use memory::{MemoryDedupStore, MemoryScriptSink};
pub use report::{render_production_report, write_production_report};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::synthesis::ScriptRecord;

/// Records which thread ids have already produced an outcome.
#[async_trait]
pub trait DedupStore: Send + Sync {
    async fn contains(&self, thread_id: &str) -> Result<bool, StoreError>;

    /// Atomically marks `thread_id` as processed. Returns `false` when it was
    /// already marked.
    async fn claim(&self, thread_id: &str) -> Result<bool, StoreError>;

    /// Undoes a claim so the thread can be retried by a later run.
    async fn release(&self, thread_id: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ScriptSink: Send + Sync {
    async fn persist(&self, script: &ScriptRecord) -> Result<(), StoreError>;
}
