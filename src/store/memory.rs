use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{DedupStore, ScriptSink};
use crate::synthesis::ScriptRecord;

#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    ids: Mutex<HashSet<String>>,
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.ids.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.ids.lock().await.is_empty()
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn contains(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.ids.lock().await.contains(thread_id))
    }

    async fn claim(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.ids.lock().await.insert(thread_id.to_string()))
    }

    async fn release(&self, thread_id: &str) -> Result<(), StoreError> {
        self.ids.lock().await.remove(thread_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryScriptSink {
    scripts: Mutex<Vec<ScriptRecord>>,
}

impl MemoryScriptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn scripts(&self) -> Vec<ScriptRecord> {
        self.scripts.lock().await.clone()
    }
}

#[async_trait]
impl ScriptSink for MemoryScriptSink {
    async fn persist(&self, script: &ScriptRecord) -> Result<(), StoreError> {
        self.scripts.lock().await.push(script.clone());
        Ok(())
    }
}
