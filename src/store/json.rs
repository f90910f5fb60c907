use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::{DedupStore, ScriptSink};
use crate::synthesis::ScriptRecord;

/// Processed thread ids kept as a sorted JSON array on disk.
pub struct JsonDedupStore {
    path: PathBuf,
    ids: Mutex<BTreeSet<String>>,
}

impl JsonDedupStore {
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let ids = read_json::<BTreeSet<String>>(&path).await?.unwrap_or_default();
        Ok(Self {
            path,
            ids: Mutex::new(ids),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DedupStore for JsonDedupStore {
    async fn contains(&self, thread_id: &str) -> Result<bool, StoreError> {
        Ok(self.ids.lock().await.contains(thread_id))
    }

    async fn claim(&self, thread_id: &str) -> Result<bool, StoreError> {
        let mut guard = self.ids.lock().await;
        if !guard.insert(thread_id.to_string()) {
            return Ok(false);
        }
        if let Err(err) = write_json(&self.path, &*guard).await {
            guard.remove(thread_id);
            return Err(err);
        }
        Ok(true)
    }

    async fn release(&self, thread_id: &str) -> Result<(), StoreError> {
        let mut guard = self.ids.lock().await;
        if guard.remove(thread_id) {
            write_json(&self.path, &*guard).await?;
        }
        Ok(())
    }
}

/// Every persisted script, appended in persistence order.
pub struct JsonScriptStore {
    path: PathBuf,
    scripts: Mutex<Vec<ScriptRecord>>,
}

impl JsonScriptStore {
    pub async fn load(path: PathBuf) -> Result<Self, StoreError> {
        let scripts = read_json::<Vec<ScriptRecord>>(&path).await?.unwrap_or_default();
        Ok(Self {
            path,
            scripts: Mutex::new(scripts),
        })
    }

    pub async fn list(&self) -> Vec<ScriptRecord> {
        self.scripts.lock().await.clone()
    }
}

#[async_trait]
impl ScriptSink for JsonScriptStore {
    async fn persist(&self, script: &ScriptRecord) -> Result<(), StoreError> {
        let mut guard = self.scripts.lock().await;
        guard.push(script.clone());
        if let Err(err) = write_json(&self.path, &*guard).await {
            guard.pop();
            return Err(err);
        }
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| io_error(path, source))?;
    if data.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|err| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: err.to_string(),
        })
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
    }
    let payload = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, payload)
        .await
        .map_err(|source| io_error(&tmp_path, source))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|source| io_error(path, source))?;
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
