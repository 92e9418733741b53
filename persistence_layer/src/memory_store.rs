use crate::{PersistenceError, Result, StatusStore};
use async_trait::async_trait;
use portfolio_core::StatusRecord;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-process status store for tests and local runs.
///
/// Values are kept as serialized JSON, the same as in Redis, so corrupt
/// entries can be planted with [`MemoryStatusStore::insert_raw`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStatusStore {
    records: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw value without validation
    pub async fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.records.write().await.insert(key.into(), value.into());
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Every stored key and raw value, in key order
    pub async fn snapshot(&self) -> Vec<(String, String)> {
        self.records
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn put(&self, key: &str, record: &StatusRecord) -> Result<()> {
        let record_json = record.to_json()?;
        self.records
            .write()
            .await
            .insert(key.to_string(), record_json);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StatusRecord> {
        let records = self.records.read().await;
        match records.get(key) {
            Some(json) => Ok(StatusRecord::from_json(json)?),
            None => Err(PersistenceError::NotFound(key.to_string())),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let records = self.records.read().await;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
