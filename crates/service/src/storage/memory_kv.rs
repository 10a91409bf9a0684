use async_trait::async_trait;
use dashmap::DashMap;

use super::{entry_size, KvProvider, StorageError};

/// In-memory provider with an optional byte quota, mirroring browser storage limits.
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: DashMap<String, String>,
    quota: Option<u64>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: u64) -> Self {
        Self { map: DashMap::new(), quota: Some(quota) }
    }

    /// Bytes currently used by every stored pair.
    pub fn used_bytes(&self) -> u64 {
        self.map.iter().map(|e| entry_size(e.key(), e.value())).sum()
    }
}

#[async_trait]
impl KvProvider for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let others: u64 = self
                .map
                .iter()
                .filter(|e| e.key() != key)
                .map(|e| entry_size(e.key(), e.value()))
                .sum();
            let needed = others + entry_size(key, &value);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        self.map.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }
}
