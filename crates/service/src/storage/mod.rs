//! Storage abstractions for service layer
//!
//! The record store and calculator only ever talk to a string key-value
//! provider; which backend sits behind it is decided at startup.

pub mod file_kv;
pub mod memory_kv;

use async_trait::async_trait;
use thiserror::Error;

pub use file_kv::FileKv;
pub use memory_kv::MemoryKv;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, quota is {quota} bytes")]
    QuotaExceeded { needed: u64, quota: u64 },
    #[error("storage io error: {0}")]
    Io(String),
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

/// Textual key-value persistence provider.
/// Implementations can be file-backed, in-memory, or an embedded database.
#[async_trait]
pub trait KvProvider: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Bytes a key/value pair accounts for against a provider quota.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}
