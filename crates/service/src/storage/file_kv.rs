use std::{collections::HashMap, io::ErrorKind, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};
use tracing::warn;

use super::{KvProvider, StorageError};

/// JSON file-backed key-value provider.
///
/// Keeps every key in one JSON object file and rewrites the whole file on each
/// `set`/`remove`. The in-memory map only changes when the write succeeds.
pub struct FileKv {
    inner: RwLock<HashMap<String, String>>,
    file_path: PathBuf,
    quota: Option<u64>,
}

impl FileKv {
    /// Open the provider at `path`. Creates the file with an empty map if missing;
    /// a file that does not parse is logged and treated as empty. Any other read
    /// failure is returned and the file is left untouched.
    pub async fn open<P: Into<PathBuf>>(path: P, quota: Option<u64>) -> Result<Arc<Self>, StorageError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(format!("create {}: {e}", parent.display())))?;
        }

        let map: HashMap<String, String> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!(path = %file_path.display(), error = %e, "storage file unreadable; starting empty");
                HashMap::new()
            }),
            Err(e) if e.kind() != ErrorKind::NotFound => {
                return Err(StorageError::Io(format!("read {}: {e}", file_path.display())));
            }
            Err(_) => {
                let empty: HashMap<String, String> = HashMap::new();
                fs::write(&file_path, serialize(&empty)?)
                    .await
                    .map_err(|e| StorageError::Io(e.to_string()))?;
                empty
            }
        };

        Ok(Arc::new(Self { inner: RwLock::new(map), file_path, quota }))
    }

    async fn save(&self, map: &HashMap<String, String>) -> Result<(), StorageError> {
        let data = serialize(map)?;
        if let Some(quota) = self.quota {
            let needed = data.len() as u64;
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        // write-then-rename
        let tmp = self.file_path.with_extension("tmp");
        fs::write(&tmp, data).await.map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, &self.file_path)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }
}

fn serialize(map: &HashMap<String, String>) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(map).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl KvProvider for FileKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let map = self.inner.read().await;
        Ok(map.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut map = self.inner.write().await;
        let previous = map.insert(key.to_string(), value);
        if let Err(e) = self.save(&map).await {
            match previous {
                Some(old) => map.insert(key.to_string(), old),
                None => map.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.inner.write().await;
        let Some(previous) = map.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.save(&map).await {
            map.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }
}
