//! Keyed blob storage
//!
//! Every repository owns one key in the store and never writes another
//! repository's key. Blobs are textual JSON; a missing or corrupt blob is
//! treated as absent so startup never fails on bad data.

use async_trait::async_trait;
use revupulse_common::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Keyed string-blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Load the blob stored under `key`, or None if absent
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous blob
    async fn save(&self, key: &str, value: &str) -> Result<()>;
}

/// Filesystem-backed blob store, one file per key
pub struct LocalBlobStore {
    base_path: PathBuf,
}

impl LocalBlobStore {
    /// Create a store rooted at `base_path`, creating the directory if needed
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&base_path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to create storage dir: {}", e)))?;
        Ok(Self { base_path })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", key))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("Failed to read {}: {}", key, e))),
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        let tmp = self.base_path.join(format!("{}.json.tmp", key));
        tokio::fs::write(&tmp, value)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", key, e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", key, e)))?;
        Ok(())
    }
}

/// In-memory blob store for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, String>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
