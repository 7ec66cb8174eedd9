//! # Durable Key-Value Storage
//!
//! Local storage with whole-value writes. Every component owns exactly one key
//! and always rewrites it wholesale, so a reader in a freshly loaded context
//! sees either the previous value or the new one, never a partial record.
//!
//! - `MemoryStore`: process-local, used by tests and ephemeral sessions
//! - `FileStore`: one file per key, written to a temp file and renamed

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::shared::error::SyncError;

/// String-keyed, string-valued durable store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value for `key`, `None` if never written
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError>;

    /// Atomically replace the value for `key`
    async fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;

    /// Delete `key` if present
    async fn remove(&self, key: &str) -> Result<(), SyncError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.values
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// File-backed store rooted at a directory
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, SyncError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{}.json", safe))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SyncError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
