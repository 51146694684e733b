//! Durable Keyed Storage
//!
//! The narrow contract the checkpoint/archive store persists through:
//! get/set/remove on string keys, with quota rejection distinguished from
//! other backend failures. Backed by an in-memory map for tests and a
//! one-file-per-key JSON directory for production use.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use thiserror::Error;

use crate::utils::paths::ensure_store_dir;

/// Errors surfaced by the durable medium
#[derive(Debug, Error)]
pub enum StorageError {
    /// The write was rejected for exceeding the storage quota
    #[error("storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Any other backend failure
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable key-value medium
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `value` under `key`; fails with `QuotaExceeded` when the
    /// medium is full
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove the value stored under `key`; removing a missing key is not
    /// an error
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// In-memory storage with an optional byte quota
///
/// The quota covers the sum of stored key and value lengths, which is
/// enough to exercise the store's prune-and-retry path in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStorage {
    /// Create unbounded in-memory storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create in-memory storage that rejects writes past `quota_bytes`
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes_excluding(&self, entries: &HashMap<String, String>, key: &str) -> usize {
        entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if let Some(quota) = self.quota_bytes {
            let used = self.used_bytes_excluding(&entries, key);
            if used + key.len() + value.len() > quota {
                return Err(StorageError::QuotaExceeded(format!(
                    "write of {} bytes exceeds quota of {} bytes",
                    key.len() + value.len(),
                    quota
                )));
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Filesystem storage: one JSON file per key under a directory
#[derive(Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Create storage rooted at the given directory, creating it if needed
    pub fn new(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { dir })
    }

    /// Create storage under the default user data directory
    pub fn default_location() -> StorageResult<Self> {
        let dir = ensure_store_dir().map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn map_io_error(err: std::io::Error) -> StorageError {
        match err.kind() {
            std::io::ErrorKind::StorageFull | std::io::ErrorKind::QuotaExceeded => {
                StorageError::QuotaExceeded(err.to_string())
            }
            _ => StorageError::Backend(err.to_string()),
        }
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        std::fs::write(self.path_for(key), value).map_err(Self::map_io_error)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io_error(e)),
        }
    }
}
