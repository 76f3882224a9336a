//! In-memory stores for testing.

use super::{BlobStore, CatalogStore};
use crate::core::catalog::PhotoRecord;
use crate::error::StoreError;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// In-memory blob store
///
/// Individual keys can be made to fail, to exercise error paths.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    failing_writes: bool,
    failing_deletes: RwLock<HashSet<String>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every write fails
    pub fn failing_writes() -> Self {
        Self {
            failing_writes: true,
            ..Self::default()
        }
    }

    /// Make deletes of `key` fail
    pub fn fail_delete_of(&self, key: &str) {
        if let Ok(mut failing) = self.failing_deletes.write() {
            failing.insert(key.to_string());
        }
    }

    /// Number of blobs held
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn injected(key: &str, action: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected {} failure for {}", action, key),
    )
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if self.failing_writes {
            return Err(StoreError::BlobWrite {
                key: key.to_string(),
                source: injected(key, "write"),
            });
        }

        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let blobs = self.blobs.read().map_err(|_| StoreError::Poisoned)?;
        blobs.get(key).cloned().ok_or_else(|| StoreError::BlobNotFound {
            key: key.to_string(),
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let failing = self
            .failing_deletes
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .contains(key);
        if failing {
            return Err(StoreError::BlobDelete {
                key: key.to_string(),
                source: injected(key, "delete"),
            });
        }

        let mut blobs = self.blobs.write().map_err(|_| StoreError::Poisoned)?;
        blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::BlobNotFound {
                key: key.to_string(),
            })
    }

    fn exists(&self, key: &str) -> bool {
        self.blobs
            .read()
            .map(|b| b.contains_key(key))
            .unwrap_or(false)
    }
}

/// In-memory catalog document
#[derive(Default)]
pub struct InMemoryCatalogStore {
    document: RwLock<Option<Vec<PhotoRecord>>>,
    failing_saves: bool,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing document
    pub fn with_records(records: Vec<PhotoRecord>) -> Self {
        Self {
            document: RwLock::new(Some(records)),
            failing_saves: false,
        }
    }

    /// A store whose every save fails
    pub fn failing_saves() -> Self {
        Self {
            failing_saves: true,
            ..Self::default()
        }
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        let document = self.document.read().map_err(|_| StoreError::Poisoned)?;
        Ok(document.clone().unwrap_or_default())
    }

    fn save(&self, records: &[PhotoRecord]) -> Result<(), StoreError> {
        if self.failing_saves {
            return Err(StoreError::CatalogWrite {
                path: "memory".into(),
                source: injected("catalog", "save"),
            });
        }

        let mut document = self.document.write().map_err(|_| StoreError::Poisoned)?;
        *document = Some(records.to_vec());
        Ok(())
    }
}
