//! Filesystem-backed stores.

use super::{BlobStore, CatalogStore};
use crate::core::catalog::PhotoRecord;
use crate::error::StoreError;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Blobs as individual files in one directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `dir`; the directory is created on first write
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve a key to a path, refusing keys that would escape the directory
    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        let valid = !key.is_empty()
            && !key.contains(['/', '\\'])
            && key != "."
            && key != "..";
        if !valid {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "blob keys must be plain file names",
            ));
        }
        Ok(self.dir.join(key))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let write = || -> io::Result<()> {
            let path = self.path_for(key)?;
            std::fs::create_dir_all(&self.dir)?;
            std::fs::write(path, bytes)
        };

        write().map_err(|source| StoreError::BlobWrite {
            key: key.to_string(),
            source,
        })?;
        debug!("Wrote blob {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let read = || -> io::Result<Vec<u8>> { std::fs::read(self.path_for(key)?) };

        read().map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::BlobNotFound {
                key: key.to_string(),
            },
            _ => StoreError::BlobRead {
                key: key.to_string(),
                source,
            },
        })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let remove = || -> io::Result<()> { std::fs::remove_file(self.path_for(key)?) };

        remove().map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => StoreError::BlobNotFound {
                key: key.to_string(),
            },
            _ => StoreError::BlobDelete {
                key: key.to_string(),
                source,
            },
        })
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }
}

/// The catalog as a single pretty-printed JSON array
#[derive(Debug, Clone)]
pub struct JsonCatalogStore {
    path: PathBuf,
}

impl JsonCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogStore for JsonCatalogStore {
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No catalog at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StoreError::CatalogRead {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&text).map_err(|e| StoreError::Corrupted(e.to_string()))
    }

    fn save(&self, records: &[PhotoRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        // Write beside the target and rename, so readers never see half a document
        let write = || -> io::Result<()> {
            let parent = match self.path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            std::fs::create_dir_all(parent)?;

            let mut tmp = NamedTempFile::new_in(parent)?;
            tmp.write_all(&json)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&self.path).map_err(|e| e.error)?;
            Ok(())
        };

        write().map_err(|source| StoreError::CatalogWrite {
            path: self.path.clone(),
            source,
        })?;
        debug!("Saved {} records to {}", records.len(), self.path.display());
        Ok(())
    }
}
