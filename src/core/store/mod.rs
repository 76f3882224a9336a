//! # Store Module
//!
//! Persistence collaborators for the catalog.
//!
//! ## Backends
//! - `FsBlobStore` / `JsonCatalogStore` - files under a library directory
//! - `InMemoryBlobStore` / `InMemoryCatalogStore` - for testing
//!
//! Neither store locks across processes. Callers keep a single writer per
//! catalog document.

mod fs;
mod memory;

pub use fs::{FsBlobStore, JsonCatalogStore};
pub use memory::{InMemoryBlobStore, InMemoryCatalogStore};

use crate::core::catalog::PhotoRecord;
use crate::error::StoreError;

/// Raw photo bytes addressed by a generated key
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key`, replacing anything already there
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Read the bytes stored under `key`
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Remove the bytes stored under `key`
    fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Check whether `key` holds bytes
    fn exists(&self, key: &str) -> bool;
}

/// The catalog document, read and written whole
pub trait CatalogStore: Send + Sync {
    /// Load every record; a store that was never written yields an empty list
    fn load(&self) -> Result<Vec<PhotoRecord>, StoreError>;

    /// Replace the whole document with `records`
    fn save(&self, records: &[PhotoRecord]) -> Result<(), StoreError>;
}
