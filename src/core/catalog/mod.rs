//! # Catalog Module
//!
//! Owns the list of photo records and keeps it in step with its stores.
//!
//! The document is always read and written whole. Every mutating call
//! takes `&mut self`, so one `Catalog` value is one writer; a failed save
//! leaves the in-memory list as it was before the call.

mod record;

pub use record::{PhotoRecord, UNKNOWN_LOCATION, UNKNOWN_SPECIES};

use crate::core::store::{BlobStore, CatalogStore, FsBlobStore, JsonCatalogStore};
use crate::error::StoreError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// File name of the catalog document inside a library
pub const CATALOG_FILE: &str = "catalog.json";

/// Directory holding photo blobs inside a library
pub const BLOB_DIR: &str = "blobs";

/// Where a library keeps its files
#[derive(Debug, Clone)]
pub struct LibraryLayout {
    root: PathBuf,
}

impl LibraryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join(CATALOG_FILE)
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.root.join(BLOB_DIR)
    }

    pub fn blob_store(&self) -> Arc<FsBlobStore> {
        Arc::new(FsBlobStore::new(self.blob_dir()))
    }

    pub fn catalog_store(&self) -> Arc<JsonCatalogStore> {
        Arc::new(JsonCatalogStore::new(self.catalog_path()))
    }

    /// Open the catalog stored in this library
    pub fn open(&self) -> Result<Catalog, StoreError> {
        Catalog::open(self.catalog_store(), self.blob_store())
    }
}

/// The in-memory catalog plus the stores behind it
pub struct Catalog {
    records: Vec<PhotoRecord>,
    store: Arc<dyn CatalogStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Catalog {
    /// Open a catalog, loading the current document
    pub fn open(store: Arc<dyn CatalogStore>, blobs: Arc<dyn BlobStore>) -> Result<Self, StoreError> {
        let records = store.load()?;
        info!("Loaded catalog with {} photos", records.len());
        Ok(Self {
            records,
            store,
            blobs,
        })
    }

    /// Re-read the document, discarding in-memory state
    pub fn load(&mut self) -> Result<&[PhotoRecord], StoreError> {
        self.records = self.store.load()?;
        Ok(&self.records)
    }

    /// Write the whole document
    pub fn save(&self) -> Result<(), StoreError> {
        self.store.save(&self.records)
    }

    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&PhotoRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Read the original bytes of a photo
    pub fn read_blob(&self, id: Uuid) -> Result<Vec<u8>, StoreError> {
        let record = self.get(id).ok_or_else(|| not_found(id))?;
        self.blobs.get(&record.blob_ref)
    }

    /// Append one record and persist
    pub fn append(&mut self, record: PhotoRecord) -> Result<(), StoreError> {
        self.extend(vec![record])
    }

    /// Append several records with a single write
    pub fn extend(&mut self, records: Vec<PhotoRecord>) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let mut seen: HashSet<Uuid> = self.records.iter().map(|r| r.id).collect();
        if let Some(taken) = records.iter().find(|r| !seen.insert(r.id)) {
            return Err(StoreError::DuplicateId {
                id: taken.id.to_string(),
            });
        }

        let before = self.records.len();
        self.records.extend(records);

        if let Err(e) = self.save() {
            self.records.truncate(before);
            return Err(e);
        }
        Ok(())
    }

    /// Delete a photo and its blob.
    ///
    /// The blob goes first. If it cannot be removed the failure is logged
    /// and the record is removed anyway, leaving an orphaned blob.
    pub fn delete(&mut self, id: Uuid) -> Result<PhotoRecord, StoreError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| not_found(id))?;

        let blob_ref = self.records[index].blob_ref.clone();
        if let Err(e) = self.blobs.delete(&blob_ref) {
            warn!("Could not delete blob {} for {}: {}", blob_ref, id, e);
        }

        let removed = self.records.remove(index);
        if let Err(e) = self.save() {
            self.records.insert(index, removed);
            return Err(e);
        }

        info!("Deleted photo {}", id);
        Ok(removed)
    }

    /// Correct the species label of a photo
    pub fn update_species(&mut self, id: Uuid, species: &str) -> Result<&PhotoRecord, StoreError> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| not_found(id))?;

        let previous = std::mem::replace(&mut self.records[index].species, species.trim().to_string());
        if let Err(e) = self.save() {
            self.records[index].species = previous;
            return Err(e);
        }
        Ok(&self.records[index])
    }
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::RecordNotFound { id: id.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::ContentHasher;
    use crate::core::store::{InMemoryBlobStore, InMemoryCatalogStore};
    use chrono::Utc;

    fn record(seed: &[u8]) -> PhotoRecord {
        let id = Uuid::new_v4();
        PhotoRecord {
            id,
            blob_ref: format!("{}.jpg", id),
            location: UNKNOWN_LOCATION.to_string(),
            timestamp: Utc::now(),
            exact_hash: ContentHasher::new().fingerprint(seed),
            perceptual_hash: None,
            species: UNKNOWN_SPECIES.to_string(),
            latitude: None,
            longitude: None,
        }
    }

    fn catalog_with_blob() -> (Catalog, Arc<InMemoryBlobStore>, Arc<InMemoryCatalogStore>, PhotoRecord) {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = Arc::new(InMemoryCatalogStore::new());
        let mut catalog = Catalog::open(store.clone(), blobs.clone()).unwrap();

        let r = record(b"walleye");
        blobs.put(&r.blob_ref, b"walleye").unwrap();
        catalog.append(r.clone()).unwrap();
        (catalog, blobs, store, r)
    }

    #[test]
    fn append_persists_whole_document() {
        let (_catalog, _blobs, store, r) = catalog_with_blob();
        assert_eq!(store.load().unwrap(), vec![r]);
    }

    #[test]
    fn delete_removes_record_and_blob() {
        let (mut catalog, blobs, store, r) = catalog_with_blob();

        let removed = catalog.delete(r.id).unwrap();

        assert_eq!(removed.id, r.id);
        assert!(catalog.get(r.id).is_none());
        assert!(store.load().unwrap().is_empty());
        assert!(!blobs.exists(&r.blob_ref));
        assert!(catalog.read_blob(r.id).is_err());
    }

    #[test]
    fn blob_delete_failure_does_not_block_record_removal() {
        let (mut catalog, blobs, store, r) = catalog_with_blob();
        blobs.fail_delete_of(&r.blob_ref);

        catalog.delete(r.id).unwrap();

        assert!(store.load().unwrap().is_empty());
        assert!(blobs.exists(&r.blob_ref));
    }

    #[test]
    fn extend_rejects_ids_already_present() {
        let (mut catalog, _blobs, store, r) = catalog_with_blob();
        let mut clash = record(b"perch");
        clash.id = r.id;

        let result = catalog.extend(vec![record(b"bass"), clash]);

        assert!(matches!(result, Err(StoreError::DuplicateId { .. })));
        assert_eq!(catalog.len(), 1);
        assert_eq!(store.load().unwrap(), vec![r]);
    }

    #[test]
    fn extend_rejects_ids_repeated_in_batch() {
        let (mut catalog, _blobs, _store, _r) = catalog_with_blob();
        let twin = record(b"crappie");
        let mut other = record(b"carp");
        other.id = twin.id;

        assert!(matches!(
            catalog.extend(vec![twin, other]),
            Err(StoreError::DuplicateId { .. })
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn delete_unknown_id_is_not_found() {
        let (mut catalog, _blobs, _store, _r) = catalog_with_blob();
        assert!(matches!(
            catalog.delete(Uuid::new_v4()),
            Err(StoreError::RecordNotFound { .. })
        ));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn failed_save_leaves_memory_unchanged() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = Arc::new(InMemoryCatalogStore::failing_saves());
        let mut catalog = Catalog::open(store, blobs).unwrap();

        assert!(catalog.append(record(b"carp")).is_err());
        assert!(catalog.is_empty());
    }

    #[test]
    fn update_species_keeps_identity_and_fingerprints() {
        let (mut catalog, _blobs, store, r) = catalog_with_blob();

        let updated = catalog.update_species(r.id, "  Walleye ").unwrap().clone();

        assert_eq!(updated.species, "Walleye");
        assert_eq!(updated.id, r.id);
        assert_eq!(updated.exact_hash, r.exact_hash);
        assert_eq!(updated.perceptual_hash, r.perceptual_hash);
        assert_eq!(store.load().unwrap()[0].species, "Walleye");
    }

    #[test]
    fn load_rereads_document() {
        let (mut catalog, _blobs, store, r) = catalog_with_blob();
        store.save(&[]).unwrap();

        assert!(catalog.load().unwrap().is_empty());
        assert!(catalog.get(r.id).is_none());
    }

    #[test]
    fn layout_paths() {
        let layout = LibraryLayout::new("/data/fishlog");
        assert_eq!(layout.catalog_path(), PathBuf::from("/data/fishlog/catalog.json"));
        assert_eq!(layout.blob_dir(), PathBuf::from("/data/fishlog/blobs"));
    }
}
