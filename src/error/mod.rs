//! # Error Module
//!
//! Error types for the catch log.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - record ids, blob keys, paths
//! - **Expected outcomes are not errors** - a duplicate photo or a missing
//!   EXIF field is reported through normal return values
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum FishlogError {
    #[error("Decoding error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Geocoding error: {0}")]
    Geocode(#[from] GeocodeError),

    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// The bytes could not be turned into a pixel grid
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {reason}")]
    Corrupt { reason: String },

    #[error("Image is empty (zero width or height)")]
    EmptyImage,

    #[error("Failed to resample image: {reason}")]
    Resample { reason: String },
}

/// Blob and catalog persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to write blob {key}: {source}. The photo was not added; try again.")]
    BlobWrite {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read blob {key}: {source}")]
    BlobRead {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to delete blob {key}: {source}")]
    BlobDelete {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Blob not found: {key}")]
    BlobNotFound { key: String },

    #[error("Failed to read catalog at {path}: {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write catalog at {path}: {source}. Nothing was changed; try again.")]
    CatalogWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog document is corrupted: {0}. Restore a backup of catalog.json.")]
    Corrupted(String),

    #[error("Failed to serialize catalog: {0}")]
    Serialization(String),

    #[error("No photo with id {id}")]
    RecordNotFound { id: String },

    #[error("A photo with id {id} is already in the catalog")]
    DuplicateId { id: String },

    #[error("Store lock was poisoned")]
    Poisoned,
}

/// Failures of the external geocoding service
#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("Geocoding timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("Geocoding request failed: {0}")]
    Request(String),

    #[error("Unexpected geocoder response: {0}")]
    BadResponse(String),
}

/// Errors raised while enumerating a bulk photo source
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadItem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk directory: {0}")]
    Walk(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, FishlogError>;
