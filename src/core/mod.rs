//! # Core Module
//!
//! The front-end agnostic catch log engine.
//!
//! ## Modules
//! - `hasher` - Exact and perceptual fingerprints
//! - `metadata` - Capture time and GPS position from EXIF
//! - `geocode` - Place names to coordinates and back
//! - `comparator` - Decides whether a photo is already present
//! - `classifier` - Says whether a photo shows a fish
//! - `store` - Blob and catalog persistence
//! - `catalog` - The photo records and their lifecycle
//! - `pipeline` - Single-photo ingestion
//! - `scanner` - Bulk discovery over large photo sources

pub mod catalog;
pub mod classifier;
pub mod comparator;
pub mod geocode;
pub mod hasher;
pub mod metadata;
pub mod pipeline;
pub mod scanner;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use catalog::{Catalog, LibraryLayout, PhotoRecord};
pub use comparator::{Deduplicator, DuplicateVerdict, MatchType};
pub use hasher::{ContentDigest, PerceptualFingerprint};
pub use metadata::Coordinates;
pub use pipeline::{IngestOutcome, IngestPipeline, IngestRequest};
pub use scanner::{BatchScanner, Scan, ScannedPhoto};
