//! # Pipeline Module
//!
//! Brings a photo into the catalog.
//!
//! ## Ingestion Stages
//! 1. **Fingerprint** - Content digest, then perceptual fingerprint
//! 2. **Deduplicate** - Exact match first, then nearest within the threshold
//! 3. **Describe** - Timestamp and position from EXIF, hints or geocoding
//! 4. **Store** - Blob first, then the catalog record
//!
//! A blob whose record could not be saved is removed again, so the
//! catalog never points at a missing blob and failed ingestions leave
//! nothing behind.

mod executor;
mod import;

pub use executor::{
    blob_key, IngestConfig, IngestOutcome, IngestPipeline, IngestPipelineBuilder, IngestRequest,
};
pub use import::{import_scanned, ImportSummary};
