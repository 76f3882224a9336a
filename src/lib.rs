//! # Fishlog
//!
//! A personal catch log: ingest fishing photos, work out when and where
//! they were taken, and refuse photos that are already in the log.
//!
//! ## Core Philosophy
//! - **One photo, one record** - Exact and near duplicates are rejected before anything is stored
//! - **Enrichment never blocks** - Missing EXIF or an unreachable geocoder degrade to "unknown"
//! - **No orphans** - A blob is only kept if its record was saved
//!
//! ## Architecture
//! The library is split into a core engine and presentation layers:
//! - `core` - Fingerprinting, deduplication, ingestion and scanning
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{FishlogError, Result};

/// Initialize tracing for the library
///
/// This should be called by the application entry point. Calling it more
/// than once leaves the first subscriber in place.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
