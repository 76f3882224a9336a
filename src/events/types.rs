//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All events emitted by the ingestion engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Single-photo ingestion events
    Ingest(IngestEvent),
    /// Bulk scan events
    Scan(ScanEvent),
}

/// Events during a single ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IngestEvent {
    /// Ingestion of a photo has started
    Started { size_bytes: usize },
    /// The photo matched an existing record and was not added
    Duplicate { matched_id: Uuid, distance: u32 },
    /// The bytes could not be decoded as an image
    Undecodable { reason: String },
    /// A new record was created
    Added { id: Uuid },
    /// Persisting the photo failed
    Failed { message: String },
}

/// Why a scanned item did not produce a photo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The source could not provide the item
    Unreadable,
    /// The bytes are not a decodable image
    Undecodable,
    /// The classifier did not find the target subject
    NotSubject,
    /// Byte-identical to an item seen earlier in the scan
    ExactDuplicate,
    /// Perceptually close to an item seen earlier in the scan
    NearDuplicate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Unreadable => write!(f, "unreadable"),
            SkipReason::Undecodable => write!(f, "not an image"),
            SkipReason::NotSubject => write!(f, "no fish found"),
            SkipReason::ExactDuplicate => write!(f, "exact duplicate"),
            SkipReason::NearDuplicate => write!(f, "near duplicate"),
        }
    }
}

/// Events during a bulk scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { total: usize },
    /// One more source item has been processed
    Progress(ScanProgressUpdate),
    /// A source item was skipped
    Skipped { index: usize, reason: SkipReason },
    /// A new photo was found
    Found { id: Uuid },
    /// The source is exhausted
    Completed { found: usize, processed: usize },
}

/// Progress information during a scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgressUpdate {
    /// Number of source items handled so far
    pub processed: usize,
    /// Total number of source items
    pub total: usize,
}
