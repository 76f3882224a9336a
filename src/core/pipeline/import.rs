//! Committing scan results to a catalog.

use super::executor::{IngestOutcome, IngestPipeline, IngestRequest};
use crate::core::catalog::{Catalog, PhotoRecord, UNKNOWN_LOCATION};
use crate::core::scanner::ScannedPhoto;
use crate::error::StoreError;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// What happened to each photo offered for import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Records added to the catalog, in scan order
    pub imported: Vec<Uuid>,
    /// Photos already present in the catalog
    pub duplicates: usize,
    /// Photos whose bytes could not be decoded
    pub undecodable: usize,
    /// Photos whose blob could not be written
    pub failed: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported.len() + self.duplicates + self.undecodable + self.failed
    }
}

/// Ingest scanned photos into `catalog`.
///
/// Each photo is checked against the catalog and against the photos
/// imported before it. The catalog is saved once at the end; if that save
/// fails every blob written by this import is removed again.
pub async fn import_scanned(
    pipeline: &IngestPipeline,
    catalog: &mut Catalog,
    photos: Vec<ScannedPhoto>,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    let mut snapshot: Vec<PhotoRecord> = catalog.records().to_vec();
    let existing = snapshot.len();

    for photo in photos {
        let ScannedPhoto { record, bytes } = photo;
        let mut request = IngestRequest::new(bytes)
            .id(record.id)
            .timestamp(record.timestamp)
            .species(record.species.clone())
            .coordinates(record.coordinates());
        if record.location != UNKNOWN_LOCATION {
            request = request.location(record.location.clone());
        }

        match pipeline.ingest(request, &snapshot).await {
            Ok(IngestOutcome::Added(added)) => {
                summary.imported.push(added.id);
                snapshot.push(added);
            }
            Ok(IngestOutcome::Duplicate(_)) => summary.duplicates += 1,
            Ok(IngestOutcome::Undecodable { .. }) => summary.undecodable += 1,
            Err(e) => {
                warn!("Could not import {}: {}", record.id, e);
                summary.failed += 1;
            }
        }
    }

    let added = snapshot.split_off(existing);
    let keys: Vec<String> = added.iter().map(|r| r.blob_ref.clone()).collect();
    if let Err(e) = catalog.extend(added) {
        for key in &keys {
            pipeline.discard_blob(key);
        }
        return Err(e);
    }

    info!(
        "Imported {} photos ({} duplicates, {} undecodable, {} failed)",
        summary.imported.len(),
        summary.duplicates,
        summary.undecodable,
        summary.failed
    );
    Ok(summary)
}
