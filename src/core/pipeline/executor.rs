//! Single-photo ingestion.

use crate::core::catalog::{Catalog, PhotoRecord, UNKNOWN_LOCATION, UNKNOWN_SPECIES};
use crate::core::comparator::{
    ComparisonStrategy, Deduplicator, DuplicateVerdict, ThresholdStrategy, DEFAULT_THRESHOLD,
};
use crate::core::geocode::{CoordinateResolver, Geocoder, NoopGeocoder, DEFAULT_GEOCODE_TIMEOUT};
use crate::core::hasher::FastDecoder;
use crate::core::metadata::{Coordinates, MetadataExtractor};
use crate::core::store::BlobStore;
use crate::error::{FishlogError, StoreError};
use crate::events::{Event, EventSender, IngestEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Extension used for blobs whose format cannot be guessed
const FALLBACK_EXTENSION: &str = "jpg";

/// Blob key for a record: `<id>.<ext>`
pub fn blob_key(id: Uuid, bytes: &[u8]) -> String {
    format!(
        "{}.{}",
        id,
        FastDecoder::extension_for(bytes).unwrap_or(FALLBACK_EXTENSION)
    )
}

/// One photo to ingest, with optional caller-supplied fields
#[derive(Debug, Clone)]
pub struct IngestRequest {
    bytes: Vec<u8>,
    id: Option<Uuid>,
    location: Option<String>,
    species: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    coordinates: Option<Coordinates>,
    force: bool,
}

impl IngestRequest {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            id: None,
            location: None,
            species: None,
            timestamp: None,
            coordinates: None,
            force: false,
        }
    }

    /// Use this identifier instead of generating one
    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Location text; also the forward geocoding query
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    /// Capture time, overriding any embedded timestamp
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Coordinates known from outside the photo, used when it has no GPS data
    pub fn coordinates(mut self, coordinates: Option<Coordinates>) -> Self {
        self.coordinates = coordinates;
        self
    }

    /// Add the photo even if it duplicates an existing one
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn location_text(&self) -> Option<&str> {
        self.location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Result of one ingestion that did not fail outright
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// The photo was stored; the record is not yet in any catalog
    Added(PhotoRecord),
    /// The photo is already present; nothing was stored
    Duplicate(DuplicateVerdict),
    /// The bytes are not a decodable image; nothing was stored
    Undecodable { reason: String },
}

impl IngestOutcome {
    pub fn record(&self) -> Option<&PhotoRecord> {
        match self {
            IngestOutcome::Added(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<PhotoRecord> {
        match self {
            IngestOutcome::Added(record) => Some(record),
            _ => None,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, IngestOutcome::Added(_))
    }
}

/// Configuration for the ingest pipeline
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum perceptual distance still considered a duplicate
    pub threshold: u32,
    /// Bound on each geocoder call
    pub geocode_timeout: Duration,
    /// Reverse geocode a place name when no location text is given
    pub describe_locations: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            geocode_timeout: DEFAULT_GEOCODE_TIMEOUT,
            describe_locations: true,
        }
    }
}

/// Builder for the ingest pipeline
pub struct IngestPipelineBuilder {
    config: IngestConfig,
    blob_store: Option<Arc<dyn BlobStore>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    events: Option<EventSender>,
}

impl IngestPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: IngestConfig::default(),
            blob_store: None,
            geocoder: None,
            events: None,
        }
    }

    /// Where photo bytes are written (required)
    pub fn blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    /// Geocoder for location lookups (default: none)
    pub fn geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn geocode_timeout(mut self, timeout: Duration) -> Self {
        self.config.geocode_timeout = timeout;
        self
    }

    /// Set the comparison threshold
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.config.threshold = threshold;
        self
    }

    pub fn describe_locations(mut self, describe: bool) -> Self {
        self.config.describe_locations = describe;
        self
    }

    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Result<IngestPipeline, FishlogError> {
        let blobs = self
            .blob_store
            .ok_or_else(|| FishlogError::Config("ingest pipeline needs a blob store".to_string()))?;

        let strategy = ThresholdStrategy::new(self.config.threshold).ok_or_else(|| {
            FishlogError::Config(format!(
                "threshold {} exceeds the 64-bit fingerprint",
                self.config.threshold
            ))
        })?;

        let geocoder = self.geocoder.unwrap_or_else(|| Arc::new(NoopGeocoder));

        Ok(IngestPipeline {
            deduplicator: Deduplicator::with_strategy(strategy),
            extractor: MetadataExtractor::new(),
            resolver: CoordinateResolver::new(geocoder, self.config.geocode_timeout),
            blobs,
            describe_locations: self.config.describe_locations,
            events: self.events.unwrap_or_else(EventSender::detached),
        })
    }
}

impl Default for IngestPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns photo bytes into catalog records.
///
/// Steps, stopping early on a duplicate or a failure:
/// 1. Deduplicate against the caller's snapshot of the catalog
/// 2. Extract embedded metadata
/// 3. Timestamp: request, else embedded, else now
/// 4. Coordinates: embedded, else request, else forward geocode of the location text
/// 5. Write the blob
/// 6. Assemble the record
///
/// The pipeline never touches a catalog unless asked through [`IngestPipeline::ingest_into`].
pub struct IngestPipeline {
    deduplicator: Deduplicator,
    extractor: MetadataExtractor,
    resolver: CoordinateResolver,
    blobs: Arc<dyn BlobStore>,
    describe_locations: bool,
    events: EventSender,
}

impl IngestPipeline {
    /// Create a new pipeline builder
    pub fn builder() -> IngestPipelineBuilder {
        IngestPipelineBuilder::new()
    }

    pub fn threshold(&self) -> u32 {
        self.deduplicator.strategy().threshold()
    }

    /// Ingest one photo against a snapshot of existing records.
    ///
    /// Only a failed blob write is an error; duplicates and undecodable
    /// input are ordinary outcomes.
    pub async fn ingest(
        &self,
        request: IngestRequest,
        snapshot: &[PhotoRecord],
    ) -> Result<IngestOutcome, StoreError> {
        self.emit(IngestEvent::Started {
            size_bytes: request.bytes.len(),
        });

        let (verdict, decode_error) = match FastDecoder::decode(&request.bytes) {
            Ok(image) => (
                self.deduplicator
                    .check_decoded(&request.bytes, Some(&image), snapshot),
                None,
            ),
            Err(e) => (
                self.deduplicator.check_decoded(&request.bytes, None, snapshot),
                Some(e),
            ),
        };

        if verdict.is_duplicate {
            let matched_id = verdict.matched.as_ref().map(|r| r.id).unwrap_or_default();
            let distance = verdict.distance.unwrap_or(0);
            if !request.force {
                info!("Not added: {} of {} (distance {})", verdict.match_type, matched_id, distance);
                self.emit(IngestEvent::Duplicate {
                    matched_id,
                    distance,
                });
                return Ok(IngestOutcome::Duplicate(verdict));
            }
            info!("Adding forced duplicate of {} (distance {})", matched_id, distance);
        }

        if let Some(e) = decode_error {
            let reason = e.to_string();
            info!("Not added: {}", reason);
            self.emit(IngestEvent::Undecodable {
                reason: reason.clone(),
            });
            return Ok(IngestOutcome::Undecodable { reason });
        }

        let metadata = self.extractor.extract(&request.bytes);
        let timestamp = request
            .timestamp
            .or(metadata.timestamp)
            .unwrap_or_else(Utc::now);

        let location_text = request.location_text();
        let known = metadata.coordinates.or(request.coordinates);
        let coordinates = self
            .resolver
            .resolve(known, location_text.unwrap_or_default())
            .await;

        let location = match (location_text, coordinates) {
            (Some(text), _) => Some(text.to_string()),
            (None, Some(c)) if self.describe_locations => self.resolver.describe(c).await,
            _ => None,
        }
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        let id = match request.id {
            Some(id) if snapshot.iter().any(|r| r.id == id) => {
                warn!("Id {} is already taken; assigning a new one", id);
                Uuid::new_v4()
            }
            Some(id) => id,
            None => Uuid::new_v4(),
        };
        let blob_ref = blob_key(id, &request.bytes);
        if let Err(e) = self.blobs.put(&blob_ref, &request.bytes) {
            warn!("Blob write failed for {}: {}", id, e);
            self.emit(IngestEvent::Failed {
                message: e.to_string(),
            });
            return Err(e);
        }

        let species = request
            .species
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SPECIES)
            .to_string();

        let mut record = PhotoRecord {
            id,
            blob_ref,
            location,
            timestamp,
            exact_hash: verdict.exact,
            perceptual_hash: verdict.perceptual,
            species,
            latitude: None,
            longitude: None,
        };
        record.set_coordinates(coordinates);

        debug!("Assembled record {:?}", record);
        self.emit(IngestEvent::Added { id });
        Ok(IngestOutcome::Added(record))
    }

    /// Ingest against a catalog and append the new record to it.
    ///
    /// If the catalog cannot be saved the blob just written is removed
    /// again and the error returned.
    pub async fn ingest_into(
        &self,
        request: IngestRequest,
        catalog: &mut Catalog,
    ) -> Result<IngestOutcome, StoreError> {
        let outcome = self.ingest(request, catalog.records()).await?;

        if let IngestOutcome::Added(record) = &outcome {
            if let Err(e) = catalog.append(record.clone()) {
                self.discard_blob(&record.blob_ref);
                self.emit(IngestEvent::Failed {
                    message: e.to_string(),
                });
                return Err(e);
            }
            info!("Added photo {}", record.id);
        }
        Ok(outcome)
    }

    /// Remove a blob whose record never reached the catalog
    pub(crate) fn discard_blob(&self, key: &str) {
        if let Err(e) = self.blobs.delete(key) {
            warn!("Could not remove orphaned blob {}: {}", key, e);
        }
    }

    fn emit(&self, event: IngestEvent) {
        self.events.send(Event::Ingest(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geocode::StaticGeocoder;
    use crate::core::store::{CatalogStore, InMemoryBlobStore, InMemoryCatalogStore};
    use crate::core::test_support::{
        base_pattern, flip_cells, jpeg_with_exif, pattern_png, ExifFields,
    };
    use crate::events::event_channel;
    use chrono::TimeZone;

    fn pipeline_with(blobs: Arc<InMemoryBlobStore>) -> IngestPipeline {
        IngestPipeline::builder().blob_store(blobs).build().unwrap()
    }

    fn lake() -> Coordinates {
        Coordinates::new(44.93, -93.61).unwrap()
    }

    #[test]
    fn builder_requires_blob_store() {
        assert!(matches!(
            IngestPipeline::builder().build(),
            Err(FishlogError::Config(_))
        ));
    }

    #[test]
    fn builder_rejects_oversized_threshold() {
        let result = IngestPipeline::builder()
            .blob_store(Arc::new(InMemoryBlobStore::new()))
            .threshold(65)
            .build();
        assert!(matches!(result, Err(FishlogError::Config(_))));
    }

    #[test]
    fn blob_key_uses_detected_extension() {
        let id = Uuid::nil();
        assert!(blob_key(id, &pattern_png(&base_pattern())).ends_with(".png"));
        assert!(blob_key(id, b"????").ends_with(".jpg"));
    }

    #[tokio::test]
    async fn new_photo_is_added_with_defaults() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let pipeline = pipeline_with(blobs.clone());
        let bytes = pattern_png(&base_pattern());

        let before = Utc::now();
        let outcome = pipeline.ingest(IngestRequest::new(bytes.clone()), &[]).await.unwrap();
        let record = outcome.into_record().unwrap();

        assert_eq!(record.species, UNKNOWN_SPECIES);
        assert_eq!(record.location, UNKNOWN_LOCATION);
        assert!(record.timestamp >= before);
        assert!(record.coordinates().is_none());
        assert_eq!(record.perceptual_hash.as_ref().map(|p| p.len()), Some(64));
        assert_eq!(blobs.get(&record.blob_ref).unwrap(), bytes);
    }

    #[tokio::test]
    async fn duplicate_is_reported_without_blob_write() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let pipeline = pipeline_with(blobs.clone());
        let bytes = pattern_png(&base_pattern());

        let first = pipeline
            .ingest(IngestRequest::new(bytes.clone()), &[])
            .await
            .unwrap()
            .into_record()
            .unwrap();

        let outcome = pipeline
            .ingest(IngestRequest::new(bytes), std::slice::from_ref(&first))
            .await
            .unwrap();

        match outcome {
            IngestOutcome::Duplicate(verdict) => {
                assert_eq!(verdict.distance, Some(0));
                assert_eq!(verdict.matched.unwrap().id, first.id);
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
        assert_eq!(blobs.len(), 1);
    }

    #[tokio::test]
    async fn force_adds_near_duplicate() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let pipeline = pipeline_with(blobs.clone());

        let first = pipeline
            .ingest(IngestRequest::new(pattern_png(&base_pattern())), &[])
            .await
            .unwrap()
            .into_record()
            .unwrap();

        let near = pattern_png(&flip_cells(&base_pattern(), 3));
        let snapshot = vec![first];
        let refused = pipeline
            .ingest(IngestRequest::new(near.clone()), &snapshot)
            .await
            .unwrap();
        assert!(matches!(refused, IngestOutcome::Duplicate(_)));

        let forced = pipeline
            .ingest(IngestRequest::new(near).force(true), &snapshot)
            .await
            .unwrap();
        assert!(forced.is_added());
        assert_eq!(blobs.len(), 2);
    }

    #[tokio::test]
    async fn undecodable_bytes_are_not_stored() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let pipeline = pipeline_with(blobs.clone());

        let outcome = pipeline
            .ingest(IngestRequest::new(b"not a photo".to_vec()), &[])
            .await
            .unwrap();

        assert!(matches!(outcome, IngestOutcome::Undecodable { .. }));
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn exif_capture_time_beats_now() {
        let pipeline = pipeline_with(Arc::new(InMemoryBlobStore::new()));
        let bytes = jpeg_with_exif(&ExifFields {
            capture_time: Some("2023:06:15 10:30:00"),
            ..ExifFields::default()
        });

        let record = pipeline
            .ingest(IngestRequest::new(bytes), &[])
            .await
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(
            record.timestamp,
            Utc.with_ymd_and_hms(2023, 6, 15, 10, 30, 0).unwrap()
        );
        assert!(record.blob_ref.ends_with(".jpg"));
    }

    #[tokio::test]
    async fn explicit_timestamp_beats_exif() {
        let pipeline = pipeline_with(Arc::new(InMemoryBlobStore::new()));
        let bytes = jpeg_with_exif(&ExifFields {
            capture_time: Some("2023:06:15 10:30:00"),
            ..ExifFields::default()
        });
        let chosen = Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();

        let record = pipeline
            .ingest(IngestRequest::new(bytes).timestamp(chosen), &[])
            .await
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(record.timestamp, chosen);
    }

    #[tokio::test]
    async fn location_text_is_geocoded_and_kept() {
        let pipeline = IngestPipeline::builder()
            .blob_store(Arc::new(InMemoryBlobStore::new()))
            .geocoder(Arc::new(StaticGeocoder::new().with_place("Lake Minnetonka", lake())))
            .build()
            .unwrap();

        let record = pipeline
            .ingest(
                IngestRequest::new(pattern_png(&base_pattern()))
                    .location("Lake Minnetonka")
                    .species("Walleye"),
                &[],
            )
            .await
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(record.location, "Lake Minnetonka");
        assert_eq!(record.species, "Walleye");
        assert_eq!(record.coordinates(), Some(lake()));
    }

    #[tokio::test]
    async fn embedded_gps_beats_geocoding_and_is_described() {
        let geocoder = Arc::new(
            StaticGeocoder::new()
                .with_place("Somewhere Else", Coordinates::new(1.0, 1.0).unwrap())
                .with_place("Lower Bay", Coordinates::new(-40.5, -74.0).unwrap()),
        );
        let pipeline = IngestPipeline::builder()
            .blob_store(Arc::new(InMemoryBlobStore::new()))
            .geocoder(geocoder)
            .build()
            .unwrap();
        let bytes = jpeg_with_exif(&ExifFields {
            latitude: Some(([40, 30, 0], "S")),
            longitude: Some(([74, 0, 0], "W")),
            ..ExifFields::default()
        });

        let record = pipeline
            .ingest(IngestRequest::new(bytes), &[])
            .await
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(record.latitude, Some(-40.5));
        assert_eq!(record.longitude, Some(-74.0));
        assert_eq!(record.location, "Lower Bay");
    }

    #[tokio::test]
    async fn coordinate_hint_used_without_gps() {
        let pipeline = IngestPipeline::builder()
            .blob_store(Arc::new(InMemoryBlobStore::new()))
            .describe_locations(false)
            .build()
            .unwrap();

        let record = pipeline
            .ingest(
                IngestRequest::new(pattern_png(&base_pattern())).coordinates(Some(lake())),
                &[],
            )
            .await
            .unwrap()
            .into_record()
            .unwrap();

        assert_eq!(record.coordinates(), Some(lake()));
        assert_eq!(record.location, UNKNOWN_LOCATION);
    }

    #[tokio::test]
    async fn blob_failure_is_an_error() {
        let (sender, receiver) = event_channel();
        let pipeline = IngestPipeline::builder()
            .blob_store(Arc::new(InMemoryBlobStore::failing_writes()))
            .events(sender)
            .build()
            .unwrap();

        let result = pipeline
            .ingest(IngestRequest::new(pattern_png(&base_pattern())), &[])
            .await;

        assert!(matches!(result, Err(StoreError::BlobWrite { .. })));
        let failed = receiver
            .iter()
            .take(2)
            .any(|e| matches!(e, Event::Ingest(IngestEvent::Failed { .. })));
        assert!(failed);
    }

    #[tokio::test]
    async fn ingest_into_appends_and_persists() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = Arc::new(InMemoryCatalogStore::new());
        let mut catalog = Catalog::open(store.clone(), blobs.clone()).unwrap();
        let pipeline = pipeline_with(blobs);

        let bytes = pattern_png(&base_pattern());
        let outcome = pipeline
            .ingest_into(IngestRequest::new(bytes.clone()), &mut catalog)
            .await
            .unwrap();
        let id = outcome.record().unwrap().id;

        assert_eq!(store.load().unwrap()[0].id, id);

        let again = pipeline
            .ingest_into(IngestRequest::new(bytes), &mut catalog)
            .await
            .unwrap();
        assert!(matches!(again, IngestOutcome::Duplicate(_)));
        assert_eq!(catalog.len(), 1);
    }

    #[tokio::test]
    async fn failed_catalog_save_removes_new_blob() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let mut catalog =
            Catalog::open(Arc::new(InMemoryCatalogStore::failing_saves()), blobs.clone()).unwrap();
        let pipeline = pipeline_with(blobs.clone());

        let result = pipeline
            .ingest_into(IngestRequest::new(pattern_png(&base_pattern())), &mut catalog)
            .await;

        assert!(result.is_err());
        assert!(catalog.is_empty());
        assert!(blobs.is_empty());
    }

    #[tokio::test]
    async fn taken_id_is_replaced_and_existing_blob_kept() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let mut catalog =
            Catalog::open(Arc::new(InMemoryCatalogStore::new()), blobs.clone()).unwrap();
        let pipeline = pipeline_with(blobs.clone());

        let first_bytes = pattern_png(&base_pattern());
        let first = pipeline
            .ingest_into(IngestRequest::new(first_bytes.clone()), &mut catalog)
            .await
            .unwrap()
            .into_record()
            .unwrap();

        let second = pipeline
            .ingest_into(
                IngestRequest::new(pattern_png(&flip_cells(&base_pattern(), 40))).id(first.id),
                &mut catalog,
            )
            .await
            .unwrap()
            .into_record()
            .unwrap();

        assert_ne!(second.id, first.id);
        assert_ne!(second.blob_ref, first.blob_ref);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.read_blob(first.id).unwrap(), first_bytes);
    }
}
