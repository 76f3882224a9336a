//! # Scanner Module
//!
//! Finds new catches in a large photo source.
//!
//! ## How It Works
//! For each source item, in order:
//! 1. Decode and classify; items without a fish are skipped before hashing
//! 2. Skip items byte-identical to one already accepted by this scan
//! 3. Skip items within the threshold of one already accepted by this scan
//! 4. Otherwise remember the fingerprints and yield a new photo
//!
//! Progress advances after every item, whatever happened to it.
//!
//! A scan only deduplicates against itself. Yielded photos are not stored
//! anywhere; pass them to [`import_scanned`](crate::core::pipeline::import_scanned)
//! to check them against the catalog and commit them.
//!
//! ## Example
//! ```rust,ignore
//! let source = DirectorySource::open(&path, &SourceConfig::default())?;
//! let mut scan = BatchScanner::builder().build()?.scan(source, classifier);
//! while let Some(photo) = scan.next_photo().await {
//!     println!("{} ({:.0}%)", photo.record.species, scan.progress().fraction() * 100.0);
//! }
//! ```

mod filter;
mod index;
mod source;

pub use filter::{ImageFilter, DEFAULT_EXTENSIONS};
pub use index::ScanIndex;
pub use source::{DirectorySource, SourceConfig, SourceItem};

use crate::core::catalog::{PhotoRecord, UNKNOWN_LOCATION};
use crate::core::classifier::SpeciesClassifier;
use crate::core::comparator::{ComparisonStrategy, ThresholdStrategy, DEFAULT_THRESHOLD};
use crate::core::geocode::{CoordinateResolver, Geocoder, NoopGeocoder, DEFAULT_GEOCODE_TIMEOUT};
use crate::core::hasher::{
    ContentDigest, ContentHasher, FastDecoder, PerceptualFingerprint, PerceptualHasher,
};
use crate::core::metadata::{Coordinates, MetadataExtractor};
use crate::core::pipeline::blob_key;
use crate::error::{FishlogError, ScanError};
use crate::events::{Event, EventSender, ScanEvent, ScanProgressUpdate, SkipReason};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A photo found by a scan, not yet stored anywhere
#[derive(Debug, Clone)]
pub struct ScannedPhoto {
    /// The record it would become; `blob_ref` is the key it would be stored under
    pub record: PhotoRecord,
    pub bytes: Vec<u8>,
}

/// Shared view of a scan's progress
#[derive(Debug, Clone)]
pub struct ScanProgress {
    processed: Arc<AtomicUsize>,
    total: usize,
}

impl ScanProgress {
    fn new(total: usize) -> Self {
        Self {
            processed: Arc::new(AtomicUsize::new(0)),
            total,
        }
    }

    fn advance(&self) -> usize {
        self.processed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Fraction of items processed, in `[0, 1]`; an empty source is complete
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.processed() as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// Configuration for the batch scanner
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Maximum perceptual distance still considered a duplicate
    pub threshold: u32,
    /// Bound on each reverse geocoding call
    pub geocode_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            geocode_timeout: DEFAULT_GEOCODE_TIMEOUT,
        }
    }
}

/// Builder for the batch scanner
pub struct BatchScannerBuilder {
    config: ScannerConfig,
    geocoder: Option<Arc<dyn Geocoder>>,
    events: Option<EventSender>,
}

impl BatchScannerBuilder {
    pub fn new() -> Self {
        Self {
            config: ScannerConfig::default(),
            geocoder: None,
            events: None,
        }
    }

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

    pub fn events(mut self, events: EventSender) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<BatchScanner, FishlogError> {
        let strategy = ThresholdStrategy::new(self.config.threshold).ok_or_else(|| {
            FishlogError::Config(format!(
                "threshold {} exceeds the 64-bit fingerprint",
                self.config.threshold
            ))
        })?;
        let geocoder = self.geocoder.unwrap_or_else(|| Arc::new(NoopGeocoder));

        Ok(BatchScanner {
            strategy,
            resolver: CoordinateResolver::new(geocoder, self.config.geocode_timeout),
            events: self.events.unwrap_or_else(EventSender::detached),
        })
    }
}

impl Default for BatchScannerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts scans over bulk photo sources
pub struct BatchScanner {
    strategy: ThresholdStrategy,
    resolver: CoordinateResolver,
    events: EventSender,
}

impl BatchScanner {
    pub fn builder() -> BatchScannerBuilder {
        BatchScannerBuilder::new()
    }

    /// Start a scan. Nothing is read until the scan is polled.
    pub fn scan<I>(&self, source: I, classifier: Arc<dyn SpeciesClassifier>) -> Scan
    where
        I: IntoIterator<Item = Result<SourceItem, ScanError>>,
        I::IntoIter: ExactSizeIterator + Send + 'static,
    {
        let items = source.into_iter();
        let total = items.len();
        info!("Scanning {} items", total);
        self.events.send(Event::Scan(ScanEvent::Started { total }));

        Scan {
            items: Some(Box::new(items)),
            classifier,
            index: ScanIndex::new(),
            strategy: self.strategy,
            resolver: self.resolver.clone(),
            progress: ScanProgress::new(total),
            events: self.events.clone(),
            next_index: 0,
            found: 0,
            finished: false,
        }
    }
}

/// Result of the blocking part of processing one item
enum Analysis {
    Undecodable,
    NotSubject,
    Subject {
        bytes: Vec<u8>,
        species: String,
        exact: ContentDigest,
        perceptual: Option<PerceptualFingerprint>,
        timestamp: Option<DateTime<Utc>>,
        coordinates: Option<Coordinates>,
    },
}

fn analyze(item: SourceItem, classifier: &dyn SpeciesClassifier) -> Analysis {
    let SourceItem {
        bytes,
        native_timestamp,
        native_coordinates,
        embedded,
    } = item;

    let image = match FastDecoder::decode(&bytes) {
        Ok(image) => image,
        Err(e) => {
            debug!("Undecodable item: {}", e);
            return Analysis::Undecodable;
        }
    };

    let classification = classifier.classify(&image);
    if !classification.is_match {
        return Analysis::NotSubject;
    }

    let exact = ContentHasher::new().fingerprint(&bytes);
    let perceptual = PerceptualHasher::new().fingerprint(&image);
    let metadata = embedded.unwrap_or_else(|| MetadataExtractor::new().extract(&bytes));

    Analysis::Subject {
        species: classification.species().to_string(),
        bytes,
        exact,
        perceptual,
        timestamp: native_timestamp.or(metadata.timestamp),
        coordinates: native_coordinates.or(metadata.coordinates),
    }
}

type SourceIter = Box<dyn ExactSizeIterator<Item = Result<SourceItem, ScanError>> + Send>;

/// One running scan: a lazy, finite, non-restartable sequence of photos.
///
/// Dropping the scan abandons it; nothing it found has been stored.
pub struct Scan {
    /// Lent to a blocking task while an item is read and analyzed
    items: Option<SourceIter>,
    classifier: Arc<dyn SpeciesClassifier>,
    index: ScanIndex,
    strategy: ThresholdStrategy,
    resolver: CoordinateResolver,
    progress: ScanProgress,
    events: EventSender,
    next_index: usize,
    found: usize,
    finished: bool,
}

impl Scan {
    /// Progress handle; stays valid after the scan is consumed
    pub fn progress(&self) -> ScanProgress {
        self.progress.clone()
    }

    /// Process source items until one yields a new photo
    pub async fn next_photo(&mut self) -> Option<ScannedPhoto> {
        while !self.finished {
            let Some(analysis) = self.read_next().await else {
                self.finish();
                break;
            };

            let index = self.next_index;
            self.next_index += 1;

            let outcome = self.process(analysis).await;
            let processed = self.progress.advance();
            self.events.send(Event::Scan(ScanEvent::Progress(ScanProgressUpdate {
                processed,
                total: self.progress.total(),
            })));

            match outcome {
                Ok(photo) => {
                    self.found += 1;
                    self.events.send(Event::Scan(ScanEvent::Found {
                        id: photo.record.id,
                    }));
                    return Some(photo);
                }
                Err(reason) => {
                    debug!("Skipped item {}: {}", index, reason);
                    self.events
                        .send(Event::Scan(ScanEvent::Skipped { index, reason }));
                }
            }
        }
        None
    }

    /// Drain the scan into a stream of photos
    pub fn into_stream(self) -> impl Stream<Item = ScannedPhoto> {
        stream::unfold(self, |mut scan| async move {
            let photo = scan.next_photo().await?;
            Some((photo, scan))
        })
    }

    /// Drain the scan, collecting every new photo
    pub async fn collect_all(mut self) -> Vec<ScannedPhoto> {
        let mut photos = Vec::new();
        while let Some(photo) = self.next_photo().await {
            photos.push(photo);
        }
        photos
    }

    /// Read and analyze the next source item off the async executor.
    ///
    /// `None` once the source is exhausted.
    async fn read_next(&mut self) -> Option<Result<Analysis, ScanError>> {
        let mut items = self.items.take()?;
        let classifier = Arc::clone(&self.classifier);

        let joined = tokio::task::spawn_blocking(move || {
            let next = items
                .next()
                .map(|item| item.map(|item| analyze(item, classifier.as_ref())));
            (items, next)
        })
        .await;

        match joined {
            Ok((items, next)) => {
                self.items = Some(items);
                next
            }
            Err(e) => {
                warn!("Source task failed, ending scan: {}", e);
                None
            }
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        info!(
            "Scan complete: {} new of {} processed",
            self.found,
            self.progress.processed()
        );
        self.events.send(Event::Scan(ScanEvent::Completed {
            found: self.found,
            processed: self.progress.processed(),
        }));
    }

    async fn process(
        &mut self,
        analysis: Result<Analysis, ScanError>,
    ) -> Result<ScannedPhoto, SkipReason> {
        let analysis = analysis.map_err(|e| {
            warn!("{}", e);
            SkipReason::Unreadable
        })?;

        let (bytes, species, exact, perceptual, timestamp, coordinates) = match analysis {
            Analysis::Undecodable => return Err(SkipReason::Undecodable),
            Analysis::NotSubject => return Err(SkipReason::NotSubject),
            Analysis::Subject {
                bytes,
                species,
                exact,
                perceptual,
                timestamp,
                coordinates,
            } => (bytes, species, exact, perceptual, timestamp, coordinates),
        };

        if self.index.contains_exact(&exact) {
            return Err(SkipReason::ExactDuplicate);
        }
        if let Some(fingerprint) = &perceptual {
            if let Some((matched, distance)) = self.index.nearest(fingerprint) {
                if self.strategy.is_duplicate(distance) {
                    debug!("Within {} bits of {}", distance, matched);
                    return Err(SkipReason::NearDuplicate);
                }
            }
        }

        let id = Uuid::new_v4();
        self.index.insert(exact, perceptual.clone(), id);

        let location = match coordinates {
            Some(c) => self.resolver.describe(c).await,
            None => None,
        }
        .unwrap_or_else(|| UNKNOWN_LOCATION.to_string());

        let mut record = PhotoRecord {
            id,
            blob_ref: blob_key(id, &bytes),
            location,
            timestamp: timestamp.unwrap_or_else(Utc::now),
            exact_hash: exact,
            perceptual_hash: perceptual,
            species,
            latitude: None,
            longitude: None,
        };
        record.set_coordinates(coordinates);

        Ok(ScannedPhoto { record, bytes })
    }
}
