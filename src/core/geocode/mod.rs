//! # Geocode Module
//!
//! Bridges place names and coordinates through an external geocoder.
//!
//! Lookups are enrichment only. Every call is bounded by a timeout, and a
//! failure, an empty answer or a timeout all degrade to "unknown" instead
//! of failing the photo being processed.
//!
//! ## Geocoders
//! - `NominatimGeocoder` - OpenStreetMap Nominatim over HTTP
//! - `StaticGeocoder` - a fixed table of places, for offline use and tests
//! - `NoopGeocoder` - never resolves anything

mod nominatim;

pub use nominatim::{format_place, NominatimAddress, NominatimGeocoder, NOMINATIM_URL};

use crate::core::metadata::Coordinates;
use crate::error::GeocodeError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How long a single lookup may take before it counts as failed
pub const DEFAULT_GEOCODE_TIMEOUT: Duration = Duration::from_secs(5);

/// Forward and reverse geocoding
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve free text to a position
    async fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError>;

    /// Describe a position as free text
    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>, GeocodeError>;
}

/// Geocoder that never resolves anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn forward(&self, _query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(None)
    }

    async fn reverse(&self, _coordinates: Coordinates) -> Result<Option<String>, GeocodeError> {
        Ok(None)
    }
}

/// Geocoder backed by a fixed list of named places.
///
/// Forward lookups match names case-insensitively. Reverse lookups return
/// the nearest place within `radius` degrees.
#[derive(Debug)]
pub struct StaticGeocoder {
    places: Vec<(String, Coordinates)>,
    radius: f64,
    calls: AtomicUsize,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self {
            places: Vec::new(),
            radius: 0.1,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_place(mut self, name: &str, coordinates: Coordinates) -> Self {
        self.places.push((name.to_string(), coordinates));
        self
    }

    pub fn with_radius(mut self, degrees: f64) -> Self {
        self.radius = degrees;
        self
    }

    /// Number of lookups served so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let query = query.trim();
        Ok(self
            .places
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(query))
            .map(|(_, coordinates)| *coordinates))
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let distance = |c: &Coordinates| {
            (c.latitude - coordinates.latitude).hypot(c.longitude - coordinates.longitude)
        };

        Ok(self
            .places
            .iter()
            .map(|(name, c)| (name, distance(c)))
            .filter(|(_, d)| *d <= self.radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name.clone()))
    }
}

/// Best-effort, timeout-bounded geocoding
#[derive(Clone)]
pub struct CoordinateResolver {
    geocoder: Arc<dyn Geocoder>,
    timeout: Duration,
}

impl CoordinateResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, timeout: Duration) -> Self {
        Self { geocoder, timeout }
    }

    /// A resolver that never performs lookups
    pub fn offline() -> Self {
        Self::new(Arc::new(NoopGeocoder), DEFAULT_GEOCODE_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Final coordinates for a photo.
    ///
    /// Known coordinates pass through unchanged. Otherwise a non-empty
    /// `location_text` is forward geocoded.
    pub async fn resolve(
        &self,
        known: Option<Coordinates>,
        location_text: &str,
    ) -> Option<Coordinates> {
        if known.is_some() {
            return known;
        }

        let query = location_text.trim();
        if query.is_empty() {
            return None;
        }

        let found = self.bounded("forward", self.geocoder.forward(query)).await?;
        debug!("Geocoded {:?} to {}", query, found);
        Some(found)
    }

    /// Describe coordinates as place text, if the geocoder knows them
    pub async fn describe(&self, coordinates: Coordinates) -> Option<String> {
        let text = self
            .bounded("reverse", self.geocoder.reverse(coordinates))
            .await?;
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    async fn bounded<T, F>(&self, kind: &str, lookup: F) -> Option<T>
    where
        F: std::future::Future<Output = Result<Option<T>, GeocodeError>>,
    {
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(found)) => found,
            Ok(Err(e)) => {
                warn!("{} geocode failed: {}", kind, e);
                None
            }
            Err(_) => {
                let e = GeocodeError::TimedOut {
                    after: self.timeout,
                };
                warn!("{} geocode failed: {}", kind, e);
                None
            }
        }
    }
}

impl Default for CoordinateResolver {
    fn default() -> Self {
        Self::offline()
    }
}
