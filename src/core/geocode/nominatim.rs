//! OpenStreetMap Nominatim client.
//!
//! Nominatim's usage policy allows at most one request per second and
//! requires an identifying User-Agent; both are enforced here.

use super::Geocoder;
use crate::core::metadata::Coordinates;
use crate::error::GeocodeError;
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Public Nominatim endpoint
pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct ReverseHit {
    #[serde(default)]
    address: Option<NominatimAddress>,
    #[serde(default)]
    error: Option<String>,
}

/// The address parts of a reverse lookup that make up a place description
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NominatimAddress {
    pub city: Option<String>,
    pub town: Option<String>,
    pub village: Option<String>,
    pub hamlet: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Format an address as "locality, state, country", skipping missing parts
pub fn format_place(address: &NominatimAddress) -> Option<String> {
    let locality = address
        .city
        .as_ref()
        .or(address.town.as_ref())
        .or(address.village.as_ref())
        .or(address.hamlet.as_ref());

    let parts: Vec<&str> = [locality, address.state.as_ref(), address.country.as_ref()]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Nominatim geocoder with client-side rate limiting
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    /// 1 request per second
    rate_limiter: DefaultDirectRateLimiter,
}

impl NominatimGeocoder {
    /// Create a client for the public endpoint
    pub fn new(user_agent: &str) -> Result<Self, GeocodeError> {
        Self::with_base_url(user_agent, NOMINATIM_URL)
    }

    /// Create a client for a self-hosted endpoint
    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self, GeocodeError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GeocodeError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(NonZeroU32::MIN)),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GeocodeError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, path);
        debug!("Querying Nominatim: {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| GeocodeError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::BadResponse(format!(
                "Nominatim returned status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| GeocodeError::BadResponse(e.to_string()))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn forward(&self, query: &str) -> Result<Option<Coordinates>, GeocodeError> {
        let hits: Vec<SearchHit> = self
            .get_json(
                "search",
                &[
                    ("q", query.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|_| GeocodeError::BadResponse(format!("bad coordinate {:?}", s)))
        };
        Ok(Coordinates::new(parse(&hit.lat)?, parse(&hit.lon)?))
    }

    async fn reverse(&self, coordinates: Coordinates) -> Result<Option<String>, GeocodeError> {
        let hit: ReverseHit = self
            .get_json(
                "reverse",
                &[
                    ("lat", coordinates.latitude.to_string()),
                    ("lon", coordinates.longitude.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("zoom", "10".to_string()),
                ],
            )
            .await?;

        if let Some(error) = hit.error {
            debug!("Nominatim has no place at {}: {}", coordinates, error);
            return Ok(None);
        }
        Ok(hit.address.as_ref().and_then(format_place))
    }
}
