//! The persisted photo record.

use crate::core::hasher::{ContentDigest, PerceptualFingerprint};
use crate::core::metadata::Coordinates;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Location text used when nothing better is known
pub const UNKNOWN_LOCATION: &str = "Unknown Location";

/// Species label used when the species was not identified
pub const UNKNOWN_SPECIES: &str = "Unknown Fish Species";

/// One photo in the catalog.
///
/// The id and both fingerprints never change after creation; only the
/// descriptive fields may be edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoRecord {
    pub id: Uuid,
    /// Blob store key holding the original bytes
    pub blob_ref: String,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub exact_hash: ContentDigest,
    /// Empty in the document when the image could not be fingerprinted
    #[serde(with = "optional_fingerprint", default)]
    pub perceptual_hash: Option<PerceptualFingerprint>,
    pub species: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl PhotoRecord {
    /// Position of the catch, if both halves are known
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }

    /// Set or clear both halves together
    pub fn set_coordinates(&mut self, coordinates: Option<Coordinates>) {
        self.latitude = coordinates.map(|c| c.latitude);
        self.longitude = coordinates.map(|c| c.longitude);
    }

    pub fn has_known_location(&self) -> bool {
        !self.location.is_empty() && self.location != UNKNOWN_LOCATION
    }
}

mod optional_fingerprint {
    use crate::core::hasher::PerceptualFingerprint;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<PerceptualFingerprint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(fingerprint) => serializer.serialize_str(&fingerprint.to_bit_string()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<PerceptualFingerprint>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        if text.is_empty() {
            return Ok(None);
        }
        text.parse().map(Some).map_err(serde::de::Error::custom)
    }
}
