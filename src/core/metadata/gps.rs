//! GPS coordinate decoding.
//!
//! Two encodings are accepted for each axis:
//! - a single decimal-degree magnitude
//! - a `[degrees, minutes, seconds]` triple
//!
//! Either one is signed by its hemisphere reference (`N`/`S`, `E`/`W`).

use exif::{Exif, In, Tag, Value};
use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
///
/// Both halves are always present together.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create a pair, rejecting non-finite or out-of-range values
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// Combine optional halves; a lone half yields nothing
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Self::new(lat, lon),
            _ => None,
        }
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// Which axis a reference letter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

/// A raw GPS magnitude as stored in the metadata
#[derive(Debug, Clone, PartialEq)]
pub enum GpsValue {
    /// Decimal degrees
    Decimal(f64),
    /// Degrees/minutes/seconds components; well-formed only with exactly three
    Dms(Vec<f64>),
}

impl GpsValue {
    /// Unsigned magnitude in decimal degrees
    pub fn magnitude(&self) -> Option<f64> {
        let value = match self {
            GpsValue::Decimal(degrees) => *degrees,
            GpsValue::Dms(parts) => match parts.as_slice() {
                [d, m, s] => dms_to_decimal(*d, *m, *s),
                _ => return None,
            },
        };
        value.is_finite().then_some(value.abs())
    }
}

/// Convert a degrees/minutes/seconds triple to decimal degrees
pub fn dms_to_decimal(degrees: f64, minutes: f64, seconds: f64) -> f64 {
    degrees + minutes / 60.0 + seconds / 3600.0
}

/// Sign a magnitude by its hemisphere reference.
///
/// `S` and `W` negate; `N` and `E` keep the sign; anything else (including a
/// letter for the wrong axis) is malformed.
pub fn apply_hemisphere(magnitude: f64, reference: &str, axis: Axis) -> Option<f64> {
    match (axis, reference.trim().to_ascii_uppercase().as_str()) {
        (Axis::Latitude, "N") | (Axis::Longitude, "E") => Some(magnitude),
        (Axis::Latitude, "S") | (Axis::Longitude, "W") => Some(-magnitude),
        _ => None,
    }
}

/// The four GPS fields needed to locate a photo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpsFields {
    pub latitude: Option<GpsValue>,
    pub latitude_ref: Option<String>,
    pub longitude: Option<GpsValue>,
    pub longitude_ref: Option<String>,
}

impl GpsFields {
    /// Read the GPS block of a parsed EXIF container
    pub fn from_exif(exif: &Exif) -> Self {
        Self {
            latitude: gps_value(exif, Tag::GPSLatitude),
            latitude_ref: super::ascii_field(exif, Tag::GPSLatitudeRef, In::PRIMARY),
            longitude: gps_value(exif, Tag::GPSLongitude),
            longitude_ref: super::ascii_field(exif, Tag::GPSLongitudeRef, In::PRIMARY),
        }
    }

    /// Resolve both axes, or neither
    pub fn resolve(&self) -> Option<Coordinates> {
        let latitude = resolve_axis(&self.latitude, &self.latitude_ref, Axis::Latitude)?;
        let longitude = resolve_axis(&self.longitude, &self.longitude_ref, Axis::Longitude)?;
        Coordinates::new(latitude, longitude)
    }
}

fn resolve_axis(value: &Option<GpsValue>, reference: &Option<String>, axis: Axis) -> Option<f64> {
    let magnitude = value.as_ref()?.magnitude()?;
    apply_hemisphere(magnitude, reference.as_deref()?, axis)
}

fn gps_value(exif: &Exif, tag: Tag) -> Option<GpsValue> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let numbers: Vec<f64> = match field.value {
        Value::Rational(ref vec) => vec.iter().map(|r| r.to_f64()).collect(),
        Value::SRational(ref vec) => vec.iter().map(|r| r.to_f64()).collect(),
        Value::Double(ref vec) => vec.clone(),
        Value::Float(ref vec) => vec.iter().map(|v| *v as f64).collect(),
        _ => return None,
    };

    match numbers.as_slice() {
        [] => None,
        [degrees] => Some(GpsValue::Decimal(*degrees)),
        _ => Some(GpsValue::Dms(numbers)),
    }
}
