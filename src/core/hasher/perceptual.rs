//! Average-threshold perceptual fingerprints.
//!
//! The fingerprint is built by:
//! 1. Downsampling the image to an 8x8 grayscale grid
//! 2. Computing the mean luminance of the 64 samples
//! 3. Emitting one bit per sample in row-major order: 1 if the sample is
//!    brighter than the mean, 0 otherwise
//!
//! Two exports of the same photo at different sizes or JPEG qualities land
//! within a few bits of each other.

use super::fast_decode::FastDecoder;
use super::fast_resize::grayscale_grid;
use crate::error::DecodeError;
use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Width and height of the sampling grid
pub const GRID_SIZE: u32 = 8;

/// Number of bits in a fingerprint produced by [`PerceptualHasher`]
pub const FINGERPRINT_BITS: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// A perceptual fingerprint: a string of bits.
///
/// Serialized as a string of `0`/`1` characters. Fingerprints produced by
/// this crate are always 64 bits; other lengths can only come from a
/// hand-edited or foreign catalog and never compare equal in length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PerceptualFingerprint {
    bytes: Vec<u8>,
    len: usize,
}

/// A fingerprint string containing something other than `0` and `1`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid perceptual fingerprint {0:?}: expected only '0' and '1'")]
pub struct ParseFingerprintError(String);

impl PerceptualFingerprint {
    /// Build a fingerprint from bits in order
    pub fn from_bits<I: IntoIterator<Item = bool>>(bits: I) -> Self {
        let mut bytes = Vec::new();
        let mut len = 0;

        for bit in bits {
            if len % 8 == 0 {
                bytes.push(0);
            }
            if bit {
                if let Some(last) = bytes.last_mut() {
                    *last |= 1 << (7 - (len % 8));
                }
            }
            len += 1;
        }

        Self { bytes, len }
    }

    /// Number of bits
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bit at `index`, or `None` past the end
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        Some(self.bytes[index / 8] & (1 << (7 - (index % 8))) != 0)
    }

    /// Iterate over the bits in order
    pub fn bits(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).filter_map(move |i| self.bit(i))
    }

    /// Number of differing bit positions.
    ///
    /// Returns `None` when the fingerprints differ in length.
    pub fn hamming_distance(&self, other: &Self) -> Option<u32> {
        if self.len != other.len {
            return None;
        }

        // Padding bits in the last byte are always zero on both sides
        Some(
            self.bytes
                .iter()
                .zip(other.bytes.iter())
                .map(|(a, b)| (a ^ b).count_ones())
                .sum(),
        )
    }

    /// Similarity as a percentage (0-100), `None` on length mismatch
    pub fn similarity(&self, other: &Self) -> Option<f64> {
        let distance = self.hamming_distance(other)?;
        if self.len == 0 {
            return Some(100.0);
        }
        Some((1.0 - distance as f64 / self.len as f64) * 100.0)
    }

    /// Get the fingerprint as a `0`/`1` string
    pub fn to_bit_string(&self) -> String {
        self.bits().map(|b| if b { '1' } else { '0' }).collect()
    }

    /// Get the packed bits as a hexadecimal string
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Free-function form of [`PerceptualFingerprint::hamming_distance`]
pub fn hamming_distance(a: &PerceptualFingerprint, b: &PerceptualFingerprint) -> Option<u32> {
    a.hamming_distance(b)
}

impl fmt::Display for PerceptualFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bit_string())
    }
}

impl FromStr for PerceptualFingerprint {
    type Err = ParseFingerprintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(ParseFingerprintError(s.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_bits(bits))
    }
}

impl TryFrom<String> for PerceptualFingerprint {
    type Error = ParseFingerprintError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PerceptualFingerprint> for String {
    fn from(fingerprint: PerceptualFingerprint) -> Self {
        fingerprint.to_bit_string()
    }
}

/// Computes perceptual fingerprints from decoded images
#[derive(Debug, Clone, Copy, Default)]
pub struct PerceptualHasher;

impl PerceptualHasher {
    pub fn new() -> Self {
        Self
    }

    /// Fingerprint a decoded image.
    ///
    /// Returns `None` if the image cannot be resampled; such an image can
    /// only be deduplicated by its exact digest.
    pub fn fingerprint(&self, image: &DynamicImage) -> Option<PerceptualFingerprint> {
        match self.try_fingerprint(image) {
            Ok(fingerprint) => Some(fingerprint),
            Err(e) => {
                debug!("No perceptual fingerprint: {}", e);
                None
            }
        }
    }

    /// Decode raw bytes and fingerprint the result
    pub fn fingerprint_bytes(&self, bytes: &[u8]) -> Option<PerceptualFingerprint> {
        match FastDecoder::decode(bytes) {
            Ok(image) => self.fingerprint(&image),
            Err(e) => {
                debug!("No perceptual fingerprint: {}", e);
                None
            }
        }
    }

    /// Fingerprint a decoded image, reporting why it failed
    pub fn try_fingerprint(&self, image: &DynamicImage) -> Result<PerceptualFingerprint, DecodeError> {
        let grid = if image.width() == GRID_SIZE && image.height() == GRID_SIZE {
            image.to_luma8()
        } else {
            grayscale_grid(image, GRID_SIZE)?
        };

        Ok(fingerprint_grid(&grid))
    }
}

/// Threshold each sample of a grayscale grid against the grid's mean
fn fingerprint_grid(grid: &GrayImage) -> PerceptualFingerprint {
    let samples: Vec<u32> = grid.pixels().map(|p| p[0] as u32).collect();
    let total: u32 = samples.iter().sum();
    let mean = total as f64 / samples.len().max(1) as f64;

    PerceptualFingerprint::from_bits(samples.iter().map(|&s| s as f64 > mean))
}
