//! # Hasher Module
//!
//! Fingerprints photos so the same picture is never stored twice.
//!
//! ## Fingerprints
//! - **Content digest** - SHA-256 of the raw bytes, catches byte-identical copies
//! - **Perceptual fingerprint** - 64-bit average hash of an 8x8 grayscale grid,
//!   catches the same photo re-exported at another size or quality
//!
//! ## How It Works
//! 1. Decode the bytes (zune-jpeg for JPEG, image crate otherwise)
//! 2. Convert to grayscale and resize to 8x8
//! 3. Set a bit for each sample brighter than the mean
//! 4. Compare fingerprints using Hamming distance
//!
//! ## Example
//! ```rust,ignore
//! use fishlog::core::hasher::{ContentHasher, PerceptualHasher};
//!
//! let digest = ContentHasher::new().fingerprint(&bytes);
//! let fingerprint = PerceptualHasher::new().fingerprint_bytes(&bytes);
//! ```

mod content;
pub mod fast_decode;
mod fast_resize;
mod perceptual;

pub use content::{ContentDigest, ContentHasher, ParseDigestError};
pub use fast_decode::FastDecoder;
pub use perceptual::{
    hamming_distance, ParseFingerprintError, PerceptualFingerprint, PerceptualHasher,
    FINGERPRINT_BITS, GRID_SIZE,
};
