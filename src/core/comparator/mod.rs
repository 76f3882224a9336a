//! # Comparator Module
//!
//! Decides whether an incoming photo is already in a set of records.
//!
//! ## How It Works
//! 1. Compute the SHA-256 content digest and look for a byte-identical record
//! 2. If none, compute the perceptual fingerprint of the decoded image
//! 3. Find the record with the smallest Hamming distance
//! 4. Apply the comparison strategy to that minimum distance
//!
//! An image without a perceptual fingerprint is only protected by the exact pass.
//!
//! ## Comparison Thresholds
//! | Distance | Classification |
//! |----------|---------------|
//! | 0        | Exact match   |
//! | 1-4      | Near-exact    |
//! | 5-10     | Similar       |
//! | 11+      | Different     |

mod traits;

pub use traits::{ComparisonStrategy, ThresholdStrategy, DEFAULT_THRESHOLD};

use crate::core::catalog::PhotoRecord;
use crate::core::hasher::{
    ContentDigest, ContentHasher, FastDecoder, PerceptualFingerprint, PerceptualHasher,
};
use image::DynamicImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Classification of match types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    /// Byte-identical, or distance 0
    Exact,
    /// Distance 1-4, virtually identical
    NearExact,
    /// Distance 5-10, the same photo re-exported
    Similar,
    /// Beyond the threshold
    Different,
}

impl MatchType {
    /// Classify based on Hamming distance
    pub fn from_distance(distance: u32) -> Self {
        match distance {
            0 => MatchType::Exact,
            1..=4 => MatchType::NearExact,
            5..=10 => MatchType::Similar,
            _ => MatchType::Different,
        }
    }

    /// Check if this match type is considered a duplicate
    pub fn is_duplicate(&self) -> bool {
        !matches!(self, MatchType::Different)
    }
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchType::Exact => write!(f, "Exact Match"),
            MatchType::NearExact => write!(f, "Near-Exact Match"),
            MatchType::Similar => write!(f, "Similar"),
            MatchType::Different => write!(f, "Different"),
        }
    }
}

/// Outcome of checking one photo against existing records.
///
/// Both fingerprints are always present (the perceptual one when the image
/// decoded), so an accepted photo can be recorded without hashing again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    /// The record this photo duplicates
    pub matched: Option<PhotoRecord>,
    pub exact: ContentDigest,
    pub perceptual: Option<PerceptualFingerprint>,
    /// Hamming distance to the matched record; 0 for byte-identical content
    pub distance: Option<u32>,
    pub match_type: MatchType,
}

impl DuplicateVerdict {
    fn unique(exact: ContentDigest, perceptual: Option<PerceptualFingerprint>) -> Self {
        Self {
            is_duplicate: false,
            matched: None,
            exact,
            perceptual,
            distance: None,
            match_type: MatchType::Different,
        }
    }
}

/// Find the candidate with the smallest distance to `incoming`.
///
/// Candidates without a fingerprint, or whose fingerprint has a different
/// length, are not comparable and are ignored. Ties go to the earliest
/// candidate.
pub fn nearest<'a, T, F>(
    incoming: &PerceptualFingerprint,
    candidates: &'a [T],
    fingerprint_of: F,
) -> Option<(&'a T, u32)>
where
    T: Sync,
    F: Fn(&T) -> Option<&PerceptualFingerprint> + Sync,
{
    candidates
        .par_iter()
        .enumerate()
        .filter_map(|(index, candidate)| {
            let distance = incoming.hamming_distance(fingerprint_of(candidate)?)?;
            Some((distance, index, candidate))
        })
        .min_by_key(|(distance, index, _)| (*distance, *index))
        .map(|(distance, _, candidate)| (candidate, distance))
}

/// Classifies incoming photos as new or already present
#[derive(Clone, Default)]
pub struct Deduplicator<S: ComparisonStrategy = ThresholdStrategy> {
    content: ContentHasher,
    perceptual: PerceptualHasher,
    strategy: S,
}

impl Deduplicator<ThresholdStrategy> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: ComparisonStrategy> Deduplicator<S> {
    /// Create a deduplicator with a custom strategy
    pub fn with_strategy(strategy: S) -> Self {
        Self {
            content: ContentHasher::new(),
            perceptual: PerceptualHasher::new(),
            strategy,
        }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Check raw bytes against existing records, decoding them as needed
    pub fn check(&self, bytes: &[u8], existing: &[PhotoRecord]) -> DuplicateVerdict {
        let exact = self.content.fingerprint(bytes);
        if let Some(verdict) = self.exact_pass(&exact, existing) {
            return verdict;
        }

        let perceptual = match FastDecoder::decode(bytes) {
            Ok(image) => self.perceptual.fingerprint(&image),
            Err(e) => {
                debug!("Similarity check skipped: {}", e);
                None
            }
        };
        self.similarity_pass(exact, perceptual, existing)
    }

    /// Check bytes whose decoded image the caller already holds.
    ///
    /// `image` is `None` when the bytes did not decode.
    pub fn check_decoded(
        &self,
        bytes: &[u8],
        image: Option<&DynamicImage>,
        existing: &[PhotoRecord],
    ) -> DuplicateVerdict {
        let exact = self.content.fingerprint(bytes);
        if let Some(verdict) = self.exact_pass(&exact, existing) {
            return verdict;
        }

        let perceptual = image.and_then(|image| self.perceptual.fingerprint(image));
        self.similarity_pass(exact, perceptual, existing)
    }

    fn exact_pass(&self, exact: &ContentDigest, existing: &[PhotoRecord]) -> Option<DuplicateVerdict> {
        let record = existing.iter().find(|r| r.exact_hash == *exact)?;
        debug!("Byte-identical to {}", record.id);

        Some(DuplicateVerdict {
            is_duplicate: true,
            matched: Some(record.clone()),
            exact: *exact,
            perceptual: record.perceptual_hash.clone(),
            distance: Some(0),
            match_type: MatchType::Exact,
        })
    }

    fn similarity_pass(
        &self,
        exact: ContentDigest,
        perceptual: Option<PerceptualFingerprint>,
        existing: &[PhotoRecord],
    ) -> DuplicateVerdict {
        let Some(incoming) = perceptual else {
            return DuplicateVerdict::unique(exact, None);
        };

        match nearest(&incoming, existing, |r| r.perceptual_hash.as_ref()) {
            Some((record, distance)) if self.strategy.is_duplicate(distance) => {
                debug!("Within {} bits of {}", distance, record.id);
                DuplicateVerdict {
                    is_duplicate: true,
                    matched: Some(record.clone()),
                    exact,
                    perceptual: Some(incoming),
                    distance: Some(distance),
                    match_type: self.strategy.classify(distance),
                }
            }
            _ => DuplicateVerdict::unique(exact, Some(incoming)),
        }
    }
}
