//! Per-scan duplicate index.

use crate::core::comparator::nearest;
use crate::core::hasher::{ContentDigest, PerceptualFingerprint};
use std::collections::HashSet;
use uuid::Uuid;

/// Fingerprints of everything a single scan has accepted so far.
///
/// Created fresh for each scan and dropped with it; never shared.
#[derive(Debug, Default)]
pub struct ScanIndex {
    exact: HashSet<ContentDigest>,
    perceptual: Vec<(PerceptualFingerprint, Uuid)>,
}

impl ScanIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_exact(&self, digest: &ContentDigest) -> bool {
        self.exact.contains(digest)
    }

    /// Closest accepted photo to `fingerprint` and its distance
    pub fn nearest(&self, fingerprint: &PerceptualFingerprint) -> Option<(Uuid, u32)> {
        nearest(fingerprint, &self.perceptual, |(fp, _)| Some(fp))
            .map(|((_, id), distance)| (*id, distance))
    }

    /// Record an accepted photo
    pub fn insert(
        &mut self,
        digest: ContentDigest,
        fingerprint: Option<PerceptualFingerprint>,
        id: Uuid,
    ) {
        self.exact.insert(digest);
        if let Some(fingerprint) = fingerprint {
            self.perceptual.push((fingerprint, id));
        }
    }

    /// Number of accepted photos
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::hasher::ContentHasher;

    fn fp(ones: usize) -> PerceptualFingerprint {
        PerceptualFingerprint::from_bits((0..64).map(|i| i < ones))
    }

    #[test]
    fn empty_index_matches_nothing() {
        let index = ScanIndex::new();
        assert!(index.nearest(&fp(3)).is_none());
        assert!(!index.contains_exact(&ContentHasher::new().fingerprint(b"a")));
    }

    #[test]
    fn remembers_accepted_photos() {
        let mut index = ScanIndex::new();
        let digest = ContentHasher::new().fingerprint(b"a");
        let id = Uuid::new_v4();
        index.insert(digest, Some(fp(0)), id);

        assert!(index.contains_exact(&digest));
        assert_eq!(index.nearest(&fp(5)), Some((id, 5)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn photos_without_fingerprint_only_join_exact_set() {
        let mut index = ScanIndex::new();
        index.insert(ContentHasher::new().fingerprint(b"raw"), None, Uuid::new_v4());

        assert_eq!(index.len(), 1);
        assert!(index.nearest(&fp(0)).is_none());
    }
}
