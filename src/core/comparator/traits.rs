//! Trait definitions for duplicate decision strategies.

use super::MatchType;
use crate::core::hasher::FINGERPRINT_BITS;

/// Default maximum Hamming distance for two photos to count as the same
pub const DEFAULT_THRESHOLD: u32 = 10;

/// Strategy trait for deciding whether a perceptual distance is a duplicate
pub trait ComparisonStrategy: Send + Sync {
    /// Determine if two photos should be considered duplicates based on distance
    fn is_duplicate(&self, distance: u32) -> bool;

    /// Classify the match type based on distance
    fn classify(&self, distance: u32) -> MatchType;

    /// Get the threshold used
    fn threshold(&self) -> u32;

    /// Human-readable description of the strategy
    fn description(&self) -> String;
}

/// Inclusive threshold on Hamming distance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdStrategy {
    /// Maximum distance still considered a duplicate
    threshold: u32,
}

impl ThresholdStrategy {
    /// Create a new threshold strategy.
    ///
    /// Thresholds above the fingerprint width are meaningless and rejected.
    pub fn new(threshold: u32) -> Option<Self> {
        (threshold as usize <= FINGERPRINT_BITS).then_some(Self { threshold })
    }

    /// Only identical perceptual content (threshold = 0)
    pub fn strict() -> Self {
        Self { threshold: 0 }
    }
}

impl Default for ThresholdStrategy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl ComparisonStrategy for ThresholdStrategy {
    fn is_duplicate(&self, distance: u32) -> bool {
        distance <= self.threshold
    }

    fn classify(&self, distance: u32) -> MatchType {
        if !self.is_duplicate(distance) {
            return MatchType::Different;
        }
        // Wide thresholds accept distances the fixed table calls different
        match MatchType::from_distance(distance) {
            MatchType::Different => MatchType::Similar,
            other => other,
        }
    }

    fn threshold(&self) -> u32 {
        self.threshold
    }

    fn description(&self) -> String {
        format!(
            "Threshold strategy: photos with distance <= {} of {} bits are the same photo",
            self.threshold, FINGERPRINT_BITS
        )
    }
}
