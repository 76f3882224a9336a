//! # Classifier Module
//!
//! Decides whether a photo shows a fish, and which one.
//!
//! The model itself lives outside this crate. A `SpeciesClassifier` is any
//! blocking call from a decoded image to a verdict; `KeywordClassifier`
//! turns a generic image-labelling model into one.

mod keywords;

pub use keywords::{KeywordClassifier, LabelPredictor, Prediction, FISH_KEYWORDS, TOP_PREDICTIONS};

use crate::core::catalog::UNKNOWN_SPECIES;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// What the classifier saw in a photo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// The photo shows the target subject
    pub is_match: bool,
    /// Species label; empty when `is_match` is false
    pub label: String,
}

impl Classification {
    pub fn matched(label: impl Into<String>) -> Self {
        Self {
            is_match: true,
            label: label.into(),
        }
    }

    pub fn rejected() -> Self {
        Self {
            is_match: false,
            label: String::new(),
        }
    }

    /// The label to record, with the unknown-species sentinel for blanks
    pub fn species(&self) -> &str {
        if self.label.trim().is_empty() {
            UNKNOWN_SPECIES
        } else {
            &self.label
        }
    }
}

/// Classifies decoded images.
///
/// Implementations may be slow; callers run them on blocking threads.
pub trait SpeciesClassifier: Send + Sync {
    fn classify(&self, image: &DynamicImage) -> Classification;
}

/// Treats every image as a catch of unknown species
#[derive(Debug, Clone, Default)]
pub struct AcceptAllClassifier {
    label: Option<String>,
}

impl AcceptAllClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Label every image with `label`
    pub fn labelled(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
        }
    }
}

impl SpeciesClassifier for AcceptAllClassifier {
    fn classify(&self, _image: &DynamicImage) -> Classification {
        Classification::matched(self.label.as_deref().unwrap_or(UNKNOWN_SPECIES))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_label_becomes_unknown_species() {
        assert_eq!(Classification::matched("  ").species(), UNKNOWN_SPECIES);
        assert_eq!(Classification::matched("Walleye").species(), "Walleye");
    }

    #[test]
    fn accept_all_matches_everything() {
        let image = DynamicImage::new_luma8(4, 4);
        let verdict = AcceptAllClassifier::new().classify(&image);
        assert!(verdict.is_match);
        assert_eq!(verdict.label, UNKNOWN_SPECIES);

        let labelled = AcceptAllClassifier::labelled("Carp").classify(&image);
        assert_eq!(labelled.label, "Carp");
    }
}
