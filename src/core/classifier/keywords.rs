//! Species classification from generic image labels.
//!
//! Two layers over the predictor's top labels:
//! 1. Fish present if any label contains a generic aquatic keyword
//! 2. Species taken from the first label matching the species table

use super::{Classification, SpeciesClassifier};
use crate::core::catalog::UNKNOWN_SPECIES;
use image::DynamicImage;
use tracing::debug;

/// How many of the highest-confidence labels are considered
pub const TOP_PREDICTIONS: usize = 5;

/// Label fragments that indicate a fish is in frame
pub const FISH_KEYWORDS: &[&str] = &[
    "fish",
    "aquatic",
    "marine",
    "freshwater",
    "seafood",
    "swimmer",
    "scales",
    "fins",
    "gills",
    "underwater",
];

/// Species and the label fragments that identify them, checked in order
const SPECIES: &[(&str, &[&str])] = &[
    ("largemouth bass", &["largemouth bass", "black bass", "large mouth", "large-mouth"]),
    ("smallmouth bass", &["smallmouth bass", "small mouth", "small-mouth"]),
    ("striped bass", &["striped bass", "striper", "rockfish"]),
    ("crappie", &["crappie", "black crappie", "white crappie", "papermouth"]),
    ("walleye", &["walleye", "pike perch", "pike-perch"]),
    ("yellow perch", &["yellow perch", "perch", "lake perch"]),
    ("carp", &["carp", "common carp"]),
    ("rainbow trout", &["rainbow trout", "steelhead"]),
    ("brown trout", &["brown trout", "german brown"]),
    ("brook trout", &["brook trout", "speckled trout", "brookie"]),
    ("lake trout", &["lake trout", "mackinaw", "laker"]),
    (
        "salmon",
        &[
            "salmon",
            "king salmon",
            "chinook",
            "coho",
            "silver salmon",
            "sockeye",
            "red salmon",
            "pink salmon",
            "chum",
            "atlantic salmon",
        ],
    ),
];

/// One label from an image-labelling model
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: &str, confidence: f32) -> Self {
        Self {
            label: label.to_string(),
            confidence,
        }
    }
}

/// A generic image-labelling model
pub trait LabelPredictor: Send + Sync {
    /// Labels for the image, in any order
    fn predict(&self, image: &DynamicImage) -> Vec<Prediction>;
}

/// Adapts a label predictor into a species classifier
pub struct KeywordClassifier<P: LabelPredictor> {
    predictor: P,
}

impl<P: LabelPredictor> KeywordClassifier<P> {
    pub fn new(predictor: P) -> Self {
        Self { predictor }
    }

    /// Classify a set of predictions
    pub fn classify_predictions(mut predictions: Vec<Prediction>) -> Classification {
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        let top: Vec<String> = predictions
            .iter()
            .take(TOP_PREDICTIONS)
            .map(|p| p.label.to_lowercase())
            .collect();

        let is_fish = top
            .iter()
            .any(|label| FISH_KEYWORDS.iter().any(|k| label.contains(k)));
        if !is_fish {
            debug!("No fish among {:?}", top);
            return Classification::rejected();
        }

        let species = top.iter().find_map(|label| {
            SPECIES
                .iter()
                .find(|(_, keywords)| keywords.iter().any(|k| label.contains(k)))
                .map(|(species, _)| title_case(species))
        });

        match species {
            Some(species) => {
                debug!("Species identified: {}", species);
                Classification::matched(species)
            }
            None => Classification::matched(UNKNOWN_SPECIES),
        }
    }
}

impl<P: LabelPredictor> SpeciesClassifier for KeywordClassifier<P> {
    fn classify(&self, image: &DynamicImage) -> Classification {
        Self::classify_predictions(self.predictor.predict(image))
    }
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
