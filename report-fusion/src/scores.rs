use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use tracing::warn;

/// Labels scored by the chest radiograph classifier, in the order it emits them.
pub const PATHOLOGY_VOCABULARY: [&str; 18] = [
    "Atelectasis",
    "Consolidation",
    "Infiltration",
    "Pneumothorax",
    "Edema",
    "Emphysema",
    "Fibrosis",
    "Effusion",
    "Pneumonia",
    "Pleural_Thickening",
    "Cardiomegaly",
    "Nodule",
    "Mass",
    "Hernia",
    "Lung Lesion",
    "Fracture",
    "Lung Opacity",
    "Enlarged Cardiomediastinum",
];

pub fn is_known_pathology(label: &str) -> bool {
    PATHOLOGY_VOCABULARY.contains(&label)
}

/// Pathology label to probability, kept in insertion order.
///
/// A score of NaN means the classifier did not compute that label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathologyScoreMap {
    entries: Vec<(String, f64)>,
}

impl PathologyScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map from raw classifier output.
    ///
    /// Entries follow [`PATHOLOGY_VOCABULARY`] order. Unknown labels are dropped; a null
    /// score becomes NaN.
    pub fn from_classifier_output(raw: HashMap<String, Option<f64>>) -> Self {
        for label in raw.keys().filter(|label| !is_known_pathology(label)) {
            warn!(label = %label, "Dropping score for unknown pathology label");
        }

        PATHOLOGY_VOCABULARY
            .iter()
            .filter_map(|label| {
                raw.get(*label)
                    .map(|score| (label.to_string(), score.unwrap_or(f64::NAN)))
            })
            .collect()
    }

    /// Drops every label outside [`PATHOLOGY_VOCABULARY`], keeping the order of the rest.
    pub fn into_known(self) -> Self {
        let (entries, unknown): (Vec<_>, Vec<_>) = self
            .entries
            .into_iter()
            .partition(|(label, _)| is_known_pathology(label));
        for (label, _) in &unknown {
            warn!(label = %label, "Dropping score for unknown pathology label");
        }
        Self { entries }
    }

    /// Inserts or replaces a score. A replaced key keeps its original position.
    pub fn insert(&mut self, pathology: impl Into<String>, score: f64) {
        let pathology = pathology.into();
        match self.entries.iter_mut().find(|(key, _)| *key == pathology) {
            Some(entry) => entry.1 = score,
            None => self.entries.push((pathology, score)),
        }
    }

    pub fn get(&self, pathology: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(key, _)| key == pathology)
            .map(|(_, score)| *score)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(key, score)| (key.as_str(), *score))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for PathologyScoreMap {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        let mut map = PathologyScoreMap::new();
        for (key, score) in iter {
            map.insert(key, score);
        }
        map
    }
}

impl Serialize for PathologyScoreMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, score) in &self.entries {
            // JSON has no NaN; "not computed" goes out as null
            if score.is_finite() {
                map.serialize_entry(key, score)?;
            } else {
                map.serialize_entry(key, &Option::<f64>::None)?;
            }
        }
        map.end()
    }
}
