use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Anonymisation marker left in indication text by de-identified datasets.
static INDICATION_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)XXXX").expect("placeholder pattern is valid"));

/// One patient's inputs: image paths per view plus the clinical indication.
///
/// Immutable once built. The indication is scrubbed of `XXXX` placeholders on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientCase {
    uid: String,
    frontal_image_paths: Vec<PathBuf>,
    lateral_image_paths: Vec<PathBuf>,
    indication: String,
}

impl PatientCase {
    pub fn new(
        uid: impl Into<String>,
        frontal_image_paths: Vec<PathBuf>,
        lateral_image_paths: Vec<PathBuf>,
        indication: &str,
    ) -> Self {
        Self {
            uid: uid.into(),
            frontal_image_paths,
            lateral_image_paths,
            indication: scrub_indication(indication),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn frontal_image_paths(&self) -> &[PathBuf] {
        &self.frontal_image_paths
    }

    pub fn lateral_image_paths(&self) -> &[PathBuf] {
        &self.lateral_image_paths
    }

    /// All images, frontal first, in the order they were supplied.
    pub fn all_image_paths(&self) -> impl Iterator<Item = &Path> {
        self.frontal_image_paths
            .iter()
            .chain(self.lateral_image_paths.iter())
            .map(PathBuf::as_path)
    }

    pub fn indication(&self) -> &str {
        &self.indication
    }
}

/// Removes every case-insensitive `XXXX` marker from an indication.
pub fn scrub_indication(indication: &str) -> String {
    INDICATION_PLACEHOLDER.replace_all(indication, "").into_owned()
}

/// The two narrative sections every report carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSection {
    Findings,
    Impression,
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportSection::Findings => write!(f, "findings"),
            ReportSection::Impression => write!(f, "impression"),
        }
    }
}

/// Terminal output of the fusion pipeline for one case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusedRecord {
    pub uid: String,
    pub findings: String,
    pub impression: String,
}

/// Literature search hit attached to a finished record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Study {
    pub title: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub link: String,
}

/// A fused record after literature enrichment. This is what the service returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub record: FusedRecord,
    pub medical_studies: Vec<Study>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indication_placeholder_is_removed_case_insensitively() {
        let case = PatientCase::new(
            "p1",
            vec![],
            vec![],
            "XXXX-year-old with cough, xxxx fever",
        );
        assert_eq!(case.indication(), "-year-old with cough,  fever");
    }

    #[test]
    fn test_all_image_paths_lists_frontal_before_lateral() {
        let case = PatientCase::new(
            "p1",
            vec![PathBuf::from("f1.png"), PathBuf::from("f2.png")],
            vec![PathBuf::from("l1.png")],
            "",
        );
        let paths: Vec<&Path> = case.all_image_paths().collect();
        assert_eq!(
            paths,
            vec![Path::new("f1.png"), Path::new("f2.png"), Path::new("l1.png")]
        );
    }

    #[test]
    fn test_enriched_record_serializes_flat() {
        let record = EnrichedRecord {
            record: FusedRecord {
                uid: "p1".to_string(),
                findings: "Clear lungs".to_string(),
                impression: "Normal".to_string(),
            },
            medical_studies: vec![Study {
                title: "T".to_string(),
                authors: vec!["Ada Lovelace".to_string()],
                abstract_text: "A".to_string(),
                link: "https://pubmed.ncbi.nlm.nih.gov/1/".to_string(),
            }],
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["uid"], "p1");
        assert_eq!(value["findings"], "Clear lungs");
        assert_eq!(value["medical_studies"][0]["abstract"], "A");
    }
}
