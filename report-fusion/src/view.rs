use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::models::ReportSection;
use crate::pipeline::FailedViewPolicy;

static FINDINGS_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)findings\s*:\s*(.*?)\s*impression\s*:").expect("findings pattern is valid")
});

static IMPRESSION_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)impression\s*:\s*(.*)").expect("impression pattern is valid")
});

/// Radiograph projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Frontal,
    Lateral,
}

impl ViewKind {
    pub fn label(&self) -> &'static str {
        match self {
            ViewKind::Frontal => "Frontal",
            ViewKind::Lateral => "Lateral",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewStatus {
    Ok,
    FileNotFound,
    Error,
}

impl ViewStatus {
    /// Text a failed view contributes under [`FailedViewPolicy::Placeholder`].
    pub fn placeholder(&self) -> &'static str {
        match self {
            ViewStatus::Ok => "",
            ViewStatus::FileNotFound => "FILE_NOT_FOUND",
            ViewStatus::Error => "ERROR",
        }
    }

    pub fn is_failure(&self) -> bool {
        !matches!(self, ViewStatus::Ok)
    }
}

/// What the report generator produced for one view's representative image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewReport {
    pub findings: String,
    pub impression: String,
    pub status: ViewStatus,
}

impl ViewReport {
    pub fn ok(findings: impl Into<String>, impression: impl Into<String>) -> Self {
        Self {
            findings: findings.into(),
            impression: impression.into(),
            status: ViewStatus::Ok,
        }
    }

    pub fn failed(status: ViewStatus) -> Self {
        Self {
            findings: String::new(),
            impression: String::new(),
            status,
        }
    }

    /// Splits generated report text into its findings and impression sections.
    ///
    /// Labels are matched case-insensitively. Findings are only recognised when an
    /// impression label follows them; a missing section comes back empty.
    ///
    /// Section bodies may span several lines: model output often wraps findings over
    /// multiple lines, so `.` matches newlines here.
    pub fn from_generated_text(report: &str) -> Self {
        let capture = |pattern: &Regex| {
            pattern
                .captures(report)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default()
        };

        Self::ok(capture(&FINDINGS_SECTION), capture(&IMPRESSION_SECTION))
    }

    pub fn section(&self, section: ReportSection) -> &str {
        match section {
            ReportSection::Findings => &self.findings,
            ReportSection::Impression => &self.impression,
        }
    }
}

/// Per-view result. `Absent` means no report was attempted for the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewOutcome {
    Absent,
    Attempted(ViewReport),
}

impl ViewOutcome {
    /// The text this view adds to a combined section, if any.
    pub fn contribution(&self, section: ReportSection, policy: FailedViewPolicy) -> Option<&str> {
        let report = match self {
            ViewOutcome::Absent => return None,
            ViewOutcome::Attempted(report) => report,
        };

        let text = if report.status.is_failure() {
            match policy {
                FailedViewPolicy::Placeholder => report.status.placeholder(),
                FailedViewPolicy::Drop => return None,
            }
        } else {
            report.section(section)
        };

        (!text.is_empty()).then_some(text)
    }
}

/// Picks the largest existing file among a view's candidates.
///
/// File size stands in for image quality. Ties keep the earliest candidate. Paths that
/// do not exist or cannot be stat'ed are skipped.
pub fn select_largest_image(candidates: &[PathBuf]) -> Option<&Path> {
    let mut largest: Option<(&Path, u64)> = None;

    for path in candidates {
        let Ok(metadata) = std::fs::metadata(path) else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let size = metadata.len();
        if largest.is_none_or(|(_, best)| size > best) {
            largest = Some((path.as_path(), size));
        }
    }

    largest.map(|(path, _)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    #[test]
    fn test_selects_only_existing_candidate() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("a.jpg");
        let present = write_file(&dir, "b.jpg", 500);

        let candidates = vec![missing, present.clone()];
        assert_eq!(select_largest_image(&candidates), Some(present.as_path()));
    }

    #[test]
    fn test_selects_largest_and_keeps_first_on_tie() {
        let dir = TempDir::new().unwrap();
        let small = write_file(&dir, "small.png", 10);
        let first = write_file(&dir, "first.png", 300);
        let second = write_file(&dir, "second.png", 300);

        let candidates = vec![small, first.clone(), second];
        assert_eq!(select_largest_image(&candidates), Some(first.as_path()));
    }

    #[test]
    fn test_no_selection_for_empty_or_missing() {
        let dir = TempDir::new().unwrap();
        assert_eq!(select_largest_image(&[]), None);

        let candidates = vec![dir.path().join("x.png"), dir.path().join("y.png")];
        assert_eq!(select_largest_image(&candidates), None);
    }

    #[test]
    fn test_directories_are_not_images() {
        let dir = TempDir::new().unwrap();
        let candidates = vec![dir.path().to_path_buf()];
        assert_eq!(select_largest_image(&candidates), None);
    }

    #[test]
    fn test_parses_both_sections() {
        let report = ViewReport::from_generated_text(
            "indication: cough FINDINGS: The lungs are clear.\nHeart size normal. Impression: No acute disease.",
        );

        assert_eq!(report.findings, "The lungs are clear.\nHeart size normal.");
        assert_eq!(report.impression, "No acute disease.");
        assert_eq!(report.status, ViewStatus::Ok);
    }

    #[test]
    fn test_missing_labels_give_empty_sections() {
        let only_impression = ViewReport::from_generated_text("impression: stable");
        assert_eq!(only_impression.findings, "");
        assert_eq!(only_impression.impression, "stable");

        let only_findings = ViewReport::from_generated_text("findings: small effusion");
        assert_eq!(only_findings.findings, "");
        assert_eq!(only_findings.impression, "");
    }

    #[test]
    fn test_contribution_per_policy() {
        let ok = ViewOutcome::Attempted(ViewReport::ok("Mild opacity", ""));
        let failed = ViewOutcome::Attempted(ViewReport::failed(ViewStatus::Error));

        assert_eq!(
            ok.contribution(ReportSection::Findings, FailedViewPolicy::Drop),
            Some("Mild opacity")
        );
        assert_eq!(ok.contribution(ReportSection::Impression, FailedViewPolicy::Drop), None);
        assert_eq!(
            failed.contribution(ReportSection::Impression, FailedViewPolicy::Placeholder),
            Some("ERROR")
        );
        assert_eq!(failed.contribution(ReportSection::Findings, FailedViewPolicy::Drop), None);
        assert_eq!(
            ViewOutcome::Absent.contribution(ReportSection::Findings, FailedViewPolicy::Placeholder),
            None
        );
    }
}
