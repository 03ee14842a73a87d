use futures::{FutureExt, StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use crate::aggregate::aggregate_scores;
use crate::budget::SummaryBudget;
use crate::collaborators::Collaborators;
use crate::error::{FusionError, Result};
use crate::findings::{DEFAULT_THRESHOLD, JoinStyle, textualize_findings};
use crate::models::{FusedRecord, PatientCase, ReportSection};
use crate::scores::PathologyScoreMap;
use crate::view::{ViewKind, ViewOutcome, ViewReport, select_largest_image};

/// What a view whose report generation failed contributes to the narrative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailedViewPolicy {
    /// The status text (`FILE_NOT_FOUND`, `ERROR`) goes in verbatim, as in existing reports.
    #[default]
    Placeholder,
    /// Failed views are left out, same as views with no images.
    Drop,
}

impl FromStr for FailedViewPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "placeholder" => Ok(FailedViewPolicy::Placeholder),
            "drop" => Ok(FailedViewPolicy::Drop),
            other => Err(format!("unknown failed view policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionConfig {
    pub pathology_threshold: f64,
    pub join_style: JoinStyle,
    pub failed_view_policy: FailedViewPolicy,
    /// Classification calls in flight per case.
    pub classify_concurrency: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            pathology_threshold: DEFAULT_THRESHOLD,
            join_style: JoinStyle::Legacy,
            failed_view_policy: FailedViewPolicy::Placeholder,
            classify_concurrency: 1,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pathology_threshold) {
            return Err(FusionError::InvalidConfig(format!(
                "pathology threshold {} is outside [0, 1]",
                self.pathology_threshold
            )));
        }
        if self.classify_concurrency == 0 {
            return Err(FusionError::InvalidConfig(
                "classify concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Turns one patient case into a fused findings/impression record.
#[derive(Clone)]
pub struct ReportFusionPipeline {
    collaborators: Collaborators,
    config: FusionConfig,
}

impl ReportFusionPipeline {
    pub fn new(collaborators: Collaborators, config: FusionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            collaborators,
            config,
        })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Runs the full fusion for one case.
    ///
    /// Classification and view failures are absorbed. A summarizer failure fails the case.
    pub async fn fuse(&self, case: &PatientCase) -> Result<FusedRecord> {
        info!(
            uid = %case.uid(),
            frontal_images = case.frontal_image_paths().len(),
            lateral_images = case.lateral_image_paths().len(),
            "Starting report fusion"
        );

        let pathology_text = self.pathology_text(case).await;
        debug!(uid = %case.uid(), pathology_text = %pathology_text, "Pathology text ready");

        let frontal = self
            .view_outcome(case, ViewKind::Frontal, case.frontal_image_paths())
            .await;
        let lateral = self
            .view_outcome(case, ViewKind::Lateral, case.lateral_image_paths())
            .await;
        let views = [&frontal, &lateral];

        let findings_text = combine_section(
            &views,
            ReportSection::Findings,
            &pathology_text,
            self.config.failed_view_policy,
        );
        let impression_text = combine_section(
            &views,
            ReportSection::Impression,
            &pathology_text,
            self.config.failed_view_policy,
        );
        debug!(uid = %case.uid(), findings_combined = %findings_text, "Combined findings");
        debug!(uid = %case.uid(), impression_combined = %impression_text, "Combined impression");

        let findings = self
            .summarize_section(case, ReportSection::Findings, &findings_text)
            .await?;
        let impression = self
            .summarize_section(case, ReportSection::Impression, &impression_text)
            .await?;

        info!(uid = %case.uid(), "Report fusion completed");

        Ok(FusedRecord {
            uid: case.uid().to_string(),
            findings,
            impression,
        })
    }

    /// Fuses each case on its own; one failure leaves the rest untouched.
    pub async fn fuse_batch(&self, cases: &[PatientCase]) -> Vec<Result<FusedRecord>> {
        let mut results = Vec::with_capacity(cases.len());
        for case in cases {
            let result = self.fuse(case).await;
            if let Err(e) = &result {
                error!(uid = %case.uid(), "Report fusion failed: {}", e);
            }
            results.push(result);
        }
        results
    }

    async fn pathology_text(&self, case: &PatientCase) -> String {
        // buffered() yields in input order, so the reduction below is deterministic
        let classifications: Vec<_> = case
            .all_image_paths()
            .map(|image| self.classify_one(case, image).boxed())
            .collect();
        let maps: Vec<PathologyScoreMap> = stream::iter(classifications)
            .buffered(self.config.classify_concurrency)
            .collect()
            .await;

        let aggregated = aggregate_scores(&maps);
        textualize_findings(
            &aggregated,
            self.config.pathology_threshold,
            self.config.join_style,
        )
    }

    async fn classify_one(&self, case: &PatientCase, image: &Path) -> PathologyScoreMap {
        let scores = self.collaborators.classifier.analyze(image).await;
        if scores.is_empty() {
            warn!(uid = %case.uid(), image = %image.display(), "Classifier returned no scores");
        }
        scores.into_known()
    }

    async fn view_outcome(
        &self,
        case: &PatientCase,
        view: ViewKind,
        candidates: &[PathBuf],
    ) -> ViewOutcome {
        if candidates.is_empty() {
            return ViewOutcome::Absent;
        }

        let selected = select_largest_image(candidates);
        let still_exists = match selected {
            Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            None => false,
        };
        let Some(selected) = selected.filter(|_| still_exists) else {
            warn!(
                uid = %case.uid(),
                view = %view,
                candidates = ?candidates,
                "No valid image found for view"
            );
            return ViewOutcome::Absent;
        };

        info!(uid = %case.uid(), view = %view, image = %selected.display(), "Generating view report");

        let report: ViewReport = self
            .collaborators
            .report_generator
            .generate(selected, case.indication(), view)
            .await;

        if report.status.is_failure() {
            warn!(
                uid = %case.uid(),
                view = %view,
                status = ?report.status,
                "View report generation failed"
            );
        }

        ViewOutcome::Attempted(report)
    }

    async fn summarize_section(
        &self,
        case: &PatientCase,
        section: ReportSection,
        text: &str,
    ) -> Result<String> {
        let budget = SummaryBudget::for_text(text);
        debug!(
            uid = %case.uid(),
            section = %section,
            min_length = budget.min_length,
            max_length = budget.max_length,
            "Summarizing section"
        );

        self.collaborators
            .summarizer
            .summarize(text, budget)
            .await
            .map_err(|e| FusionError::Summarization {
                uid: case.uid().to_string(),
                section,
                message: format!("{:#}", e),
            })
    }
}

/// Joins the per-view text and the pathology phrase for one section.
///
/// Frontal first, then lateral, then `Pathologies Found are ...`. Every non-empty piece
/// ends with `". \n"`.
pub fn combine_section(
    views: &[&ViewOutcome],
    section: ReportSection,
    pathology_text: &str,
    policy: FailedViewPolicy,
) -> String {
    let mut combined = String::new();

    for text in views
        .iter()
        .filter_map(|view| view.contribution(section, policy))
    {
        combined.push_str(text);
        combined.push_str(". \n");
    }

    if !pathology_text.is_empty() {
        combined.push_str(&format!("Pathologies Found are {}. \n", pathology_text));
    }

    combined
}
