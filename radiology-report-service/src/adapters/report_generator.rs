use async_trait::async_trait;
use report_fusion::{ReportGenerator, ViewKind, ViewReport, ViewStatus};
use std::path::Path;
use tracing::{error, info, warn};

use super::imaging::load_png_base64;
use super::openrouter::{OpenRouterClient, png_part, text_part};

const MAX_REPORT_TOKENS: u32 = 300;

/// Writes a per-view chest radiograph report with a vision-capable LLM.
pub struct VisionReportGenerator {
    client: OpenRouterClient,
    model: String,
}

impl VisionReportGenerator {
    pub fn new(client: OpenRouterClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    async fn generate_text(
        &self,
        image: &Path,
        indication: &str,
        view: ViewKind,
    ) -> anyhow::Result<String> {
        let base64_image = load_png_base64(image, false).await?;
        let content = vec![text_part(report_prompt(indication, view)), png_part(&base64_image)];
        let report = self
            .client
            .complete(&self.model, content, MAX_REPORT_TOKENS)
            .await?;
        Ok(report.trim().to_string())
    }
}

#[async_trait]
impl ReportGenerator for VisionReportGenerator {
    async fn generate(&self, image: &Path, indication: &str, view: ViewKind) -> ViewReport {
        if !tokio::fs::try_exists(image).await.unwrap_or(false) {
            warn!("{} image file not found: {}", view, image.display());
            return ViewReport::failed(ViewStatus::FileNotFound);
        }

        match self.generate_text(image, indication, view).await {
            Ok(report_text) => {
                info!(view = %view, chars = report_text.len(), "Generated view report");
                ViewReport::from_generated_text(&report_text)
            }
            Err(e) => {
                error!("Error processing {} image {}: {:#}", view, image.display(), e);
                ViewReport::failed(ViewStatus::Error)
            }
        }
    }
}

fn report_prompt(indication: &str, view: ViewKind) -> String {
    format!(
        "You are a radiologist reading the {} chest X-ray attached below. \
        Write a short report with exactly two sections, in this form:

        findings: <descriptive observations>
        impression: <summarized clinical conclusion>

        Return only the report.

        indication: {}",
        view.label().to_lowercase(),
        indication
    )
}
