use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use report_fusion::{Classifier, PathologyScoreMap};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

use super::imaging::load_png_base64;

/// Pathology classifier served over HTTP.
///
/// The endpoint takes `{"image": <base64 grayscale PNG>}` and answers with a JSON object
/// of label to score, where `null` marks a label the model does not compute.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn try_analyze(&self, image: &Path) -> anyhow::Result<PathologyScoreMap> {
        let base64_image = load_png_base64(image, true).await?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "image": base64_image }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Classifier request failed: {}", response.status()));
        }

        let raw: HashMap<String, Option<f64>> = response.json().await?;
        Ok(PathologyScoreMap::from_classifier_output(raw))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn analyze(&self, image: &Path) -> PathologyScoreMap {
        match self.try_analyze(image).await {
            Ok(scores) => {
                debug!(image = %image.display(), labels = scores.len(), "Classified image");
                scores
            }
            Err(e) => {
                warn!("Classification failed for {}: {:#}", image.display(), e);
                PathologyScoreMap::new()
            }
        }
    }
}
