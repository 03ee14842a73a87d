//! Model-backed services the pipeline depends on.
//!
//! The pipeline never constructs these; the host builds them once and hands them in.
//! Each may sit on a constrained resource (a single accelerator, a rate-limited API),
//! so [`Throttled`] is provided to cap how many calls are in flight at once.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::budget::SummaryBudget;
use crate::models::Study;
use crate::scores::PathologyScoreMap;
use crate::view::{ViewKind, ViewReport};

/// Multi-label pathology classifier.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Scores one image. Unreadable or malformed images yield an empty map, never an error.
    async fn analyze(&self, image: &Path) -> PathologyScoreMap;
}

/// Vision-language report generator.
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Writes findings and impression for one image.
    ///
    /// A missing file yields [`ViewStatus::FileNotFound`](crate::ViewStatus::FileNotFound),
    /// any other failure [`ViewStatus::Error`](crate::ViewStatus::Error).
    async fn generate(&self, image: &Path, indication: &str, view: ViewKind) -> ViewReport;
}

/// Abstractive summarizer.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Empty input yields an empty summary. The bounds are advisory to the model.
    async fn summarize(&self, text: &str, budget: SummaryBudget) -> anyhow::Result<String>;
}

/// Best-effort literature search.
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    /// Returns an empty list when the upstream service fails or finds nothing.
    async fn query(&self, text: &str, max_results: usize) -> Vec<Study>;
}

/// The three model collaborators the fusion pipeline drives.
#[derive(Clone)]
pub struct Collaborators {
    pub classifier: Arc<dyn Classifier>,
    pub report_generator: Arc<dyn ReportGenerator>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl Collaborators {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        report_generator: Arc<dyn ReportGenerator>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            classifier,
            report_generator,
            summarizer,
        }
    }
}

/// Caps concurrent calls into a collaborator.
///
/// Several wrappers can share one semaphore so that, for example, every model on the
/// same device takes turns.
pub struct Throttled<C> {
    inner: C,
    permits: Arc<Semaphore>,
}

impl<C> Throttled<C> {
    pub fn new(inner: C, permits: usize) -> Self {
        Self::sharing(inner, Arc::new(Semaphore::new(permits.max(1))))
    }

    pub fn sharing(inner: C, permits: Arc<Semaphore>) -> Self {
        Self { inner, permits }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

// The semaphore is never closed, so acquire only fails if that changes; proceed unthrottled then.
#[async_trait]
impl<C: Classifier> Classifier for Throttled<C> {
    async fn analyze(&self, image: &Path) -> PathologyScoreMap {
        let _permit = self.permits.acquire().await.ok();
        self.inner.analyze(image).await
    }
}

#[async_trait]
impl<C: ReportGenerator> ReportGenerator for Throttled<C> {
    async fn generate(&self, image: &Path, indication: &str, view: ViewKind) -> ViewReport {
        let _permit = self.permits.acquire().await.ok();
        self.inner.generate(image, indication, view).await
    }
}

#[async_trait]
impl<C: Summarizer> Summarizer for Throttled<C> {
    async fn summarize(&self, text: &str, budget: SummaryBudget) -> anyhow::Result<String> {
        let _permit = self.permits.acquire().await.ok();
        self.inner.summarize(text, budget).await
    }
}
