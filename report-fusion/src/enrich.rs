use std::sync::Arc;
use tracing::info;

use crate::collaborators::LiteratureSearch;
use crate::models::{EnrichedRecord, FusedRecord, PatientCase};

/// Attaches literature search results to a fused record.
#[derive(Clone)]
pub struct LiteratureEnricher {
    search: Arc<dyn LiteratureSearch>,
}

impl LiteratureEnricher {
    pub fn new(search: Arc<dyn LiteratureSearch>) -> Self {
        Self { search }
    }

    pub async fn enrich(
        &self,
        case: &PatientCase,
        record: FusedRecord,
        max_results: usize,
    ) -> EnrichedRecord {
        let query = search_query(case, &record);
        let medical_studies = self.search.query(&query, max_results).await;

        info!(
            uid = %record.uid,
            studies = medical_studies.len(),
            "Attached literature results"
        );

        EnrichedRecord {
            record,
            medical_studies,
        }
    }
}

/// Indication, findings and impression, concatenated as-is.
pub fn search_query(case: &PatientCase, record: &FusedRecord) -> String {
    format!(
        "{}{}{}",
        case.indication(),
        record.findings,
        record.impression
    )
}
