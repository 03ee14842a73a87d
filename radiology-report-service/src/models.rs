use report_fusion::FusedRecord;
use serde::{Deserialize, Serialize};

/// One case in a `/fuse` batch, referring to images already under the image root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRequest {
    pub uid: String,
    #[serde(default)]
    pub frontal_images: Vec<String>,
    #[serde(default)]
    pub lateral_images: Vec<String>,
    #[serde(default)]
    pub indications: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FuseBatchRequest {
    pub cases: Vec<CaseRequest>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Ok,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaseResult {
    pub uid: String,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FusedRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
