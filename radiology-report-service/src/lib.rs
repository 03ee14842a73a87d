//! HTTP front end for chest radiograph report fusion.
//!
//! Uploads are staged to disk, fused into findings and impression by
//! [`report_fusion::ReportFusionPipeline`], then enriched with PubMed studies.

pub mod adapters;
pub mod config;
pub mod models;
pub mod paths;
pub mod service;
pub mod telemetry;
pub mod uploads;

pub use config::ServiceConfig;
pub use service::{AppState, build_router, create_app};
