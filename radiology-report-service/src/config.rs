use report_fusion::{DEFAULT_THRESHOLD, FailedViewPolicy, FusionConfig, JoinStyle};
use std::fmt::{Debug, Display};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    MissingVar(&'static str),
}

/// Service settings, read from the environment.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    pub openrouter_api_key: String,
    pub report_model: String,
    pub summary_model: String,
    pub classifier_url: String,
    pub pubmed_base_url: String,
    pub upload_dir: PathBuf,
    /// Directory `/fuse` requests may read images from.
    pub image_root: PathBuf,
    pub default_max_studies: usize,
    pub max_upload_bytes: usize,
    /// Concurrent calls allowed across all model collaborators.
    pub inference_permits: usize,
    pub fusion: FusionConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openrouter_api_key = lookup("OPENROUTER_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingVar("OPENROUTER_API_KEY"))?;

        let string_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let fusion = FusionConfig {
            pathology_threshold: parse_or(&lookup, "PATHOLOGY_THRESHOLD", DEFAULT_THRESHOLD)
                .clamp(0.0, 1.0),
            join_style: parse_or(&lookup, "FINDINGS_JOIN", JoinStyle::Legacy),
            failed_view_policy: parse_or(
                &lookup,
                "FAILED_VIEW_POLICY",
                FailedViewPolicy::Placeholder,
            ),
            classify_concurrency: parse_or(&lookup, "CLASSIFY_CONCURRENCY", 1usize).max(1),
        };

        Ok(Self {
            port: parse_or(&lookup, "PORT", 8000u16),
            openrouter_api_key,
            report_model: string_or("REPORT_MODEL", "openai/gpt-4.1-mini"),
            summary_model: string_or("SUMMARY_MODEL", "openai/gpt-4o-mini"),
            classifier_url: string_or("CLASSIFIER_URL", "http://127.0.0.1:8500/analyze"),
            pubmed_base_url: string_or(
                "PUBMED_BASE_URL",
                "https://eutils.ncbi.nlm.nih.gov/entrez/eutils",
            ),
            upload_dir: PathBuf::from(string_or("UPLOAD_DIR", "assets/uploads")),
            image_root: PathBuf::from(string_or("IMAGE_ROOT", "assets/images")),
            default_max_studies: parse_or(&lookup, "DEFAULT_MAX_STUDIES", 5usize),
            max_upload_bytes: parse_or(&lookup, "MAX_UPLOAD_MB", 25usize).saturating_mul(1024 * 1024),
            inference_permits: parse_or(&lookup, "INFERENCE_PERMITS", 1usize).max(1),
            fusion,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Debug,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {} value {:?} ({}), using default {:?}", key, raw, e, default);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.upload_dir, PathBuf::from("assets/uploads"));
        assert_eq!(config.image_root, PathBuf::from("assets/images"));
        assert_eq!(config.fusion.pathology_threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.default_max_studies, 5);
        assert_eq!(config.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.inference_permits, 1);
        assert_eq!(config.fusion, FusionConfig::default());
    }

    #[test]
    fn test_api_key_is_required() {
        assert_eq!(
            ServiceConfig::from_lookup(lookup(&[])).unwrap_err(),
            ConfigError::MissingVar("OPENROUTER_API_KEY")
        );
        assert!(ServiceConfig::from_lookup(lookup(&[("OPENROUTER_API_KEY", "  ")])).is_err());
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("PORT", "9100"),
            ("FINDINGS_JOIN", "natural"),
            ("FAILED_VIEW_POLICY", "drop"),
            ("PATHOLOGY_THRESHOLD", "0.65"),
            ("CLASSIFY_CONCURRENCY", "0"),
            ("DEFAULT_MAX_STUDIES", "many"),
            ("IMAGE_ROOT", "/data/cxr"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9100);
        assert_eq!(config.fusion.join_style, JoinStyle::Natural);
        assert_eq!(config.fusion.failed_view_policy, FailedViewPolicy::Drop);
        assert_eq!(config.fusion.pathology_threshold, 0.65);
        assert_eq!(config.fusion.classify_concurrency, 1);
        assert_eq!(config.default_max_studies, 5);
        assert_eq!(config.image_root, PathBuf::from("/data/cxr"));
    }

    #[test]
    fn test_threshold_is_clamped() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("OPENROUTER_API_KEY", "sk-test"),
            ("PATHOLOGY_THRESHOLD", "1.7"),
        ]))
        .unwrap();

        assert_eq!(config.fusion.pathology_threshold, 1.0);
    }
}
