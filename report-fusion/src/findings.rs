use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::scores::PathologyScoreMap;

pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// How the selected pathology labels are joined into a phrase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStyle {
    /// `", "` between all but the last label, then `"and"` glued to the last one with no
    /// spaces. Existing reports were produced this way, so it stays the default.
    #[default]
    Legacy,
    /// `"a"`, `"a and b"`, `"a, b and c"`.
    Natural,
}

impl FromStr for JoinStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(JoinStyle::Legacy),
            "natural" => Ok(JoinStyle::Natural),
            other => Err(format!("unknown join style: {other}")),
        }
    }
}

/// Lists the pathologies scoring at or above `threshold` as a lower-case phrase.
///
/// Returns an empty string when nothing qualifies.
pub fn textualize_findings(scores: &PathologyScoreMap, threshold: f64, style: JoinStyle) -> String {
    let labels: Vec<String> = scores
        .iter()
        .filter(|(_, score)| *score >= threshold)
        .map(|(pathology, _)| pathology.replace('_', " ").to_lowercase())
        .collect();

    let Some((last, rest)) = labels.split_last() else {
        return String::new();
    };

    match style {
        JoinStyle::Legacy => format!("{}and{}", rest.join(", "), last),
        JoinStyle::Natural if rest.is_empty() => last.clone(),
        JoinStyle::Natural => format!("{} and {}", rest.join(", "), last),
    }
}
