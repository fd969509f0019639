//! SAST 파서 (gosec)

use allscan_core::types::{FindingSummary, Severity};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GosecOutput {
    #[serde(rename = "Issues")]
    issues: Option<Vec<GosecIssue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GosecIssue {
    severity: Option<String>,
}

/// HIGH/MEDIUM/LOW만 분류하고, 모든 이슈를 total에 포함합니다.
pub fn parse_gosec(data: &[u8]) -> Result<FindingSummary, serde_json::Error> {
    let output: GosecOutput = serde_json::from_slice(data)?;
    let mut summary = FindingSummary::default();
    for issue in output.issues.iter().flatten() {
        summary.total += 1;
        match issue.severity.as_deref().and_then(Severity::from_str_loose) {
            Some(Severity::High) => summary.high += 1,
            Some(Severity::Medium) => summary.medium += 1,
            Some(Severity::Low) => summary.low += 1,
            _ => {}
        }
    }
    Ok(summary)
}
