//! SCA 파서 (grype, osv-scanner)

use allscan_core::types::{FindingSummary, Severity};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GrypeOutput {
    matches: Vec<GrypeMatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GrypeMatch {
    vulnerability: GrypeVulnerability,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GrypeVulnerability {
    severity: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvOutput {
    results: Vec<OsvResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvResult {
    packages: Vec<OsvPackage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvPackage {
    groups: Vec<OsvGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OsvGroup {
    max_severity: Option<String>,
}

/// 없거나 알 수 없는 심각도는 info로 셉니다.
fn bucket(severity: Option<&str>) -> Severity {
    severity
        .and_then(Severity::from_str_loose)
        .unwrap_or(Severity::Info)
}

pub fn parse_grype(data: &[u8]) -> Result<FindingSummary, serde_json::Error> {
    let output: GrypeOutput = serde_json::from_slice(data)?;
    let mut summary = FindingSummary::default();
    for m in &output.matches {
        summary.record(bucket(m.vulnerability.severity.as_deref()));
    }
    Ok(summary)
}

/// 패키지 그룹 하나(같은 취약점의 별칭 묶음)를 한 건으로 셉니다.
pub fn parse_osv(data: &[u8]) -> Result<FindingSummary, serde_json::Error> {
    let output: OsvOutput = serde_json::from_slice(data)?;
    let mut summary = FindingSummary::default();
    for group in output
        .results
        .iter()
        .flat_map(|r| &r.packages)
        .flat_map(|p| &p.groups)
    {
        summary.record(bucket(group.max_severity.as_deref()));
    }
    Ok(summary)
}
