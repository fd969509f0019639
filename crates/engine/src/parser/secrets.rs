//! 시크릿 파서 (gitleaks)
//!
//! gitleaks 보고서는 발견 항목의 최상위 배열입니다. 유출된 시크릿은 모두 high입니다.

use allscan_core::types::FindingSummary;

pub fn parse_gitleaks(data: &[u8]) -> Result<FindingSummary, serde_json::Error> {
    let findings: Vec<serde::de::IgnoredAny> = serde_json::from_slice(data)?;
    Ok(FindingSummary {
        high: findings.len(),
        total: findings.len(),
        ..FindingSummary::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_leak_is_high() {
        let data = br#"[
            {"RuleID":"aws-access-token","File":"config.py","StartLine":3},
            {"RuleID":"github-pat","File":".env"}
        ]"#;
        let s = parse_gitleaks(data).unwrap();
        assert_eq!(s.high, 2);
        assert_eq!(s.total, 2);
    }

    #[test]
    fn empty_report() {
        assert!(parse_gitleaks(b"[]").unwrap().is_empty());
    }

    #[test]
    fn object_is_rejected() {
        assert!(parse_gitleaks(br#"{"findings":[]}"#).is_err());
    }
}
