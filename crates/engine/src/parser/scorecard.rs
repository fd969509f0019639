//! OpenSSF Scorecard 파서
//!
//! 체크별 점수(0-10)를 심각도로 변환합니다. 점수가 음수인 체크는
//! 평가 불가로 보고 건너뜁니다.
//!
//! | 점수 | 심각도 |
//! |---|---|
//! | 0-3 | critical |
//! | 4-5 | high |
//! | 6-7 | medium |
//! | 8-9 | low |
//! | 10 | info |

use std::path::Path;

use allscan_core::types::{FindingSummary, Severity};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// 요약 화면의 체크 사유 최대 길이
pub const REASON_DISPLAY_LEN: usize = 40;

/// Scorecard 보고서 (필요한 필드만)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardReport {
    pub date: String,
    pub score: f64,
    pub scorecard: ScorecardVersion,
    pub checks: Vec<ScorecardCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardVersion {
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorecardCheck {
    pub name: String,
    pub score: i64,
    pub reason: String,
}

/// 점수 구간 (표시 색상 선택용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    /// 평가 불가 (음수 점수)
    Unknown,
    /// 8 이상
    Good,
    /// 5-7
    Fair,
    /// 3-4
    Weak,
    /// 3 미만
    Poor,
}

impl ScoreBand {
    pub fn for_check(score: i64) -> Self {
        match score {
            s if s < 0 => Self::Unknown,
            s if s >= 8 => Self::Good,
            s if s >= 5 => Self::Fair,
            s if s >= 3 => Self::Weak,
            _ => Self::Poor,
        }
    }

    /// 전체 점수: 7 이상 Good, 4 이상 Fair, 그 외 Poor
    pub fn for_overall(score: f64) -> Self {
        if score >= 7.0 {
            Self::Good
        } else if score >= 4.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Unknown => "⚪",
            Self::Good => "🟢",
            Self::Fair => "🟡",
            Self::Weak => "🟠",
            Self::Poor => "🔴",
        }
    }
}

impl ScorecardCheck {
    /// `" ?"` 또는 두 자리 정렬 점수
    pub fn score_label(&self) -> String {
        if self.score < 0 {
            " ?".to_owned()
        } else {
            format!("{:2}", self.score)
        }
    }

    pub fn short_reason(&self) -> String {
        truncate_reason(&self.reason, REASON_DISPLAY_LEN)
    }
}

impl ScorecardReport {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub async fn load(path: &Path) -> Result<Self, EngineError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::io(path, e))?;
        Self::from_slice(&data).map_err(|e| EngineError::Parse {
            tool: "scorecard".to_owned(),
            reason: e.to_string(),
        })
    }

    pub fn summary(&self) -> FindingSummary {
        let mut summary = FindingSummary::default();
        for check in &self.checks {
            if let Some(severity) = severity_for_score(check.score) {
                summary.record(severity);
            }
        }
        summary
    }
}

/// 음수 점수는 `None`
pub fn severity_for_score(score: i64) -> Option<Severity> {
    let severity = match score {
        s if s < 0 => return None,
        0..=3 => Severity::Critical,
        4..=5 => Severity::High,
        6..=7 => Severity::Medium,
        8..=9 => Severity::Low,
        _ => Severity::Info,
    };
    Some(severity)
}

pub fn parse_scorecard(data: &[u8]) -> Result<FindingSummary, serde_json::Error> {
    Ok(ScorecardReport::from_slice(data)?.summary())
}

/// 첫 줄만 남기고 `max_len`자를 넘으면 `...`로 자릅니다.
pub fn truncate_reason(reason: &str, max_len: usize) -> String {
    let first = reason.lines().next().unwrap_or_default();
    if first.chars().count() <= max_len {
        return first.to_owned();
    }
    let kept: String = first.chars().take(max_len.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "date": "2026-03-02",
        "repo": {"name": "github.com/acme/demo"},
        "scorecard": {"version": "v5.0.0", "commit": "abc"},
        "score": 6.4,
        "checks": [
            {"name": "Code-Review", "score": 0, "reason": "found 3 unreviewed changesets"},
            {"name": "Maintained", "score": 10, "reason": "30 commits"},
            {"name": "Pinned-Dependencies", "score": 5, "reason": "dependency not pinned by hash\nsecond line"},
            {"name": "Signed-Releases", "score": -1, "reason": "no releases found"},
            {"name": "Fuzzing", "score": 8, "reason": "project is fuzzed"},
            {"name": "License", "score": 7, "reason": "license file detected"}
        ]
    }"#;

    #[test]
    fn scores_map_to_severities() {
        let s = parse_scorecard(REPORT.as_bytes()).unwrap();
        assert_eq!(s.critical, 1);
        assert_eq!(s.high, 1);
        assert_eq!(s.medium, 1);
        assert_eq!(s.low, 1);
        assert_eq!(s.info, 1);
        // 음수 점수 체크는 제외
        assert_eq!(s.total, 5);
    }

    #[test]
    fn report_fields() {
        let r = ScorecardReport::from_slice(REPORT.as_bytes()).unwrap();
        assert_eq!(r.scorecard.version, "v5.0.0");
        assert!((r.score - 6.4).abs() < f64::EPSILON);
        assert_eq!(r.checks.len(), 6);
        assert_eq!(r.checks[3].score_label(), " ?");
        assert_eq!(r.checks[1].score_label(), "10");
        assert_eq!(r.checks[0].score_label(), " 0");
    }

    #[test]
    fn severity_boundaries() {
        assert_eq!(severity_for_score(-1), None);
        assert_eq!(severity_for_score(3), Some(Severity::Critical));
        assert_eq!(severity_for_score(4), Some(Severity::High));
        assert_eq!(severity_for_score(7), Some(Severity::Medium));
        assert_eq!(severity_for_score(9), Some(Severity::Low));
        assert_eq!(severity_for_score(10), Some(Severity::Info));
    }

    #[test]
    fn bands() {
        assert_eq!(ScoreBand::for_check(-1), ScoreBand::Unknown);
        assert_eq!(ScoreBand::for_check(8), ScoreBand::Good);
        assert_eq!(ScoreBand::for_check(5), ScoreBand::Fair);
        assert_eq!(ScoreBand::for_check(3), ScoreBand::Weak);
        assert_eq!(ScoreBand::for_check(2), ScoreBand::Poor);
        assert_eq!(ScoreBand::for_overall(7.0), ScoreBand::Good);
        assert_eq!(ScoreBand::for_overall(4.5), ScoreBand::Fair);
        assert_eq!(ScoreBand::for_overall(3.9), ScoreBand::Poor);
    }

    #[test]
    fn reason_truncation() {
        assert_eq!(truncate_reason("short", 40), "short");
        assert_eq!(truncate_reason("line one\nline two", 40), "line one");
        let long = "a".repeat(50);
        let t = truncate_reason(&long, 40);
        assert_eq!(t.len(), 40);
        assert!(t.ends_with("..."));
        assert_eq!(truncate_reason("", 40), "");
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let err = ScorecardReport::load(Path::new("/nonexistent/scorecard.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Io { .. }));
    }
}
