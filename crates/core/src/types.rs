//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 스캐너 결과 집계와 커버리지 계산이 공유하는 데이터 구조를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 심각도 레벨
///
/// 스캐너가 보고한 발견 항목의 심각도를 나타냅니다.
/// `Ord` 구현으로 심각도 비교가 가능합니다 (`Info < Low < Medium < High < Critical`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 정보성 항목
    #[default]
    Info,
    /// 낮은 심각도
    Low,
    /// 중간 심각도
    Medium,
    /// 높은 심각도
    High,
    /// 치명적
    Critical,
}

impl Severity {
    /// 문자열에서 심각도를 파싱합니다.
    ///
    /// 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "info" | "informational" | "negligible" => Some(Self::Info),
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "Info"),
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
            Self::Critical => write!(f, "Critical"),
        }
    }
}

/// 심각도별 발견 항목 집계
///
/// `total`은 버킷 합계와 다를 수 있습니다. 심각도를 분류하지 않는 도구도
/// 전체 개수는 보고하기 때문입니다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingSummary {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
    pub total: usize,
}

impl FindingSummary {
    /// 심각도 하나를 해당 버킷과 `total`에 더합니다.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
            Severity::Info => self.info += 1,
        }
        self.total += 1;
    }

    /// 다른 집계를 누적합니다.
    pub fn merge(&mut self, other: &FindingSummary) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.info += other.info;
        self.total += other.total;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// 분석 카테고리
///
/// 도구가 수행하는 검사의 종류입니다. SCA와 SAST만 언어별 커버리지
/// 매트릭스에 포함되고, 나머지는 저장소 단위 결과로 따로 보고됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnalysisCategory {
    /// 의존성 취약점 분석
    #[serde(rename = "SCA", alias = "sca")]
    Sca,
    /// 정적 소스 분석
    #[serde(rename = "SAST", alias = "sast")]
    Sast,
    /// 비밀 정보 탐지
    #[serde(alias = "secrets")]
    Secrets,
    /// 저장소 보안 상태 평가
    #[serde(alias = "scorecard")]
    Scorecard,
    /// 바이너리 산출물 탐지
    #[serde(alias = "binary")]
    Binary,
}

impl AnalysisCategory {
    /// 커버리지 매트릭스의 열 순서
    pub const MATRIX: [AnalysisCategory; 2] = [AnalysisCategory::Sca, AnalysisCategory::Sast];

    /// 언어별 매트릭스에 포함되는 카테고리인지 여부
    pub fn is_matrix_tracked(self) -> bool {
        Self::MATRIX.contains(&self)
    }

    /// 설정 파일의 `category` 값을 파싱합니다. 대소문자를 구분하지 않습니다.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sca" => Some(Self::Sca),
            "sast" => Some(Self::Sast),
            "secrets" | "secret" => Some(Self::Secrets),
            "scorecard" => Some(Self::Scorecard),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for AnalysisCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sca => write!(f, "SCA"),
            Self::Sast => write!(f, "SAST"),
            Self::Secrets => write!(f, "Secrets"),
            Self::Scorecard => write!(f, "Scorecard"),
            Self::Binary => write!(f, "Binary"),
        }
    }
}
