//! 결과 파서 -- 도구별 JSON 출력을 심각도 히스토그램으로 변환
//!
//! 지원 도구는 빌드 시점에 고정되어 있으므로 [`ResultParser`]는 닫힌 열거형이며,
//! [`ParserRegistry`]가 스캐너 이름을 변형에 연결합니다. 레지스트리는 시작 시
//! 한 번 만들어 필요한 컴포넌트에 참조로 전달합니다.
//!
//! # 지원 형식
//!
//! | 스캐너 | 카테고리 | 스키마 |
//! |---|---|---|
//! | `grype` | SCA | `matches[].vulnerability.severity` |
//! | `osv-scanner` | SCA | `results[].packages[].groups[].max_severity` |
//! | `gosec` | SAST | `Issues[].severity` |
//! | `gitleaks` | Secrets | 최상위 배열 |
//! | `scorecard` | Scorecard | `checks[].score` |
//! | `binary-detector` | Binary | `total` |

pub mod binary;
pub mod sast;
pub mod sca;
pub mod scorecard;
pub mod secrets;

use std::collections::HashMap;
use std::path::Path;

use allscan_core::config::ScannerConfig;
use allscan_core::types::{AnalysisCategory, FindingSummary};

use crate::error::EngineError;

/// 도구별 출력 스키마
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultParser {
    Grype,
    OsvScanner,
    Gosec,
    Gitleaks,
    Scorecard,
    BinaryDetector,
}

impl ResultParser {
    pub const ALL: [ResultParser; 6] = [
        Self::Grype,
        Self::OsvScanner,
        Self::Gosec,
        Self::Gitleaks,
        Self::Scorecard,
        Self::BinaryDetector,
    ];

    /// 기본 등록 이름
    pub fn name(self) -> &'static str {
        match self {
            Self::Grype => "grype",
            Self::OsvScanner => "osv-scanner",
            Self::Gosec => "gosec",
            Self::Gitleaks => "gitleaks",
            Self::Scorecard => "scorecard",
            Self::BinaryDetector => binary::BUILTIN_NAME,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Grype => "📦",
            Self::OsvScanner => "🔎",
            Self::Gosec => "🔍",
            Self::Gitleaks => "🔑",
            Self::Scorecard => "🛡️",
            Self::BinaryDetector => "📀",
        }
    }

    pub fn category(self) -> AnalysisCategory {
        match self {
            Self::Grype | Self::OsvScanner => AnalysisCategory::Sca,
            Self::Gosec => AnalysisCategory::Sast,
            Self::Gitleaks => AnalysisCategory::Secrets,
            Self::Scorecard => AnalysisCategory::Scorecard,
            Self::BinaryDetector => AnalysisCategory::Binary,
        }
    }

    /// 원시 출력을 파싱합니다.
    pub fn parse(self, data: &[u8]) -> Result<FindingSummary, EngineError> {
        let result = match self {
            Self::Grype => sca::parse_grype(data),
            Self::OsvScanner => sca::parse_osv(data),
            Self::Gosec => sast::parse_gosec(data),
            Self::Gitleaks => secrets::parse_gitleaks(data),
            Self::Scorecard => scorecard::parse_scorecard(data),
            Self::BinaryDetector => binary::parse_binary_report(data),
        };
        result.map_err(|e| EngineError::Parse {
            tool: self.name().to_owned(),
            reason: e.to_string(),
        })
    }

    /// 결과 파일을 읽어 파싱합니다.
    pub async fn parse_file(self, path: &Path) -> Result<FindingSummary, EngineError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::io(path, e))?;
        self.parse(&data)
    }
}

/// 스캐너 이름 → 파서
#[derive(Debug, Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, ResultParser>,
}

impl ParserRegistry {
    /// 빈 레지스트리
    pub fn new() -> Self {
        Self::default()
    }

    /// 모든 내장 파서를 기본 이름으로 등록한 레지스트리
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for parser in ResultParser::ALL {
            registry.register(parser.name(), parser);
        }
        registry
    }

    /// 파서를 등록합니다. 같은 이름이 있으면 교체합니다.
    pub fn register(&mut self, name: impl Into<String>, parser: ResultParser) {
        self.parsers.insert(name.into(), parser);
    }

    pub fn get(&self, name: &str) -> Option<ResultParser> {
        self.parsers.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// 스캐너 이름, 없으면 `builtin:` 명령 이름으로 파서를 찾습니다.
    pub fn parser_for(&self, scanner: &ScannerConfig) -> Option<ResultParser> {
        self.get(&scanner.name)
            .or_else(|| scanner.builtin_name().and_then(|name| self.get(name)))
    }

    /// 스캐너의 분석 카테고리
    ///
    /// 설정의 `category`가 파서의 카테고리보다 우선합니다.
    pub fn category_for(&self, scanner: &ScannerConfig) -> Option<AnalysisCategory> {
        scanner
            .category
            .or_else(|| self.parser_for(scanner).map(ResultParser::category))
    }
}
