#![doc = include_str!("../README.md")]
//!
//! # 모듈 구조
//!
//! - [`error`]: 엔진 에러 (`EngineError`)
//! - [`git`]: git 호출 경계 (`GitClient`, `CliGitClient`)
//! - [`target`]: 참조 해석과 작업 사본 캐시 (`RefResolver`, `RepoCache`, `ResolvedTarget`)
//! - [`language`]: 언어 감지 (`LanguageDetector`, `DetectedLanguageSet`)
//! - [`selector`]: 스캐너 선택 (`ScannerSelector`)
//! - [`runner`]: 외부 도구 실행 (`CommandRunner`, `ToolExecutor`, `ScanResult`)
//! - [`sbom`]: SBOM 캐시 (`SbomCache`, `SbomKey`)
//! - [`parser`]: 결과 파서 (`ResultParser`, `ParserRegistry`)
//! - [`coverage`]: 커버리지 매트릭스 (`CoverageMatrix`, `CoverageState`)
//! - [`upload`]: 결과 업로드 (`Uploader`)
//! - [`orchestrator`]: 실행 흐름 (`Orchestrator`, `RunReport`)

pub mod coverage;
pub mod error;
pub mod git;
pub mod language;
pub mod orchestrator;
pub mod parser;
pub mod runner;
pub mod sbom;
pub mod selector;
pub mod target;
pub mod upload;

// --- 주요 타입 re-export ---

// 에러
pub use error::EngineError;

// 실행 흐름
pub use orchestrator::{Orchestrator, RepoScanContext, RunReport, SkippedRepository};

// 대상 해석
pub use git::{CliGitClient, GitClient};
pub use target::{RefResolver, RepoCache, ResolvedTarget};

// 언어 / 선택
pub use language::{DetectedLanguageSet, LanguageDetector, LanguageSource};
pub use selector::{ScannerSelector, Selection, SkipReason, SkippedScanner};

// 실행 / 결과
pub use coverage::{CoverageMatrix, CoverageRow, CoverageState, RepoLevelScanner};
pub use parser::{ParserRegistry, ResultParser};
pub use runner::{CommandOutput, CommandRunner, CommandSpec, ProcessRunner, ScanResult, ToolExecutor};
pub use sbom::{SbomCache, SbomKey};
pub use upload::{UploadStats, Uploader};
