//! 설정 로드 -- `scanners.toml`, `repositories.toml` 모델과 검증
//!
//! [`AllscanConfig`]는 전역 설정과 스캐너 카탈로그를 담는 최상위 구조체입니다.
//! 대상 저장소 목록은 같은 파일의 `[[repositories]]` 또는 별도의
//! [`RepositoryList`] 파일에서 읽습니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`ALLSCAN_GENERAL_WORKSPACE=/scratch` 형식)
//! 3. 설정 파일 (`scanners.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), allscan_core::error::AllscanError> {
//! use allscan_core::config::{AllscanConfig, RepositoryList};
//!
//! let config = AllscanConfig::load("scanners.toml").await?;
//! let repos = RepositoryList::load("repositories.toml").await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::{AllscanError, ConfigError};
use crate::types::AnalysisCategory;

/// 내장 도구를 가리키는 `command` 접두사
pub const BUILTIN_PREFIX: &str = "builtin:";

/// 브랜치를 지정하지 않았을 때 사용하는 기본 브랜치
pub const DEFAULT_BRANCH: &str = "main";

/// Allscan 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllscanConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스캐너 카탈로그
    #[serde(default)]
    pub scanners: Vec<ScannerConfig>,
    /// 설정 파일에 직접 적힌 대상 저장소 (선택)
    #[serde(default)]
    pub repositories: Vec<RepositorySpec>,
}

impl AllscanConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드와 검증을 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AllscanError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, AllscanError> {
        let content = read_config_file(path.as_ref()).await?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, AllscanError> {
        toml::from_str(toml_str).map_err(|e| {
            AllscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 일반 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `ALLSCAN_GENERAL_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        let g = &mut self.general;
        override_string(&mut g.log_level, "ALLSCAN_GENERAL_LOG_LEVEL");
        override_string(&mut g.log_format, "ALLSCAN_GENERAL_LOG_FORMAT");
        override_string(&mut g.workspace, "ALLSCAN_GENERAL_WORKSPACE");
        override_string(&mut g.results_dir, "ALLSCAN_GENERAL_RESULTS_DIR");
        override_string(&mut g.upload_endpoint, "ALLSCAN_GENERAL_UPLOAD_ENDPOINT");
        override_string(&mut g.upload_token_env, "ALLSCAN_GENERAL_UPLOAD_TOKEN_ENV");
        override_bool(&mut g.fail_fast, "ALLSCAN_GENERAL_FAIL_FAST");
        override_u64(
            &mut g.results_max_age_days,
            "ALLSCAN_GENERAL_RESULTS_MAX_AGE_DAYS",
        );
        override_u64(&mut g.sbom_timeout_secs, "ALLSCAN_GENERAL_SBOM_TIMEOUT_SECS");
        override_u64(
            &mut g.network_timeout_secs,
            "ALLSCAN_GENERAL_NETWORK_TIMEOUT_SECS",
        );
        override_string(&mut g.github_api_url, "ALLSCAN_GENERAL_GITHUB_API_URL");
        override_string(&mut g.github_token_env, "ALLSCAN_GENERAL_GITHUB_TOKEN_ENV");
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 저장소 항목은 여기서 검증하지 않습니다. 잘못된 저장소 항목은
    /// 실행 시점에 해당 항목만 건너뜁니다 ([`RepositorySpec::validate`]).
    pub fn validate(&self) -> Result<(), AllscanError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        if self.general.workspace.trim().is_empty() {
            return Err(invalid("general.workspace", "must not be empty".to_owned()));
        }
        if self.general.results_dir.trim().is_empty() {
            return Err(invalid("general.results_dir", "must not be empty".to_owned()));
        }
        if self.general.sbom_timeout_secs == 0 {
            return Err(invalid(
                "general.sbom_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.general.network_timeout_secs == 0 {
            return Err(invalid(
                "general.network_timeout_secs",
                "must be greater than 0".to_owned(),
            ));
        }

        let mut seen = HashSet::new();
        for scanner in &self.scanners {
            if scanner.name.trim().is_empty() {
                return Err(invalid("scanners.name", "must not be empty".to_owned()));
            }
            if !seen.insert(scanner.name.as_str()) {
                return Err(invalid(
                    "scanners.name",
                    format!("duplicate scanner name '{}'", scanner.name),
                ));
            }
            if scanner.enabled && scanner.command.trim().is_empty() {
                return Err(invalid(
                    &format!("scanners.{}.command", scanner.name),
                    "must not be empty when the scanner is enabled".to_owned(),
                ));
            }
            if scanner.timeout_secs == 0 {
                return Err(invalid(
                    &format!("scanners.{}.timeout_secs", scanner.name),
                    "must be greater than 0".to_owned(),
                ));
            }
        }

        Ok(())
    }

    /// 활성화된 스캐너를 카탈로그 순서대로 반환합니다.
    pub fn enabled_scanners(&self) -> impl Iterator<Item = &ScannerConfig> {
        self.scanners.iter().filter(|s| s.enabled)
    }

    /// 이름으로 스캐너를 찾습니다.
    pub fn scanner(&self, name: &str) -> Option<&ScannerConfig> {
        self.scanners.iter().find(|s| s.name == name)
    }

    /// 업로드 엔드포인트가 설정되어 있는지 여부
    pub fn upload_configured(&self) -> bool {
        !self.general.upload_endpoint.trim().is_empty()
    }
}

/// `repositories.toml` 파일 구조
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryList {
    #[serde(default)]
    pub repositories: Vec<RepositorySpec>,
}

impl RepositoryList {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AllscanError> {
        let content = read_config_file(path.as_ref()).await?;
        Self::parse(&content)
    }

    pub fn parse(toml_str: &str) -> Result<Self, AllscanError> {
        toml::from_str(toml_str).map_err(|e| {
            AllscanError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 저장소 클론 작업 디렉토리
    pub workspace: String,
    /// 결과 JSON 저장 디렉토리 (`sboms/` 하위 디렉토리 포함)
    pub results_dir: String,
    /// 결과 업로드 엔드포인트 (빈 문자열이면 업로드 안 함)
    pub upload_endpoint: String,
    /// 업로드 토큰을 담은 환경변수 이름
    pub upload_token_env: String,
    /// 첫 실패에서 전체 실행 중단
    pub fail_fast: bool,
    /// 이보다 오래된 결과 파일은 실행 전에 삭제 (일, 0이면 삭제 안 함)
    pub results_max_age_days: u64,
    /// SBOM 생성 제한 시간 (초)
    pub sbom_timeout_secs: u64,
    /// 원격 조회 제한 시간 (초)
    pub network_timeout_secs: u64,
    /// 언어 메타데이터 조회용 GitHub API 주소
    pub github_api_url: String,
    /// GitHub 토큰을 담은 환경변수 이름
    pub github_token_env: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            workspace: "/tmp/scanner-workspace".to_owned(),
            results_dir: "./scan-results".to_owned(),
            upload_endpoint: String::new(),
            upload_token_env: "VULN_MGMT_API_TOKEN".to_owned(),
            fail_fast: false,
            results_max_age_days: 7,
            sbom_timeout_secs: 300,
            network_timeout_secs: 10,
            github_api_url: "https://api.github.com".to_owned(),
            github_token_env: "GITHUB_TOKEN".to_owned(),
        }
    }
}

impl GeneralConfig {
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_secs)
    }

    pub fn sbom_timeout(&self) -> Duration {
        Duration::from_secs(self.sbom_timeout_secs)
    }
}

/// 스캐너 카탈로그 항목
///
/// 실행 중에는 변경되지 않습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub name: String,
    pub enabled: bool,
    /// 실행 파일 또는 `builtin:<name>`
    pub command: String,
    /// 인자 템플릿 (`{{output}}`, `{{repo}}`, `{{sbom}}` 치환)
    pub args: Vec<String>,
    /// 로컬 모드 전용 인자 (비어 있으면 `args` 사용)
    pub args_local: Vec<String>,
    /// 완전 지원 언어 (비어 있으면 모든 언어)
    pub languages: Vec<String>,
    /// 조건부 지원 언어 (특정 매니페스트가 있을 때만 동작)
    pub languages_conditional: Vec<String>,
    /// 실행 제한 시간 (초)
    pub timeout_secs: u64,
    /// 파서 레지스트리의 카테고리 대신 사용할 값 (대소문자 무시)
    #[serde(deserialize_with = "deserialize_category")]
    pub category: Option<AnalysisCategory>,
    /// 업로드 시 사용할 scan type (비어 있으면 업로드 안 함)
    pub upload_scan_type: String,
    /// 실행 전에 설정되어 있어야 하는 환경변수
    pub required_env: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            enabled: true,
            command: String::new(),
            args: Vec::new(),
            args_local: Vec::new(),
            languages: Vec::new(),
            languages_conditional: Vec::new(),
            timeout_secs: 300,
            category: None,
            upload_scan_type: String::new(),
            required_env: Vec::new(),
        }
    }
}

impl ScannerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 모든 언어에 적용되는 스캐너인지 여부
    ///
    /// 조건부 언어 목록만 있는 스캐너는 범용이 아닙니다.
    pub fn is_universal(&self) -> bool {
        self.languages.is_empty() && self.languages_conditional.is_empty()
    }

    /// `builtin:` 명령이면 내장 도구 이름을 반환합니다.
    pub fn builtin_name(&self) -> Option<&str> {
        self.command.strip_prefix(BUILTIN_PREFIX)
    }

    /// 실행 모드에 맞는 인자 템플릿
    pub fn args_for(&self, local: bool) -> &[String] {
        if local && !self.args_local.is_empty() {
            &self.args_local
        } else {
            &self.args
        }
    }

    /// 설정되지 않은 첫 번째 필수 환경변수
    pub fn first_missing_env(&self) -> Option<&str> {
        self.required_env
            .iter()
            .map(String::as_str)
            .find(|key| std::env::var(key).map(|v| v.is_empty()).unwrap_or(true))
    }
}

/// 대상 저장소 명세
///
/// URL과 최대 하나의 명시적 참조 선택자를 담습니다.
/// 여러 개가 지정되면 `version` > `commit` > `branch` 순으로 적용됩니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// 태그 이름 (예: `v1.2.3`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// 커밋 해시 (7-40자리 16진수)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// 실행할 스캐너 이름 (비어 있으면 적용 가능한 전체)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scanners: Vec<String>,
}

impl RepositorySpec {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn branch(&self) -> Option<&str> {
        non_empty(&self.branch)
    }

    pub fn version(&self) -> Option<&str> {
        non_empty(&self.version)
    }

    pub fn commit(&self) -> Option<&str> {
        non_empty(&self.commit)
    }

    /// 저장소 항목을 검증합니다.
    ///
    /// URL이 있어야 하고, branch/version/commit 중 하나 이상이 있어야 하며,
    /// commit은 7-40자리 16진수여야 합니다.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "repositories.url".to_owned(),
                reason: "repository URL is required".to_owned(),
            });
        }

        if self.branch().is_none() && self.version().is_none() && self.commit().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "repositories.branch".to_owned(),
                reason: "at least one of branch, version, or commit must be specified"
                    .to_owned(),
            });
        }

        if let Some(commit) = self.commit()
            && !is_commit_hash(commit)
        {
            return Err(ConfigError::InvalidValue {
                field: "repositories.commit".to_owned(),
                reason: format!("invalid commit hash '{commit}': must be 7-40 hexadecimal characters"),
            });
        }

        Ok(())
    }

    /// 우선순위 규칙에 따라 참조 선택자를 결정합니다.
    pub fn selector(&self) -> RefSelector {
        if let Some(v) = self.version() {
            RefSelector::Tag(v.to_owned())
        } else if let Some(c) = self.commit() {
            RefSelector::Commit(c.to_owned())
        } else if let Some(b) = self.branch() {
            RefSelector::Branch(b.to_owned())
        } else {
            RefSelector::Branch(DEFAULT_BRANCH.to_owned())
        }
    }

    /// 태그와 커밋이 함께 지정되어 체크아웃 후 일치 여부를 확인해야 하는지
    pub fn declared_tag_commit(&self) -> Option<(&str, &str)> {
        match (self.version(), self.commit()) {
            (Some(v), Some(c)) => Some((v, c)),
            _ => None,
        }
    }
}

/// 해석된 참조 선택자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RefSelector {
    /// 정확한 태그
    Tag(String),
    /// 정확한 커밋
    Commit(String),
    /// 브랜치의 최신 커밋
    Branch(String),
}

impl RefSelector {
    /// 결과 표시와 업로드에 쓰는 라벨
    pub fn label(&self) -> &str {
        match self {
            Self::Tag(v) | Self::Commit(v) | Self::Branch(v) => v,
        }
    }
}

impl fmt::Display for RefSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(v) => write!(f, "version {v}"),
            Self::Commit(c) => write!(f, "commit {c}"),
            Self::Branch(b) => write!(f, "branch {b}"),
        }
    }
}

/// 7-40자리 16진수 문자열인지 검사합니다.
pub fn is_commit_hash(s: &str) -> bool {
    (7..=40).contains(&s.len()) && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn deserialize_category<'de, D>(deserializer: D) -> Result<Option<AnalysisCategory>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    AnalysisCategory::from_str_loose(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown analysis category '{raw}'")))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(field: &str, reason: String) -> AllscanError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

async fn read_config_file(path: &Path) -> Result<String, AllscanError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AllscanError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            })
        } else {
            AllscanError::Io(e)
        }
    })
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
