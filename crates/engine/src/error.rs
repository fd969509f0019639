//! 엔진 에러 타입
//!
//! [`EngineError`]는 엔진 내부의 모든 실패를 나타냅니다.
//! `From<EngineError> for AllscanError` 구현으로 상위 에러 타입으로 전파됩니다.
//!
//! # 에러 카테고리
//!
//! - **저장소 명세**: `InvalidSpec`
//! - **git**: `Git`, `CommitResolution`
//! - **도구 실행**: `ToolTimeout`, `ToolNotFound`, `ToolFailed`, `MissingEnv`, `Cancelled`
//! - **결과 처리**: `Parse`, `Sbom`, `Upload`
//! - **원격 메타데이터**: `LanguageMetadata`
//! - **파일 I/O**: `Io`

use allscan_core::error::{AllscanError, ConfigError, TargetError, ToolError};

/// 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// 저장소 명세가 유효하지 않음
    #[error("invalid repository spec: {0}")]
    InvalidSpec(#[from] ConfigError),

    /// git 명령 실패
    #[error("git {command} failed: {reason}")]
    Git {
        /// 실행한 하위 명령 (clone, fetch, ...)
        command: String,
        /// 실패 사유 (stderr 포함)
        reason: String,
    },

    /// 체크아웃 후 커밋 해시를 읽을 수 없음
    #[error("commit resolution failed: {0}")]
    CommitResolution(String),

    /// 도구 실행 제한 시간 초과
    #[error("{tool} timed out after {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    /// 도구 실행 파일을 찾을 수 없음
    #[error("{0} not found in PATH")]
    ToolNotFound(String),

    /// 도구 실행 실패
    #[error("{tool} failed: {reason}")]
    ToolFailed { tool: String, reason: String },

    /// 필수 환경변수 누락
    #[error("required environment variable {var} not set")]
    MissingEnv { tool: String, var: String },

    /// 실행 취소 (ctrl-c)
    #[error("{0} cancelled")]
    Cancelled(String),

    /// 결과 파싱 실패
    #[error("parse error for {tool}: {reason}")]
    Parse { tool: String, reason: String },

    /// SBOM 생성 실패
    #[error("sbom generation failed: {0}")]
    Sbom(String),

    /// 언어 메타데이터 조회 실패
    #[error("language metadata unavailable: {0}")]
    LanguageMetadata(String),

    /// 업로드 실패
    #[error("upload failed: {0}")]
    Upload(String),

    /// 파일 I/O 에러
    #[error("io error: {path}: {source}")]
    Io {
        /// 관련 파일 경로
        path: String,
        /// 원본 I/O 에러
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn git(command: &str, reason: impl Into<String>) -> Self {
        Self::Git {
            command: command.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

impl From<EngineError> for AllscanError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidSpec(e) => AllscanError::Config(e),
            EngineError::Git { command, reason } => {
                let msg = format!("git {command}: {reason}");
                if command == "ls-remote" {
                    AllscanError::Target(TargetError::Remote(msg))
                } else {
                    AllscanError::Target(TargetError::Checkout(msg))
                }
            }
            EngineError::CommitResolution(msg) => AllscanError::Target(TargetError::Commit(msg)),
            EngineError::LanguageMetadata(msg) => AllscanError::Target(TargetError::Remote(msg)),
            EngineError::ToolTimeout { secs, .. } => AllscanError::Tool(ToolError::Timeout { secs }),
            EngineError::ToolNotFound(tool) => AllscanError::Tool(ToolError::NotFound(tool)),
            EngineError::ToolFailed { tool, reason } => {
                AllscanError::Tool(ToolError::Failed(format!("{tool}: {reason}")))
            }
            EngineError::MissingEnv { tool, var } => AllscanError::Tool(ToolError::Failed(
                format!("{tool}: required environment variable {var} not set"),
            )),
            EngineError::Cancelled(tool) => {
                AllscanError::Tool(ToolError::Failed(format!("{tool}: cancelled")))
            }
            EngineError::Parse { tool, reason } => {
                AllscanError::Tool(ToolError::Parse(format!("{tool}: {reason}")))
            }
            EngineError::Sbom(msg) => AllscanError::Tool(ToolError::Failed(msg)),
            EngineError::Upload(msg) => AllscanError::Tool(ToolError::Upload(msg)),
            EngineError::Io { path, source } => AllscanError::Io(std::io::Error::new(
                source.kind(),
                format!("{path}: {source}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_spec_maps_to_config_error() {
        let err = EngineError::InvalidSpec(ConfigError::InvalidValue {
            field: "repositories.commit".to_owned(),
            reason: "bad".to_owned(),
        });
        let top: AllscanError = err.into();
        assert!(matches!(top, AllscanError::Config(_)));
    }

    #[test]
    fn ls_remote_failure_maps_to_remote_target_error() {
        let top: AllscanError = EngineError::git("ls-remote", "unreachable").into();
        assert!(matches!(top, AllscanError::Target(TargetError::Remote(_))));
    }

    #[test]
    fn clone_failure_maps_to_checkout_target_error() {
        let top: AllscanError = EngineError::git("clone", "not found").into();
        assert!(matches!(top, AllscanError::Target(TargetError::Checkout(_))));
    }

    #[test]
    fn timeout_keeps_seconds() {
        let err = EngineError::ToolTimeout {
            tool: "gosec".to_owned(),
            secs: 120,
        };
        assert_eq!(err.to_string(), "gosec timed out after 120s");
        let top: AllscanError = err.into();
        assert!(matches!(
            top,
            AllscanError::Tool(ToolError::Timeout { secs: 120 })
        ));
    }

    #[test]
    fn io_error_keeps_kind() {
        let err = EngineError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        match AllscanError::from(err) {
            AllscanError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
