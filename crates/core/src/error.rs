//! 에러 타입 -- 도메인별 에러 정의
//!
//! 분류는 실행 흐름을 따릅니다.
//! - 설정 에러: 해당 저장소 항목만 건너뜁니다
//! - 대상 해석/클론 에러: 해당 저장소만 실패합니다
//! - 도구 실행 에러: 실패한 결과로 기록되며 fail-fast가 아니면 계속 진행합니다

/// Allscan 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum AllscanError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 대상 해석 및 체크아웃 에러
    #[error("target error: {0}")]
    Target(#[from] TargetError),

    /// 외부 도구 실행 에러
    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 대상 해석 및 체크아웃 에러
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// 원격 저장소 조회 실패
    #[error("remote unreachable: {0}")]
    Remote(String),

    /// 클론 또는 fetch 실패
    #[error("checkout failed: {0}")]
    Checkout(String),

    /// 커밋 해시를 읽을 수 없음
    #[error("commit resolution failed: {0}")]
    Commit(String),
}

/// 외부 도구 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// 제한 시간 초과
    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    /// 실행 파일 없음
    #[error("binary not found: {0}")]
    NotFound(String),

    /// 실행 실패
    #[error("execution failed: {0}")]
    Failed(String),

    /// 결과 파싱 실패
    #[error("parse failed: {0}")]
    Parse(String),

    /// 결과 업로드 실패
    #[error("upload failed: {0}")]
    Upload(String),
}
