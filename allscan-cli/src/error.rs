//! CLI-specific error types and exit code mapping

use allscan_core::error::AllscanError;
use allscan_engine::EngineError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The run finished but some scans failed or repositories were skipped.
    #[error("scan failures: {0}")]
    ScanFailures(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from allscan-core.
    #[error("{0}")]
    Core(#[from] AllscanError),

    /// Wrapped engine error.
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command error          |
    /// | 2    | Configuration error              |
    /// | 4    | Scan failures present            |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(AllscanError::Config(_)) => 2,
            Self::Engine(EngineError::InvalidSpec(_)) => 2,
            Self::ScanFailures(_) => 4,
            Self::Io(_) | Self::Core(AllscanError::Io(_)) | Self::Engine(EngineError::Io { .. }) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) | Self::Engine(_) => 1,
        }
    }
}
