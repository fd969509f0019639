//! `allscan local` command handler

use std::sync::Arc;

use allscan_core::config::AllscanConfig;
use allscan_engine::{CliGitClient, Orchestrator, ProcessRunner};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::LocalArgs;
use crate::commands::{check_environment, render_report, run_status};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `local` command.
///
/// Scans a directory in place: no clone, `args_local` when defined, no upload.
pub async fn execute(
    args: LocalArgs,
    config: AllscanConfig,
    yes: bool,
    writer: &OutputWriter,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let is_dir = tokio::fs::metadata(&args.path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false);
    if !is_dir {
        return Err(CliError::Command(format!(
            "not a directory: {}",
            args.path.display()
        )));
    }

    check_environment(&config, true, yes)?;

    let config = Arc::new(config);
    let git = Arc::new(CliGitClient::new(config.general.network_timeout()));
    let orchestrator = Orchestrator::new(config, git, Arc::new(ProcessRunner), cancel);
    orchestrator.prepare().await?;

    info!(path = %args.path.display(), "starting local scan");
    let report = orchestrator.run_local(&args.path).await;

    render_report(&report, orchestrator.registry(), writer).await?;
    run_status(&report)
}
