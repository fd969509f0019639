//! `allscan scan` command handler

use std::sync::Arc;

use allscan_core::config::{AllscanConfig, RepositorySpec};
use allscan_engine::{CliGitClient, Orchestrator, ProcessRunner, RefResolver};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::TargetArgs;
use crate::commands::{check_environment, load_repositories, render_report, render_upload, run_status};
use crate::error::CliError;
use crate::output::OutputWriter;

/// Execute the `scan` command.
///
/// With `--repo` the latest remote tag is discovered and scanned; otherwise
/// every repository in the catalog and `--repos` list is scanned in order.
pub async fn execute(
    args: TargetArgs,
    config: AllscanConfig,
    yes: bool,
    writer: &OutputWriter,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let config = Arc::new(config);
    let git = Arc::new(CliGitClient::new(config.general.network_timeout()));

    let specs = match &args.repo {
        Some(url) => vec![discover(&git, url).await],
        None => load_repositories(&args.repos, &config).await?,
    };

    check_environment(&config, false, yes)?;

    let orchestrator = Orchestrator::new(Arc::clone(&config), git, Arc::new(ProcessRunner), cancel);
    orchestrator.prepare().await?;

    info!(repositories = specs.len(), "starting scan");
    let mut report = orchestrator.run(&specs).await;

    render_report(&report, orchestrator.registry(), writer).await?;
    orchestrator.upload(&mut report).await;
    render_upload(&report, writer)?;

    run_status(&report)
}

async fn discover(git: &Arc<CliGitClient>, url: &str) -> RepositorySpec {
    let spec = RefResolver::new(Arc::clone(git)).discover(url).await;
    info!(repo = %spec.url, selector = %spec.selector(), "discovered target");
    spec
}
