//! Command handlers -- one module per subcommand

pub mod config;
pub mod local;
pub mod plan;
pub mod scan;

use std::io::Write;
use std::path::Path;

use allscan_core::config::{AllscanConfig, RepositoryList, RepositorySpec};
use allscan_core::error::{AllscanError, ConfigError};
use allscan_engine::{ParserRegistry, RunReport};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::env_check;
use crate::error::CliError;
use crate::output::OutputWriter;
use crate::summary::RunSummary;

/// Dispatches the parsed command. `loaded` is the result of loading `--config`.
pub async fn dispatch(
    cli: Cli,
    loaded: Result<AllscanConfig, AllscanError>,
    writer: &OutputWriter,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    match cli.command {
        Commands::Config(args) => config::execute(args, &cli.config, loaded, writer),
        Commands::Plan(args) => plan::execute(args, &cli.config, loaded?, writer).await,
        Commands::Scan(args) => scan::execute(args, loaded?, cli.yes, writer, cancel).await,
        Commands::Local(args) => local::execute(args, loaded?, cli.yes, writer, cancel).await,
    }
}

/// Repositories from the catalog's `[[repositories]]` followed by the list file.
///
/// A missing list file is fine when the catalog already names repositories.
pub async fn load_repositories(
    repos: &Path,
    config: &AllscanConfig,
) -> Result<Vec<RepositorySpec>, CliError> {
    let mut specs = config.repositories.clone();
    match RepositoryList::load(repos).await {
        Ok(list) => specs.extend(list.repositories),
        Err(AllscanError::Config(ConfigError::FileNotFound { .. })) if !specs.is_empty() => {}
        Err(e) => return Err(e.into()),
    }
    if specs.is_empty() {
        return Err(CliError::Config(format!(
            "no repositories defined in {}",
            repos.display()
        )));
    }
    Ok(specs)
}

/// Checks required environment variables and asks before continuing.
pub fn check_environment(config: &AllscanConfig, local: bool, yes: bool) -> Result<(), CliError> {
    let missing = env_check::missing_env(config, local);
    if missing.is_empty() {
        return Ok(());
    }
    for entry in &missing {
        warn!(owner = %entry.owner, var = %entry.var, "required environment variable not set");
    }
    if yes {
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut err = std::io::stderr();
    if env_check::confirm_continue(&missing, &mut input, &mut err)? {
        Ok(())
    } else {
        Err(CliError::Command(
            "aborted: required environment variables are missing".to_owned(),
        ))
    }
}

/// Builds and renders the run summary.
pub async fn render_report(
    report: &RunReport,
    registry: &ParserRegistry,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let summary = RunSummary::build(report, registry).await;
    writer.render(&summary)?;
    Ok(())
}

/// Prints upload counts (text output only).
pub fn render_upload(report: &RunReport, writer: &OutputWriter) -> Result<(), CliError> {
    if writer.format() != OutputFormat::Text {
        return Ok(());
    }
    if let Some(stats) = &report.upload {
        let mut out = std::io::stdout().lock();
        writeln!(
            out,
            "Upload: {} uploaded, {} failed, {} skipped",
            stats.uploaded, stats.failed, stats.skipped
        )?;
    }
    Ok(())
}

/// Final status of a finished run.
pub fn run_status(report: &RunReport) -> Result<(), CliError> {
    if report.has_failures() {
        return Err(CliError::ScanFailures(format!(
            "{} of {} scans failed, {} repositories skipped",
            report.failed(),
            report.total_scans(),
            report.skipped_repositories.len()
        )));
    }
    if report.aborted {
        return Err(CliError::Command("run cancelled".to_owned()));
    }
    Ok(())
}
