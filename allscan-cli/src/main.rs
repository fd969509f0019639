use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use allscan_cli::cli::Cli;
use allscan_cli::commands;
use allscan_cli::logging::init_tracing;
use allscan_cli::output::OutputWriter;
use allscan_core::config::AllscanConfig;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // `config validate` reports load errors itself, so logging falls back to defaults.
    let loaded = AllscanConfig::load(&cli.config).await;
    let mut general = loaded
        .as_ref()
        .map(|c| c.general.clone())
        .unwrap_or_default();
    if let Some(level) = &cli.log_level {
        general.log_level = level.clone();
    }
    if let Err(e) = init_tracing(&general) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    tracing::info!(config = %cli.config.display(), "allscan starting");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current scanner");
            on_signal.cancel();
        }
    });

    let writer = OutputWriter::new(cli.output);
    match commands::dispatch(cli, loaded, &writer, cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
