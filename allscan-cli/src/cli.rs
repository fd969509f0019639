//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Allscan -- multi-repository security scan orchestrator.
///
/// Use `allscan <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "allscan", version, about, long_about = None)]
pub struct Cli {
    /// Path to the scanner catalog (scanners.toml).
    #[arg(short, long, global = true, default_value = "scanners.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Continue without asking when required environment variables are missing.
    #[arg(short, long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone and scan the configured repositories.
    Scan(TargetArgs),

    /// Scan a local directory without cloning.
    Local(LocalArgs),

    /// Show what a scan would do without executing anything.
    Plan(TargetArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- scan / plan ----

/// Repository selection shared by `scan` and `plan`.
#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Repository list file (repositories.toml).
    #[arg(short, long, default_value = "repositories.toml")]
    pub repos: PathBuf,

    /// Scan a single repository URL at its latest tag instead of the list.
    #[arg(long, conflicts_with = "repos")]
    pub repo: Option<String>,
}

// ---- local ----

#[derive(Args, Debug)]
pub struct LocalArgs {
    /// Directory to scan (default: current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

// ---- config ----

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, scanners, repositories).
        #[arg(long)]
        section: Option<String>,
    },
}
