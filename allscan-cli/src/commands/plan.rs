//! `allscan plan` command handler
//!
//! Dry run: prints what `scan` would do. Nothing is cloned or executed.

use std::io::Write;
use std::path::Path;

use allscan_core::config::{AllscanConfig, RefSelector, RepositorySpec};
use allscan_core::types::AnalysisCategory;
use allscan_engine::ParserRegistry;
use allscan_engine::sbom::{SBOM_DIR, SBOM_TOOL};
use colored::Colorize;
use serde::Serialize;

use crate::cli::TargetArgs;
use crate::commands::load_repositories;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `plan` command.
pub async fn execute(
    args: TargetArgs,
    config_path: &Path,
    config: AllscanConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let repositories = match &args.repo {
        Some(url) => vec![PlannedRepository {
            url: url.clone(),
            selector: None,
            scanners: Vec::new(),
        }],
        None => load_repositories(&args.repos, &config)
            .await?
            .iter()
            .map(PlannedRepository::from_spec)
            .collect(),
    };

    let report = PlanReport::new(config_path, &config, &ParserRegistry::with_defaults(), repositories);
    writer.render(&report)
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub config_source: String,
    pub general: PlannedGeneral,
    pub scanners: Vec<PlannedScanner>,
    pub disabled_scanners: Vec<String>,
    pub sbom: PlannedSbom,
    pub repositories: Vec<PlannedRepository>,
}

#[derive(Debug, Serialize)]
pub struct PlannedGeneral {
    pub workspace: String,
    pub results_dir: String,
    pub fail_fast: bool,
    pub results_max_age_days: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_endpoint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlannedScanner {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub category: Option<AnalysisCategory>,
    /// Empty for scanners that apply to every repository.
    pub languages: Vec<String>,
    pub languages_conditional: Vec<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct PlannedSbom {
    pub tool: &'static str,
    pub directory: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct PlannedRepository {
    pub url: String,
    /// `None` when the latest tag is discovered at scan time.
    pub selector: Option<RefSelector>,
    /// Allow-list; empty means every applicable scanner.
    pub scanners: Vec<String>,
}

impl PlannedRepository {
    fn from_spec(spec: &RepositorySpec) -> Self {
        Self {
            url: spec.url.clone(),
            selector: Some(spec.selector()),
            scanners: spec.scanners.clone(),
        }
    }
}

impl PlanReport {
    pub fn new(
        config_path: &Path,
        config: &AllscanConfig,
        registry: &ParserRegistry,
        repositories: Vec<PlannedRepository>,
    ) -> Self {
        let general = &config.general;
        Self {
            config_source: config_path.display().to_string(),
            general: PlannedGeneral {
                workspace: general.workspace.clone(),
                results_dir: general.results_dir.clone(),
                fail_fast: general.fail_fast,
                results_max_age_days: general.results_max_age_days,
                upload_endpoint: config
                    .upload_configured()
                    .then(|| general.upload_endpoint.clone()),
            },
            scanners: config
                .enabled_scanners()
                .map(|s| PlannedScanner {
                    name: s.name.clone(),
                    command: s.command.clone(),
                    args: s.args.clone(),
                    category: registry.category_for(s),
                    languages: s.languages.clone(),
                    languages_conditional: s.languages_conditional.clone(),
                    timeout_secs: s.timeout_secs,
                })
                .collect(),
            disabled_scanners: config
                .scanners
                .iter()
                .filter(|s| !s.enabled)
                .map(|s| s.name.clone())
                .collect(),
            sbom: PlannedSbom {
                tool: SBOM_TOOL,
                directory: Path::new(&general.results_dir)
                    .join(SBOM_DIR)
                    .display()
                    .to_string(),
                timeout_secs: general.sbom_timeout_secs,
            },
            repositories,
        }
    }
}

impl Render for PlanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{} {}", "Plan for".bold(), self.config_source)?;
        writeln!(w)?;
        writeln!(w, "{}", "Settings".bold())?;
        writeln!(w, "  workspace:   {}", self.general.workspace)?;
        writeln!(w, "  results:     {}", self.general.results_dir)?;
        writeln!(w, "  fail fast:   {}", self.general.fail_fast)?;
        writeln!(
            w,
            "  cleanup:     results older than {} days",
            self.general.results_max_age_days
        )?;
        match &self.general.upload_endpoint {
            Some(endpoint) => writeln!(w, "  upload:      {endpoint}")?,
            None => writeln!(w, "  upload:      {}", "disabled".dimmed())?,
        }

        writeln!(w)?;
        writeln!(w, "{}", format!("Scanners ({})", self.scanners.len()).bold())?;
        for scanner in &self.scanners {
            let category = scanner
                .category
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            writeln!(w, "  {}{category}", scanner.name.green())?;
            writeln!(w, "    command: {} {}", scanner.command, scanner.args.join(" "))?;
            if scanner.languages.is_empty() && scanner.languages_conditional.is_empty() {
                writeln!(w, "    languages: all")?;
            } else {
                writeln!(w, "    languages: {}", scanner.languages.join(", "))?;
                if !scanner.languages_conditional.is_empty() {
                    writeln!(
                        w,
                        "    conditional: {}",
                        scanner.languages_conditional.join(", ")
                    )?;
                }
            }
            writeln!(w, "    timeout: {}s", scanner.timeout_secs)?;
        }
        if !self.disabled_scanners.is_empty() {
            writeln!(
                w,
                "  {}",
                format!("disabled: {}", self.disabled_scanners.join(", ")).dimmed()
            )?;
        }

        writeln!(w)?;
        writeln!(w, "{}", "SBOM".bold())?;
        writeln!(
            w,
            "  {} -> {} (timeout {}s)",
            self.sbom.tool, self.sbom.directory, self.sbom.timeout_secs
        )?;

        writeln!(w)?;
        writeln!(
            w,
            "{}",
            format!("Repositories ({})", self.repositories.len()).bold()
        )?;
        for repo in &self.repositories {
            let selector = repo
                .selector
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "latest tag".to_owned());
            let scanners = if repo.scanners.is_empty() {
                "all applicable scanners".to_owned()
            } else {
                repo.scanners.join(", ")
            };
            writeln!(w, "  {} ({selector}): {scanners}", repo.url)?;
        }
        Ok(())
    }
}
