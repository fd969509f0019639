//! Run summary: per-repository scanner lines, scorecard report, coverage
//! matrix and overall totals.
//!
//! [`RunSummary::build`] reads each result file through the parser registry;
//! the same structure is rendered as colored text or serialized as JSON.

use std::io::Write;

use allscan_core::config::ScannerConfig;
use allscan_core::types::{AnalysisCategory, FindingSummary};
use allscan_engine::coverage::{CoverageMatrix, CoverageState, RepoLevelScanner, share_label};
use allscan_engine::language::LanguageSource;
use allscan_engine::parser::scorecard::{ScoreBand, ScorecardReport};
use allscan_engine::parser::{ParserRegistry, ResultParser};
use allscan_engine::selector::SkippedScanner;
use allscan_engine::{RepoScanContext, RunReport, ScanResult, SkippedRepository};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use tracing::warn;

use crate::output::Render;

/// Icon for scanners without a registered parser.
const GENERIC_ICON: &str = "🔧";

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub repositories: Vec<RepoSummary>,
    pub skipped_repositories: Vec<SkippedRepository>,
    pub aborted: bool,
    pub totals: Totals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    pub scans: usize,
    pub successful: usize,
    pub failed: usize,
    pub duration_secs: f64,
    pub findings: FindingSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoSummary {
    pub url: String,
    pub commit_hash: String,
    pub branch_tag: String,
    pub language_source: LanguageSource,
    pub languages: Vec<LanguageShare>,
    pub scanners: Vec<ScannerLine>,
    pub skipped: Vec<SkippedScanner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scorecard: Option<ScorecardReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageMatrix>,
    pub repo_level: Vec<RepoLevelScanner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbom_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageShare {
    pub name: String,
    pub share: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerLine {
    pub name: String,
    #[serde(skip)]
    pub icon: &'static str,
    pub category: Option<AnalysisCategory>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    #[serde(flatten)]
    pub status: ScannerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScannerStatus {
    Findings { findings: FindingSummary },
    Failed { reason: String },
    NoParser,
    ParseError { reason: String },
}

impl RunSummary {
    pub async fn build(report: &RunReport, registry: &ParserRegistry) -> Self {
        let mut repositories = Vec::with_capacity(report.repositories.len());
        let mut findings = FindingSummary::default();
        for ctx in &report.repositories {
            let repo = RepoSummary::build(ctx, registry).await;
            for line in &repo.scanners {
                if let ScannerStatus::Findings { findings: f } = &line.status {
                    findings.merge(f);
                }
            }
            repositories.push(repo);
        }

        Self {
            run_id: report.run_id.clone(),
            repositories,
            skipped_repositories: report.skipped_repositories.clone(),
            aborted: report.aborted,
            totals: Totals {
                scans: report.total_scans(),
                successful: report.successful(),
                failed: report.failed(),
                duration_secs: report.total_duration().as_secs_f64(),
                findings,
            },
        }
    }
}

impl RepoSummary {
    async fn build(ctx: &RepoScanContext, registry: &ParserRegistry) -> Self {
        let shares = ctx.languages.percentages();
        let mut languages: Vec<LanguageShare> = ctx
            .languages
            .languages()
            .map(|name| LanguageShare {
                name: name.to_owned(),
                share: shares.as_ref().and_then(|s| s.get(name).copied()),
            })
            .collect();
        languages.sort_by(|a, b| {
            b.share
                .unwrap_or(0.0)
                .total_cmp(&a.share.unwrap_or(0.0))
                .then_with(|| a.name.cmp(&b.name))
        });

        let mut scanners = Vec::with_capacity(ctx.results.len());
        let mut scorecard = None;
        for result in &ctx.results {
            let config = ctx.scanners.iter().find(|s| s.name == result.scanner);
            let parser = config.and_then(|c| registry.parser_for(c));
            scanners.push(scanner_line(result, config, parser, registry).await);

            if parser == Some(ResultParser::Scorecard)
                && result.success
                && let Some(path) = &result.output_path
            {
                match ScorecardReport::load(path).await {
                    Ok(report) => scorecard = Some(report),
                    Err(e) => warn!(error = %e, "could not load scorecard report"),
                }
            }
        }

        Self {
            url: ctx.target.url.clone(),
            commit_hash: ctx.target.commit_hash.clone(),
            branch_tag: ctx.target.branch_tag.clone(),
            language_source: ctx.languages.source(),
            languages,
            scanners,
            skipped: ctx.skipped.clone(),
            scorecard,
            coverage: ctx.coverage(registry),
            repo_level: ctx.repo_level(registry),
            sbom_path: ctx.sbom_path.as_ref().map(|p| p.display().to_string()),
        }
    }
}

async fn scanner_line(
    result: &ScanResult,
    config: Option<&ScannerConfig>,
    parser: Option<ResultParser>,
    registry: &ParserRegistry,
) -> ScannerLine {
    let status = match (result.success, parser, &result.output_path) {
        (false, _, _) => ScannerStatus::Failed {
            reason: result
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_owned()),
        },
        (true, Some(parser), Some(path)) => match parser.parse_file(path).await {
            Ok(findings) => ScannerStatus::Findings { findings },
            Err(e) => ScannerStatus::ParseError {
                reason: e.to_string(),
            },
        },
        (true, _, _) => ScannerStatus::NoParser,
    };

    ScannerLine {
        name: result.scanner.clone(),
        icon: parser.map(ResultParser::icon).unwrap_or(GENERIC_ICON),
        category: config.and_then(|c| registry.category_for(c)),
        duration_ms: result.duration_ms,
        output_path: result.output_path.as_ref().map(|p| p.display().to_string()),
        status,
    }
}

// =============================================================================
// Text rendering
// =============================================================================

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", format!("Scan summary (run {})", self.run_id).bold())?;

        for repo in &self.repositories {
            writeln!(w)?;
            repo.render_text(w)?;
        }

        if !self.skipped_repositories.is_empty() {
            writeln!(w)?;
            writeln!(w, "{}", "Skipped repositories:".yellow().bold())?;
            for skipped in &self.skipped_repositories {
                writeln!(w, "  {} {}: {}", "✘".red(), skipped.url, skipped.reason)?;
            }
        }

        writeln!(w)?;
        writeln!(w, "{}", "Totals".bold())?;
        let failed = if self.totals.failed > 0 {
            self.totals.failed.to_string().red().bold()
        } else {
            self.totals.failed.to_string().green()
        };
        writeln!(
            w,
            "  Scans: {}  succeeded: {}  failed: {}  time: {:.1}s",
            self.totals.scans,
            self.totals.successful.to_string().green(),
            failed,
            self.totals.duration_secs
        )?;
        writeln!(w, "  Findings: {}", severity_line(&self.totals.findings))?;
        if self.aborted {
            writeln!(w, "  {}", "Run aborted before all scans completed".red().bold())?;
        }
        Ok(())
    }
}

impl Render for RepoSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(
            w,
            "{} {} @ {} ({})",
            "▶".cyan(),
            self.url.bold(),
            self.branch_tag,
            self.commit_hash.dimmed()
        )?;

        if self.languages.is_empty() {
            writeln!(w, "  Languages: {}", "none detected".dimmed())?;
        } else {
            let langs: Vec<String> = self
                .languages
                .iter()
                .map(|l| match l.share {
                    Some(pct) => format!("{} {}", l.name, share_label(pct)),
                    None => l.name.clone(),
                })
                .collect();
            writeln!(w, "  Languages ({}): {}", self.language_source, langs.join(", "))?;
        }

        let name_width = self.scanners.iter().map(|s| s.name.len()).max().unwrap_or(0);
        for line in &self.scanners {
            let category = line
                .category
                .map(|c| format!("[{c}]"))
                .unwrap_or_default();
            let status = match &line.status {
                ScannerStatus::Findings { findings } => severity_line(findings),
                ScannerStatus::Failed { reason } => format!("{} {reason}", "FAILED:".red().bold()),
                ScannerStatus::NoParser => "no parser available".dimmed().to_string(),
                ScannerStatus::ParseError { reason } => {
                    format!("{} {reason}", "parse error:".yellow())
                }
            };
            writeln!(
                w,
                "  {} {:<name_width$} {:<11} {status}",
                line.icon, line.name, category
            )?;
        }
        for skipped in &self.skipped {
            writeln!(
                w,
                "  {}",
                format!("- {} skipped ({})", skipped.name, skipped.reason).dimmed()
            )?;
        }

        if let Some(scorecard) = &self.scorecard {
            render_scorecard(scorecard, w)?;
        }
        if let Some(coverage) = &self.coverage {
            render_coverage(coverage, w)?;
        }
        if !self.repo_level.is_empty() {
            writeln!(w, "  {}", "Repository-level scanners".bold())?;
            for scanner in &self.repo_level {
                let state = if scanner.success {
                    "✔".green()
                } else {
                    "⚠".yellow()
                };
                writeln!(w, "    {state} {} [{}]", scanner.name, scanner.category)?;
            }
        }
        if let Some(path) = &self.sbom_path {
            writeln!(w, "  SBOM: {path}")?;
        }
        Ok(())
    }
}

fn render_scorecard(report: &ScorecardReport, w: &mut dyn Write) -> std::io::Result<()> {
    let band = ScoreBand::for_overall(report.score);
    writeln!(
        w,
        "  {} {:.1}/10 {} {}",
        "OpenSSF Scorecard".bold(),
        report.score,
        band.icon(),
        report.scorecard.version.dimmed()
    )?;
    let name_width = report.checks.iter().map(|c| c.name.len()).max().unwrap_or(0);
    for check in &report.checks {
        writeln!(
            w,
            "    {} {} {:<name_width$}  {}",
            ScoreBand::for_check(check.score).icon(),
            check.score_label(),
            check.name,
            check.short_reason().dimmed()
        )?;
    }
    Ok(())
}

fn render_coverage(matrix: &CoverageMatrix, w: &mut dyn Write) -> std::io::Result<()> {
    let labels: Vec<String> = matrix
        .rows
        .iter()
        .map(|row| match row.share_label() {
            Some(share) => format!("{} {share}", row.language),
            None => row.language.clone(),
        })
        .collect();
    let width = labels
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .max("Language".len());

    writeln!(w, "  {}", "Coverage".bold())?;
    let mut header = format!("    {:<width$}", "Language");
    for category in &matrix.categories {
        header.push_str(&format!("  {:^6}", category.to_string()));
    }
    writeln!(w, "{}", header.dimmed())?;

    for (row, label) in matrix.rows.iter().zip(&labels) {
        write!(w, "    {label:<width$}")?;
        for cell in &row.cells {
            write!(w, "  {}", colored_cell(*cell))?;
        }
        writeln!(w)?;
    }
    writeln!(
        w,
        "    {}",
        "✔ OK  ⚠ Failed  ◐ Conditional  ✘ None".dimmed()
    )?;
    Ok(())
}

fn colored_cell(state: CoverageState) -> ColoredString {
    let cell = format!("{:^6}", state.symbol());
    match state {
        CoverageState::Ok => cell.green(),
        CoverageState::Failed => cell.yellow(),
        CoverageState::Conditional => cell.cyan(),
        CoverageState::None => cell.red(),
    }
}

fn severity_line(s: &FindingSummary) -> String {
    if s.is_empty() {
        return "no findings".green().to_string();
    }
    format!(
        "{} {} {} {} {} (total {})",
        format!("C:{}", s.critical).red().bold(),
        format!("H:{}", s.high).red(),
        format!("M:{}", s.medium).yellow(),
        format!("L:{}", s.low).blue(),
        format!("I:{}", s.info).dimmed(),
        s.total
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::{Path, PathBuf};

    use allscan_engine::language::DetectedLanguageSet;
    use allscan_engine::target::ResolvedTarget;

    fn scanner(name: &str, languages: &[&str]) -> ScannerConfig {
        ScannerConfig {
            name: name.to_owned(),
            command: name.to_owned(),
            languages: languages.iter().map(|s| (*s).to_owned()).collect(),
            ..ScannerConfig::default()
        }
    }

    fn result(name: &str, success: bool, output: Option<PathBuf>, error: Option<&str>) -> ScanResult {
        ScanResult {
            scanner: name.to_owned(),
            repository: "https://github.com/acme/api".to_owned(),
            output_path: output,
            success,
            error: error.map(str::to_owned),
            duration_ms: 1500,
            upload_scan_type: String::new(),
        }
    }

    fn context(dir: &Path) -> RepoScanContext {
        let grype_out = dir.join("grype.json");
        std::fs::write(
            &grype_out,
            r#"{"matches":[{"vulnerability":{"severity":"Critical"}},{"vulnerability":{"severity":"Low"}}]}"#,
        )
        .unwrap();
        let scorecard_out = dir.join("scorecard.json");
        std::fs::write(
            &scorecard_out,
            r#"{"score":7.5,"scorecard":{"version":"v5.0.0"},"checks":[{"name":"Maintained","score":10,"reason":"active"}]}"#,
        )
        .unwrap();
        let custom_out = dir.join("custom.json");
        std::fs::write(&custom_out, "{}").unwrap();

        let weights = BTreeMap::from([("go".to_owned(), 300), ("python".to_owned(), 100)]);
        RepoScanContext {
            target: ResolvedTarget {
                url: "https://github.com/acme/api".to_owned(),
                repo_path: dir.to_path_buf(),
                commit_hash: "1a2b3c4".to_owned(),
                branch_tag: "v2.1.0".to_owned(),
                version: Some("v2.1.0".to_owned()),
            },
            languages: DetectedLanguageSet::new(LanguageSource::Remote, weights),
            scanners: vec![
                scanner("grype", &[]),
                scanner("gosec", &["go"]),
                scanner("scorecard", &[]),
                scanner("custom", &[]),
            ],
            skipped: Vec::new(),
            results: vec![
                result("grype", true, Some(grype_out), None),
                result("gosec", false, None, Some("exit code 2")),
                result("scorecard", true, Some(scorecard_out), None),
                result("custom", true, Some(custom_out), None),
            ],
            sbom_path: Some(dir.join("sboms/api.cdx.json")),
        }
    }

    fn report(dir: &Path) -> RunReport {
        RunReport {
            run_id: "run-1".to_owned(),
            repositories: vec![context(dir)],
            skipped_repositories: vec![SkippedRepository {
                url: "https://github.com/acme/gone".to_owned(),
                reason: "clone failed".to_owned(),
            }],
            aborted: false,
            upload: None,
        }
    }

    #[tokio::test]
    async fn builds_scanner_lines_and_totals() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::build(&report(dir.path()), &ParserRegistry::with_defaults()).await;
        let repo = &summary.repositories[0];

        assert_eq!(repo.languages[0].name, "go");
        assert_eq!(repo.scanners.len(), 4);
        assert!(matches!(
            repo.scanners[0].status,
            ScannerStatus::Findings { findings } if findings.critical == 1 && findings.low == 1
        ));
        assert_eq!(
            repo.scanners[1].status,
            ScannerStatus::Failed {
                reason: "exit code 2".to_owned()
            }
        );
        assert_eq!(repo.scanners[3].status, ScannerStatus::NoParser);
        assert_eq!(repo.scanners[3].icon, GENERIC_ICON);
        assert_eq!(repo.scorecard.as_ref().unwrap().scorecard.version, "v5.0.0");
        assert_eq!(repo.repo_level.len(), 1);

        let coverage = repo.coverage.as_ref().unwrap();
        assert_eq!(coverage.state("go", AnalysisCategory::Sast), Some(CoverageState::Failed));

        assert_eq!(summary.totals.scans, 4);
        assert_eq!(summary.totals.failed, 1);
        assert_eq!(summary.totals.findings.critical, 1);
        // scorecard 체크 1개 (info)
        assert_eq!(summary.totals.findings.total, 3);
    }

    #[tokio::test]
    async fn text_rendering_contains_every_section() {
        colored::control::set_override(false);
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::build(&report(dir.path()), &ParserRegistry::with_defaults()).await;

        let mut out = Vec::new();
        summary.render_text(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("https://github.com/acme/api @ v2.1.0 (1a2b3c4)"));
        assert!(text.contains("go (75%), python (25%)"));
        assert!(text.contains("FAILED: exit code 2"));
        assert!(text.contains("no parser available"));
        assert!(text.contains("C:1 H:0 M:0 L:1 I:0 (total 2)"));
        assert!(text.contains("OpenSSF Scorecard 7.5/10"));
        assert!(text.contains("Maintained"));
        assert!(text.contains("Coverage"));
        assert!(text.contains("go (75%)"));
        assert!(text.contains("Repository-level scanners"));
        assert!(text.contains("scorecard [Scorecard]"));
        assert!(text.contains("SBOM: "));
        assert!(text.contains("https://github.com/acme/gone: clone failed"));
        assert!(text.contains("Scans: 4"));
    }

    #[tokio::test]
    async fn json_uses_status_tags() {
        let dir = tempfile::tempdir().unwrap();
        let summary = RunSummary::build(&report(dir.path()), &ParserRegistry::with_defaults()).await;
        let json = serde_json::to_value(&summary).unwrap();

        let scanners = &json["repositories"][0]["scanners"];
        assert_eq!(scanners[0]["status"], "findings");
        assert_eq!(scanners[0]["findings"]["critical"], 1);
        assert_eq!(scanners[1]["status"], "failed");
        assert_eq!(scanners[3]["status"], "no_parser");
        assert!(scanners[0].get("icon").is_none());
        assert_eq!(json["totals"]["failed"], 1);
        assert_eq!(json["skipped_repositories"][0]["reason"], "clone failed");
    }
}
