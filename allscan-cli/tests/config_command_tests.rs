//! Integration tests for `allscan config`, `allscan plan` and `allscan local`.
//!
//! Exercise the command reports against real TOML files.

use std::fs;
use std::path::Path;

use allscan_cli::cli::{ConfigAction, ConfigArgs, LocalArgs, OutputFormat};
use allscan_cli::commands;
use allscan_cli::commands::config::{ConfigReport, ConfigValidationReport};
use allscan_cli::commands::plan::{PlanReport, PlannedRepository};
use allscan_cli::output::OutputWriter;
use allscan_core::config::AllscanConfig;
use allscan_engine::ParserRegistry;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const CATALOG: &str = r#"
[general]
log_level = "info"
log_format = "json"

[[scanners]]
name = "grype"
command = "grype"
args = ["sbom:{{sbom}}", "-o", "json", "--file", "{{output}}"]

[[scanners]]
name = "gitleaks"
command = "gitleaks"
args = ["detect", "--report-path", "{{output}}"]
args_local = ["detect", "--no-git", "--report-path", "{{output}}"]

[[scanners]]
name = "semgrep"
command = "semgrep"
enabled = false

[[repositories]]
url = "https://github.com/acme/api"
version = "v1.4.0"
"#;

fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("should write file");
    path
}

#[tokio::test]
async fn test_config_validate_valid_catalog() {
    // Given: A valid catalog
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(&dir, "scanners.toml", CATALOG);

    // When: Loading and validating
    let loaded = AllscanConfig::load(&path).await;
    let report = ConfigValidationReport::new(&path, &loaded);

    // Then: Valid with two enabled scanners
    assert!(report.valid, "errors: {:?}", report.errors);
    assert_eq!(report.scanners, Some(2));
}

#[tokio::test]
async fn test_config_validate_duplicate_scanner() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(
        &dir,
        "scanners.toml",
        r#"
[[scanners]]
name = "grype"
command = "grype"

[[scanners]]
name = "grype"
command = "grype"
"#,
    );

    let loaded = AllscanConfig::load(&path).await;
    let report = ConfigValidationReport::new(&path, &loaded);

    assert!(!report.valid);
    assert!(report.errors[0].contains("duplicate scanner name"));
}

#[tokio::test]
async fn test_config_validate_command_exit_code() {
    // Given: A missing config file
    let dir = TempDir::new().expect("should create temp dir");
    let path = dir.path().join("missing.toml");
    let loaded = AllscanConfig::load(&path).await;

    // When: Running `config validate`
    let writer = OutputWriter::new(OutputFormat::Json);
    let err = commands::config::execute(
        ConfigArgs {
            action: ConfigAction::Validate,
        },
        &path,
        loaded,
        &writer,
    )
    .expect_err("missing file should be invalid");

    // Then: Config exit code
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_config_show_round_trips_effective_config() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(&dir, "scanners.toml", CATALOG);
    let config = AllscanConfig::load(&path).await.expect("should load");

    let report = ConfigReport::new(&path, &config, None).expect("full config should render");
    let reparsed = AllscanConfig::parse(&report.config_toml).expect("shown TOML should parse");

    assert_eq!(reparsed.scanners.len(), 3);
    assert_eq!(reparsed.repositories, config.repositories);
    assert_eq!(reparsed.general.log_format, "json");
}

#[tokio::test]
async fn test_plan_uses_catalog_and_list_file() {
    let dir = TempDir::new().expect("should create temp dir");
    let path = write(&dir, "scanners.toml", CATALOG);
    let repos = write(
        &dir,
        "repositories.toml",
        r#"
[[repositories]]
url = "https://github.com/acme/web"
branch = "develop"
scanners = ["gitleaks"]
"#,
    );
    let config = AllscanConfig::load(&path).await.expect("should load");

    let specs = commands::load_repositories(&repos, &config)
        .await
        .expect("should load repositories");
    let planned: Vec<PlannedRepository> = specs
        .iter()
        .map(|s| PlannedRepository {
            url: s.url.clone(),
            selector: Some(s.selector()),
            scanners: s.scanners.clone(),
        })
        .collect();
    let report = PlanReport::new(&path, &config, &ParserRegistry::with_defaults(), planned);

    let json = serde_json::to_value(&report).expect("should serialize");
    assert_eq!(json["repositories"][0]["selector"]["kind"], "tag");
    assert_eq!(json["repositories"][1]["selector"]["value"], "develop");
    assert_eq!(json["repositories"][1]["scanners"][0], "gitleaks");
    assert_eq!(json["disabled_scanners"][0], "semgrep");
    assert_eq!(json["scanners"][0]["category"], "SCA");
}

#[cfg(unix)]
#[tokio::test]
async fn test_local_scan_runs_in_place() {
    // Given: A scanner that writes an empty JSON report via the shell
    let dir = TempDir::new().expect("should create temp dir");
    let target = dir.path().join("project");
    fs::create_dir_all(&target).expect("should create target");
    fs::write(target.join("main.py"), "print('hi')\n").expect("should write source");

    let results = dir.path().join("results");
    let catalog = format!(
        r#"
[general]
workspace = "{workspace}"
results_dir = "{results}"
sbom_timeout_secs = 5

[[scanners]]
name = "touch-report"
command = "sh"
args = ["-c", "exit 1"]
args_local = ["-c", "echo '{{}}' > \"$0\"", "{{{{output}}}}"]
"#,
        workspace = dir.path().join("ws").display(),
        results = results.display(),
    );
    let path = write(&dir, "scanners.toml", &catalog);
    let config = AllscanConfig::load(&path).await.expect("should load");

    // When: Running `allscan local`
    let writer = OutputWriter::new(OutputFormat::Json);
    let outcome = commands::local::execute(
        LocalArgs {
            path: target.clone(),
        },
        config,
        true,
        &writer,
        CancellationToken::new(),
    )
    .await;

    // Then: args_local was used and the report exists
    assert!(outcome.is_ok(), "local scan failed: {outcome:?}");
    let reports: Vec<_> = fs::read_dir(&results)
        .expect("results dir should exist")
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "json"))
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(Path::new(&reports[0].path()).is_file());
}

#[tokio::test]
async fn test_local_scan_rejects_missing_directory() {
    let writer = OutputWriter::new(OutputFormat::Json);
    let err = commands::local::execute(
        LocalArgs {
            path: "/nonexistent/allscan/project".into(),
        },
        AllscanConfig::default(),
        true,
        &writer,
        CancellationToken::new(),
    )
    .await
    .expect_err("missing path should fail");
    assert!(err.to_string().contains("not a directory"));
}
