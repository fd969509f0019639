//! External tool execution.
//!
//! [`CommandRunner`] abstracts spawning a tool binary under a timeout so the
//! SBOM cache and the [`ToolExecutor`] can be tested without real scanners.
//! The executor owns the per-scanner rules:
//!
//! - required environment variables are checked before anything runs
//! - argument templates expand `{{output}}`, `{{repo}}` and `{{sbom}}`
//! - a zero exit is a success; a non-zero exit is a success only when the
//!   expected output file exists (many tools exit non-zero to signal findings)
//! - a timeout, a missing binary or a cancellation is always a failure
//!
//! Every outcome becomes a [`ScanResult`]; nothing here aborts the run.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use allscan_core::config::ScannerConfig;
use allscan_core::metrics::{LABEL_RESULT, LABEL_SCANNER, SCAN_DURATION_SECONDS, SCANS_TOTAL};
use metrics::{counter, histogram};
use serde::Serialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::parser::binary;

/// Placeholder replaced by the absolute output file path.
pub const OUTPUT_PLACEHOLDER: &str = "{{output}}";
/// Placeholder replaced by the repository URL.
pub const REPO_PLACEHOLDER: &str = "{{repo}}";
/// Placeholder replaced by the absolute SBOM path.
pub const SBOM_PLACEHOLDER: &str = "{{sbom}}";

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Duration,
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// stdout followed by stderr.
    pub output: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last non-empty line of the combined output, for error messages.
    pub fn tail(&self) -> String {
        String::from_utf8_lossy(&self.output)
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_owned()
    }
}

/// Trait abstracting process execution.
///
/// Implementations must kill the child when the timeout expires and report it
/// as [`EngineError::ToolTimeout`]. A binary that cannot be found is
/// [`EngineError::ToolNotFound`].
pub trait CommandRunner: Send + Sync + 'static {
    fn run(
        &self,
        spec: &CommandSpec,
    ) -> impl Future<Output = Result<CommandOutput, EngineError>> + Send;
}

/// Production [`CommandRunner`] built on `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, EngineError> {
        debug!(program = %spec.program, args = ?spec.args, cwd = %spec.cwd.display(), "spawning tool");

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .current_dir(&spec.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => EngineError::ToolNotFound(spec.program.clone()),
                _ => EngineError::ToolFailed {
                    tool: spec.program.clone(),
                    reason: format!("failed to spawn: {e}"),
                },
            })?;

        // Dropping the future on timeout kills the child.
        let output = tokio::time::timeout(spec.timeout, child.wait_with_output())
            .await
            .map_err(|_| EngineError::ToolTimeout {
                tool: spec.program.clone(),
                secs: spec.timeout.as_secs(),
            })?
            .map_err(|e| EngineError::ToolFailed {
                tool: spec.program.clone(),
                reason: e.to_string(),
            })?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        Ok(CommandOutput {
            code: output.status.code(),
            output: combined,
        })
    }
}

/// Outcome of one scanner against one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanResult {
    pub scanner: String,
    pub repository: String,
    /// Expected output file (absent when the scanner never got that far).
    pub output_path: Option<PathBuf>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
    /// Scan type label for the upload service (empty = not uploaded).
    pub upload_scan_type: String,
}

impl ScanResult {
    fn new(scanner: &ScannerConfig, repository: &str) -> Self {
        Self {
            scanner: scanner.name.clone(),
            repository: repository.to_owned(),
            output_path: None,
            success: false,
            error: None,
            duration_ms: 0,
            upload_scan_type: scanner.upload_scan_type.clone(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

/// Values substituted into argument templates.
#[derive(Debug, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub output: &'a Path,
    pub repo_url: &'a str,
    pub sbom: Option<&'a Path>,
}

/// Expands placeholders in every argument.
///
/// Fails when a template references `{{sbom}}` but no SBOM is available.
pub fn expand_args(templates: &[String], vars: &TemplateVars<'_>) -> Result<Vec<String>, String> {
    let output = vars.output.to_string_lossy();
    let sbom = vars.sbom.map(|p| p.to_string_lossy());
    templates
        .iter()
        .map(|arg| {
            let mut arg = arg
                .replace(OUTPUT_PLACEHOLDER, &output)
                .replace(REPO_PLACEHOLDER, vars.repo_url);
            if arg.contains(SBOM_PLACEHOLDER) {
                match &sbom {
                    Some(path) => arg = arg.replace(SBOM_PLACEHOLDER, path),
                    None => return Err("argument references {{sbom}} but no SBOM is available".to_owned()),
                }
            }
            Ok(arg)
        })
        .collect()
}

/// Repository-side inputs for one scanner run.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext<'a> {
    /// Output file name prefix, see [`ResolvedTarget::result_stem`](crate::target::ResolvedTarget::result_stem).
    pub result_stem: &'a str,
    /// Repository URL (`local://...` in local mode).
    pub repo_url: &'a str,
    /// Working copy the tool runs in.
    pub repo_path: &'a Path,
    pub sbom: Option<&'a Path>,
    /// Selects `args_local` when defined.
    pub local: bool,
}

/// Runs configured scanners and turns every outcome into a [`ScanResult`].
pub struct ToolExecutor<C: CommandRunner> {
    runner: Arc<C>,
    results_dir: PathBuf,
    cancel: CancellationToken,
}

impl<C: CommandRunner> ToolExecutor<C> {
    pub fn new(runner: Arc<C>, results_dir: impl AsRef<Path>, cancel: CancellationToken) -> Self {
        let dir = results_dir.as_ref();
        Self {
            runner,
            results_dir: std::path::absolute(dir).unwrap_or_else(|_| dir.to_path_buf()),
            cancel,
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// `{results_dir}/{owner}_{repo}_{scanner}_{YYYYmmdd-HHMMSS}.json`
    pub fn output_path(&self, result_stem: &str, scanner: &str) -> PathBuf {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        self.results_dir
            .join(format!("{result_stem}_{scanner}_{stamp}.json"))
    }

    pub async fn execute(&self, scanner: &ScannerConfig, ctx: &ToolContext<'_>) -> ScanResult {
        let start = Instant::now();
        let mut result = ScanResult::new(scanner, ctx.repo_url);

        let outcome = self.try_execute(scanner, ctx, &mut result).await;
        result.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                result.success = true;
                info!(scanner = %scanner.name, duration_ms = result.duration_ms, "scanner completed");
            }
            Err(e) => {
                warn!(scanner = %scanner.name, error = %e, "scanner failed");
                result.error = Some(e.to_string());
            }
        }

        let label = if result.success { "success" } else { "failure" };
        counter!(SCANS_TOTAL, LABEL_SCANNER => scanner.name.clone(), LABEL_RESULT => label)
            .increment(1);
        histogram!(SCAN_DURATION_SECONDS, LABEL_SCANNER => scanner.name.clone())
            .record(result.duration().as_secs_f64());
        result
    }

    async fn try_execute(
        &self,
        scanner: &ScannerConfig,
        ctx: &ToolContext<'_>,
        result: &mut ScanResult,
    ) -> Result<(), EngineError> {
        if let Some(var) = scanner.first_missing_env() {
            return Err(EngineError::MissingEnv {
                tool: scanner.name.clone(),
                var: var.to_owned(),
            });
        }
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled(scanner.name.clone()));
        }

        tokio::fs::create_dir_all(&self.results_dir)
            .await
            .map_err(|e| EngineError::io(&self.results_dir, e))?;
        let output_path = self.output_path(ctx.result_stem, &scanner.name);
        result.output_path = Some(output_path.clone());

        info!(scanner = %scanner.name, "running scanner");

        if let Some(builtin) = scanner.builtin_name() {
            return self.run_builtin(builtin, scanner, ctx.repo_path, &output_path).await;
        }

        let args = expand_args(
            scanner.args_for(ctx.local),
            &TemplateVars {
                output: &output_path,
                repo_url: ctx.repo_url,
                sbom: ctx.sbom,
            },
        )
        .map_err(|reason| EngineError::ToolFailed {
            tool: scanner.name.clone(),
            reason,
        })?;

        let spec = CommandSpec {
            program: scanner.command.clone(),
            args,
            cwd: ctx.repo_path.to_path_buf(),
            timeout: scanner.timeout(),
        };

        let output = tokio::select! {
            out = self.runner.run(&spec) => out?,
            () = self.cancel.cancelled() => {
                return Err(EngineError::Cancelled(scanner.name.clone()));
            }
        };

        if output.success() {
            return Ok(());
        }
        if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            info!(scanner = %scanner.name, code = ?output.code, "non-zero exit with output, treating as findings");
            return Ok(());
        }
        let tail = output.tail();
        Err(EngineError::ToolFailed {
            tool: scanner.name.clone(),
            reason: match output.code {
                Some(code) if tail.is_empty() => format!("exit status {code}"),
                Some(code) => format!("exit status {code}: {tail}"),
                None => "terminated by signal".to_owned(),
            },
        })
    }

    async fn run_builtin(
        &self,
        builtin: &str,
        scanner: &ScannerConfig,
        repo_path: &Path,
        output_path: &Path,
    ) -> Result<(), EngineError> {
        match builtin {
            binary::BUILTIN_NAME => {
                let root = repo_path.to_path_buf();
                let out = output_path.to_path_buf();
                let count = tokio::task::spawn_blocking(move || binary::run_binary_detector(&root, &out))
                    .await
                    .map_err(|e| EngineError::ToolFailed {
                        tool: scanner.name.clone(),
                        reason: e.to_string(),
                    })??;
                info!(scanner = %scanner.name, binaries = count, "built-in binary detector finished");
                Ok(())
            }
            other => Err(EngineError::ToolFailed {
                tool: scanner.name.clone(),
                reason: format!("unknown built-in '{other}'"),
            }),
        }
    }
}

// =============================================================================
// Mock runner for tests
// =============================================================================

#[cfg(test)]
type Handler = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, EngineError> + Send + Sync>;

/// Test double: dispatches by program name, records every invocation.
#[cfg(test)]
pub struct MockCommandRunner {
    handlers: std::collections::HashMap<String, Handler>,
    calls: std::sync::Mutex<Vec<CommandSpec>>,
}

#[cfg(test)]
impl MockCommandRunner {
    pub fn new() -> Self {
        Self {
            handlers: std::collections::HashMap::new(),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_handler<F>(mut self, program: &str, handler: F) -> Self
    where
        F: Fn(&CommandSpec) -> Result<CommandOutput, EngineError> + Send + Sync + 'static,
    {
        self.handlers.insert(program.to_owned(), Box::new(handler));
        self
    }

    /// Exits with `code` without writing anything.
    pub fn with_exit(self, program: &str, code: i32) -> Self {
        self.with_handler(program, move |_| {
            Ok(CommandOutput {
                code: Some(code),
                output: Vec::new(),
            })
        })
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl CommandRunner for MockCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, EngineError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(spec.clone());
        }
        match self.handlers.get(&spec.program) {
            Some(handler) => handler(spec),
            None => Err(EngineError::ToolNotFound(spec.program.clone())),
        }
    }
}

/// Writes `content` to the path that follows `flag` in the argument list.
#[cfg(test)]
pub fn write_arg_after(spec: &CommandSpec, flag: &str, content: &[u8]) {
    if let Some(pos) = spec.args.iter().position(|a| a == flag)
        && let Some(path) = spec.args.get(pos + 1)
    {
        std::fs::write(path, content).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn scanner(name: &str, args: &[&str]) -> ScannerConfig {
        ScannerConfig {
            name: name.to_owned(),
            command: name.to_owned(),
            args: args.iter().map(|s| (*s).to_owned()).collect(),
            upload_scan_type: "Tool Scan".to_owned(),
            ..ScannerConfig::default()
        }
    }

    fn ctx<'a>(repo: &'a Path, sbom: Option<&'a Path>) -> ToolContext<'a> {
        ToolContext {
            result_stem: "acme_demo",
            repo_url: "https://github.com/acme/demo",
            repo_path: repo,
            sbom,
            local: false,
        }
    }

    fn executor(runner: MockCommandRunner, results: &Path) -> ToolExecutor<MockCommandRunner> {
        ToolExecutor::new(Arc::new(runner), results, CancellationToken::new())
    }

    #[test]
    fn expands_all_placeholders() {
        let templates = vec![
            "--out={{output}}".to_owned(),
            "{{repo}}".to_owned(),
            "sbom:{{sbom}}".to_owned(),
        ];
        let args = expand_args(
            &templates,
            &TemplateVars {
                output: Path::new("/r/out.json"),
                repo_url: "https://x/y",
                sbom: Some(Path::new("/r/sboms/y.cdx.json")),
            },
        )
        .unwrap();
        assert_eq!(args, vec!["--out=/r/out.json", "https://x/y", "sbom:/r/sboms/y.cdx.json"]);
    }

    #[test]
    fn sbom_placeholder_without_sbom_is_error() {
        let templates = vec!["sbom:{{sbom}}".to_owned()];
        let vars = TemplateVars {
            output: Path::new("/o"),
            repo_url: "u",
            sbom: None,
        };
        assert!(expand_args(&templates, &vars).is_err());
    }

    #[test]
    fn output_tail_skips_blank_lines() {
        let out = CommandOutput {
            code: Some(1),
            output: b"first\nlast line\n\n".to_vec(),
        };
        assert_eq!(out.tail(), "last line");
    }

    #[tokio::test]
    async fn zero_exit_is_success() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new().with_exit("gosec", 0);
        let exec = executor(runner, results.path());

        let r = exec
            .execute(&scanner("gosec", &["-fmt=json", "-out={{output}}", "./..."]), &ctx(repo.path(), None))
            .await;
        assert!(r.success, "{:?}", r.error);
        assert_eq!(r.upload_scan_type, "Tool Scan");
        let out = r.output_path.unwrap();
        assert!(out.starts_with(exec.results_dir()));
        let name = out.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("acme_demo_gosec_") && name.ends_with(".json"));
    }

    #[tokio::test]
    async fn non_zero_exit_with_output_file_is_success() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new().with_handler("gitleaks", |spec| {
            write_arg_after(spec, "--report-path", b"[]");
            Ok(CommandOutput {
                code: Some(1),
                output: Vec::new(),
            })
        });
        let exec = executor(runner, results.path());

        let r = exec
            .execute(&scanner("gitleaks", &["detect", "--report-path", "{{output}}"]), &ctx(repo.path(), None))
            .await;
        assert!(r.success);
    }

    #[tokio::test]
    async fn non_zero_exit_without_output_is_failure() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new().with_handler("grype", |_| {
            Ok(CommandOutput {
                code: Some(2),
                output: b"db update failed\n".to_vec(),
            })
        });
        let exec = executor(runner, results.path());

        let r = exec.execute(&scanner("grype", &["dir:."]), &ctx(repo.path(), None)).await;
        assert!(!r.success);
        let err = r.error.unwrap();
        assert!(err.contains("exit status 2"));
        assert!(err.contains("db update failed"));
    }

    #[tokio::test]
    async fn timeout_is_failure_even_with_output() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new().with_handler("slow", |spec| {
            write_arg_after(spec, "-o", b"{}");
            Err(EngineError::ToolTimeout {
                tool: spec.program.clone(),
                secs: spec.timeout.as_secs(),
            })
        });
        let exec = executor(runner, results.path());

        let r = exec.execute(&scanner("slow", &["-o", "{{output}}"]), &ctx(repo.path(), None)).await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_binary_is_failure() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let exec = executor(MockCommandRunner::new(), results.path());
        let r = exec.execute(&scanner("trivy", &[]), &ctx(repo.path(), None)).await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn missing_sbom_fails_only_that_scanner() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new().with_exit("grype", 0);
        let exec = executor(runner, results.path());

        let r = exec
            .execute(&scanner("grype", &["sbom:{{sbom}}"]), &ctx(repo.path(), None))
            .await;
        assert!(!r.success);
        assert!(r.error.unwrap().contains("{{sbom}}"));
    }

    #[tokio::test]
    async fn local_mode_prefers_local_args() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockCommandRunner::new().with_exit("gitleaks", 0));
        let exec = ToolExecutor::new(Arc::clone(&runner), results.path(), CancellationToken::new());

        let mut s = scanner("gitleaks", &["detect"]);
        s.args_local = vec!["detect".to_owned(), "--no-git".to_owned()];
        let mut c = ctx(repo.path(), None);
        c.local = true;
        let r = exec.execute(&s, &c).await;
        assert!(r.success);
        assert_eq!(runner.calls()[0].args, vec!["detect", "--no-git"]);
        assert_eq!(runner.calls()[0].cwd, repo.path());
    }

    #[tokio::test]
    async fn cancelled_executor_runs_nothing() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockCommandRunner::new().with_exit("gosec", 0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let exec = ToolExecutor::new(Arc::clone(&runner), results.path(), cancel);

        let r = exec.execute(&scanner("gosec", &[]), &ctx(repo.path(), None)).await;
        assert!(!r.success);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn builtin_binary_detector_writes_report() {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("tool.exe"), b"MZ").unwrap();
        let results = tempfile::tempdir().unwrap();
        let exec = executor(MockCommandRunner::new(), results.path());

        let mut s = scanner("binary-detector", &[]);
        s.command = "builtin:binary-detector".to_owned();
        let r = exec.execute(&s, &ctx(repo.path(), None)).await;
        assert!(r.success, "{:?}", r.error);
        let report = std::fs::read_to_string(r.output_path.unwrap()).unwrap();
        assert!(report.contains("tool.exe"));
    }

    #[tokio::test]
    async fn unknown_builtin_is_failure() {
        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let exec = executor(MockCommandRunner::new(), results.path());
        let mut s = scanner("magic", &[]);
        s.command = "builtin:magic".to_owned();
        let r = exec.execute(&s, &ctx(repo.path(), None)).await;
        assert!(!r.success);
    }

    #[tokio::test]
    #[serial]
    async fn missing_required_env_fails_before_running() {
        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe { std::env::remove_var("ALLSCAN_TEST_SCORECARD_TOKEN") };

        let repo = tempfile::tempdir().unwrap();
        let results = tempfile::tempdir().unwrap();
        let runner = Arc::new(MockCommandRunner::new().with_exit("scorecard", 0));
        let exec = ToolExecutor::new(Arc::clone(&runner), results.path(), CancellationToken::new());

        let mut s = scanner("scorecard", &[]);
        s.required_env = vec!["ALLSCAN_TEST_SCORECARD_TOKEN".to_owned()];
        let r = exec.execute(&s, &ctx(repo.path(), None)).await;
        assert!(!r.success);
        assert_eq!(
            r.error.as_deref(),
            Some("required environment variable ALLSCAN_TEST_SCORECARD_TOKEN not set")
        );
        assert!(r.output_path.is_none());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn process_runner_reports_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec {
            program: "allscan-definitely-not-a-binary".to_owned(),
            args: Vec::new(),
            cwd: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
        };
        let err = ProcessRunner.run(&spec).await.unwrap_err();
        assert!(matches!(err, EngineError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn process_runner_kills_tool_on_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec {
            program: "sleep".to_owned(),
            args: vec!["5".to_owned()],
            cwd: dir.path().to_path_buf(),
            timeout: Duration::from_millis(100),
        };
        let started = Instant::now();
        let err = ProcessRunner.run(&spec).await.unwrap_err();
        assert!(
            matches!(&err, EngineError::ToolTimeout { tool, .. } if tool == "sleep"),
            "unexpected error: {err:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
