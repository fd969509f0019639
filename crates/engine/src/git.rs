//! Git command abstraction for testability.
//!
//! The [`GitClient`] trait abstracts every git invocation the engine needs,
//! allowing production code to use [`CliGitClient`] while tests use `MockGitClient`.
//!
//! # Architecture
//!
//! ```text
//!   RefResolver     RepoCache
//!        │              │
//!        └──────┬───────┘
//!               ▼
//!         ┌───────────┐
//!         │ GitClient │ (trait)
//!         └───────────┘
//!            │     │
//!            ▼     ▼
//!       ┌─────┐ ┌──────┐
//!       │ CLI │ │ Mock │
//!       └──┬──┘ └──────┘
//!          ▼
//!       git binary
//! ```
//!
//! # Argument Safety
//!
//! Refs and URLs are passed as separate argv entries, never through a shell.
//! Refs starting with `-` are rejected so they cannot be parsed as options.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::EngineError;

/// Trait abstracting git operations.
///
/// All methods return trimmed stdout on success. A non-zero exit status is
/// reported as [`EngineError::Git`] carrying the sub-command and stderr.
pub trait GitClient: Send + Sync + 'static {
    /// Lists remote tags sorted newest-first (`git ls-remote --tags --sort=-v:refname`).
    fn ls_remote_tags(&self, url: &str) -> impl Future<Output = Result<String, EngineError>> + Send;

    /// Returns the `origin` remote URL of a working copy.
    fn remote_url(&self, repo: &Path) -> impl Future<Output = Result<String, EngineError>> + Send;

    /// Shallow-clones a single branch or tag into `dest`.
    fn clone_shallow(
        &self,
        url: &str,
        reference: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Shallow-fetches one branch from `origin`.
    fn fetch_branch(
        &self,
        repo: &Path,
        branch: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Hard-resets the working copy to `target`.
    fn reset_hard(
        &self,
        repo: &Path,
        target: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Initializes an empty repository.
    fn init(&self, repo: &Path) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Adds `url` as the `origin` remote.
    fn add_remote(
        &self,
        repo: &Path,
        url: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Shallow-fetches a single commit from `origin`.
    fn fetch_commit(
        &self,
        repo: &Path,
        commit: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Checks out `reference` (detached).
    fn checkout(
        &self,
        repo: &Path,
        reference: &str,
    ) -> impl Future<Output = Result<(), EngineError>> + Send;

    /// Returns the short hash of `HEAD`.
    fn rev_parse_short(
        &self,
        repo: &Path,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;

    /// Returns the abbreviated commit a local tag points to, dereferencing annotated tags.
    fn rev_list_tag(
        &self,
        repo: &Path,
        tag: &str,
    ) -> impl Future<Output = Result<String, EngineError>> + Send;
}

/// Production [`GitClient`] that shells out to the `git` binary.
///
/// Remote tag listing is bounded by the configured network timeout.
/// Clone and fetch run unbounded since their duration scales with repository size.
#[derive(Debug, Clone)]
pub struct CliGitClient {
    network_timeout: Duration,
}

impl CliGitClient {
    pub fn new(network_timeout: Duration) -> Self {
        Self { network_timeout }
    }

    async fn git(
        &self,
        cwd: Option<&Path>,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, EngineError> {
        let sub = args.first().copied().unwrap_or("git");
        debug!(args = ?args, "running git");

        let mut cmd = Command::new("git");
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| EngineError::git(sub, format!("failed to run git: {e}")))?;

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    EngineError::git(sub, format!("timed out after {}s", limit.as_secs()))
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| EngineError::git(sub, e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::git(sub, stderr.trim().to_owned()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }
}

fn reject_option_like(reference: &str) -> Result<(), EngineError> {
    if reference.is_empty() || reference.starts_with('-') {
        return Err(EngineError::git(
            "ref",
            format!("invalid ref '{reference}'"),
        ));
    }
    Ok(())
}

impl GitClient for CliGitClient {
    async fn ls_remote_tags(&self, url: &str) -> Result<String, EngineError> {
        reject_option_like(url)?;
        self.git(
            None,
            &["ls-remote", "--tags", "--sort=-v:refname", url],
            Some(self.network_timeout),
        )
        .await
    }

    async fn remote_url(&self, repo: &Path) -> Result<String, EngineError> {
        self.git(Some(repo), &["remote", "get-url", "origin"], None)
            .await
    }

    async fn clone_shallow(&self, url: &str, reference: &str, dest: &Path) -> Result<(), EngineError> {
        reject_option_like(url)?;
        reject_option_like(reference)?;
        let dest = dest.to_string_lossy();
        self.git(
            None,
            &["clone", "--depth=1", "--branch", reference, url, dest.as_ref()],
            None,
        )
        .await
        .map(|_| ())
    }

    async fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<(), EngineError> {
        reject_option_like(branch)?;
        self.git(Some(repo), &["fetch", "origin", branch, "--depth=1"], None)
            .await
            .map(|_| ())
    }

    async fn reset_hard(&self, repo: &Path, target: &str) -> Result<(), EngineError> {
        reject_option_like(target)?;
        self.git(Some(repo), &["reset", "--hard", target], None)
            .await
            .map(|_| ())
    }

    async fn init(&self, repo: &Path) -> Result<(), EngineError> {
        self.git(Some(repo), &["init"], None).await.map(|_| ())
    }

    async fn add_remote(&self, repo: &Path, url: &str) -> Result<(), EngineError> {
        reject_option_like(url)?;
        self.git(Some(repo), &["remote", "add", "origin", url], None)
            .await
            .map(|_| ())
    }

    async fn fetch_commit(&self, repo: &Path, commit: &str) -> Result<(), EngineError> {
        reject_option_like(commit)?;
        self.git(Some(repo), &["fetch", "--depth=1", "origin", commit], None)
            .await
            .map(|_| ())
    }

    async fn checkout(&self, repo: &Path, reference: &str) -> Result<(), EngineError> {
        reject_option_like(reference)?;
        self.git(Some(repo), &["checkout", reference], None)
            .await
            .map(|_| ())
    }

    async fn rev_parse_short(&self, repo: &Path) -> Result<String, EngineError> {
        self.git(Some(repo), &["rev-parse", "--short", "HEAD"], None)
            .await
    }

    async fn rev_list_tag(&self, repo: &Path, tag: &str) -> Result<String, EngineError> {
        reject_option_like(tag)?;
        let spec = format!("tags/{tag}");
        self.git(
            Some(repo),
            &["rev-list", "-n", "1", "--abbrev-commit", spec.as_str()],
            None,
        )
        .await
    }
}

/// 테스트용 Mock git 클라이언트
///
/// 실제 git 없이 호출 순서를 기록하고 설정된 응답을 반환합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockGitClient {
    /// ls_remote_tags 응답 (None이면 실패)
    pub ls_remote: Option<String>,
    /// remote_url 응답 (None이면 실패)
    pub origin: Option<String>,
    /// fetch_branch 실패 시뮬레이션
    pub fail_fetch: bool,
    /// clone_shallow 실패 시뮬레이션
    pub fail_clone: bool,
    /// rev_parse_short 응답
    pub head: String,
    /// rev_list_tag 응답 (None이면 실패)
    pub tag_commit: Option<String>,
    /// 호출 기록
    pub calls: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockGitClient {
    /// HEAD가 `abc1234`인 mock 클라이언트를 생성합니다.
    pub fn new() -> Self {
        Self {
            head: "abc1234".to_owned(),
            ..Default::default()
        }
    }

    pub fn with_ls_remote(mut self, output: &str) -> Self {
        self.ls_remote = Some(output.to_owned());
        self
    }

    pub fn with_origin(mut self, url: &str) -> Self {
        self.origin = Some(url.to_owned());
        self
    }

    pub fn with_head(mut self, head: &str) -> Self {
        self.head = head.to_owned();
        self
    }

    pub fn with_tag_commit(mut self, commit: &str) -> Self {
        self.tag_commit = Some(commit.to_owned());
        self
    }

    pub fn with_failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn with_failing_clone(mut self) -> Self {
        self.fail_clone = true;
        self
    }

    /// 기록된 호출 목록을 반환합니다.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[cfg(test)]
impl GitClient for MockGitClient {
    async fn ls_remote_tags(&self, url: &str) -> Result<String, EngineError> {
        self.record(format!("ls-remote {url}"));
        self.ls_remote
            .clone()
            .ok_or_else(|| EngineError::git("ls-remote", "mock failure"))
    }

    async fn remote_url(&self, _repo: &Path) -> Result<String, EngineError> {
        self.record("remote get-url".to_owned());
        self.origin
            .clone()
            .ok_or_else(|| EngineError::git("remote", "no origin"))
    }

    async fn clone_shallow(&self, url: &str, reference: &str, _dest: &Path) -> Result<(), EngineError> {
        self.record(format!("clone {reference} {url}"));
        if self.fail_clone {
            return Err(EngineError::git("clone", "mock failure"));
        }
        Ok(())
    }

    async fn fetch_branch(&self, _repo: &Path, branch: &str) -> Result<(), EngineError> {
        self.record(format!("fetch {branch}"));
        if self.fail_fetch {
            return Err(EngineError::git("fetch", "mock failure"));
        }
        Ok(())
    }

    async fn reset_hard(&self, _repo: &Path, target: &str) -> Result<(), EngineError> {
        self.record(format!("reset {target}"));
        Ok(())
    }

    async fn init(&self, _repo: &Path) -> Result<(), EngineError> {
        self.record("init".to_owned());
        Ok(())
    }

    async fn add_remote(&self, _repo: &Path, url: &str) -> Result<(), EngineError> {
        self.record(format!("remote add {url}"));
        Ok(())
    }

    async fn fetch_commit(&self, _repo: &Path, commit: &str) -> Result<(), EngineError> {
        self.record(format!("fetch-commit {commit}"));
        Ok(())
    }

    async fn checkout(&self, _repo: &Path, reference: &str) -> Result<(), EngineError> {
        self.record(format!("checkout {reference}"));
        Ok(())
    }

    async fn rev_parse_short(&self, _repo: &Path) -> Result<String, EngineError> {
        self.record("rev-parse".to_owned());
        Ok(self.head.clone())
    }

    async fn rev_list_tag(&self, _repo: &Path, tag: &str) -> Result<String, EngineError> {
        self.record(format!("rev-list {tag}"));
        self.tag_commit
            .clone()
            .ok_or_else(|| EngineError::git("rev-list", "unknown tag"))
    }
}
