//! 작업 사본 캐시 -- 브랜치 대상의 재사용 여부 판단과 체크아웃
//!
//! 브랜치 대상만 캐시합니다. 기존 사본의 `origin` URL이 명세의 URL과
//! 같으면(`.git` 접미사 무시) 얕은 fetch + hard reset으로 갱신하고,
//! 그렇지 않거나 fetch가 실패하면 디렉토리를 지우고 새로 클론합니다.
//!
//! 태그와 커밋 대상은 항상 새로 체크아웃합니다.
//! 커밋은 얕은 브랜치 클론으로 가져올 수 없으므로 빈 저장소에 원격을 추가하고
//! 해당 커밋 하나만 fetch합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use allscan_core::config::{RefSelector, RepositorySpec};
use allscan_core::metrics::{LABEL_RESULT, REPO_CACHE_TOTAL};
use metrics::counter;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::git::GitClient;
use crate::target::refs::RefResolver;
use crate::target::{ResolvedTarget, normalize_url, repo_slug};

/// 브랜치 작업 사본 캐시
pub struct RepoCache<G: GitClient> {
    git: Arc<G>,
    workspace: PathBuf,
}

impl<G: GitClient> RepoCache<G> {
    pub fn new(git: Arc<G>, workspace: impl Into<PathBuf>) -> Self {
        Self {
            git,
            workspace: workspace.into(),
        }
    }

    /// 저장소의 작업 사본 경로 (`<workspace>/<owner>/<name>`)
    pub fn repo_path(&self, url: &str) -> PathBuf {
        self.workspace.join(repo_slug(url))
    }

    /// 명세를 체크아웃하고 실제 커밋 해시를 읽습니다.
    pub async fn checkout(&self, spec: &RepositorySpec) -> Result<ResolvedTarget, EngineError> {
        let resolver = RefResolver::new(Arc::clone(&self.git));
        let selector = resolver.resolve(spec)?;
        let path = self.repo_path(&spec.url);

        let (commit_hash, version) = match &selector {
            RefSelector::Tag(tag) => {
                let commit = self.checkout_tag(&spec.url, tag, &path).await?;
                if let Some((tag, declared)) = spec.declared_tag_commit() {
                    resolver.verify_tag_commit(&path, tag, declared).await;
                }
                (commit, Some(tag.clone()))
            }
            RefSelector::Commit(commit) => {
                (self.checkout_commit(&spec.url, commit, &path).await?, None)
            }
            RefSelector::Branch(branch) => {
                (self.checkout_branch(&spec.url, branch, &path).await?, None)
            }
        };

        Ok(ResolvedTarget {
            url: spec.url.clone(),
            repo_path: path,
            commit_hash,
            branch_tag: selector.label().to_owned(),
            version,
        })
    }

    /// 기존 사본이 같은 원격을 가리키는지 확인합니다.
    pub async fn is_reusable(&self, path: &Path, url: &str) -> bool {
        let is_dir = tokio::fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return false;
        }

        match self.git.remote_url(path).await {
            Ok(actual) => normalize_url(&actual) == normalize_url(url),
            Err(_) => false,
        }
    }

    async fn checkout_tag(&self, url: &str, tag: &str, path: &Path) -> Result<String, EngineError> {
        remove_existing(path).await;
        info!(repo = %url, tag = %tag, "cloning tag");
        self.git.clone_shallow(url, tag, path).await?;
        self.head(path).await
    }

    async fn checkout_commit(
        &self,
        url: &str,
        commit: &str,
        path: &Path,
    ) -> Result<String, EngineError> {
        remove_existing(path).await;
        info!(repo = %url, commit = %commit, "fetching commit");
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| EngineError::io(path, e))?;
        self.git.init(path).await?;
        self.git.add_remote(path, url).await?;
        self.git.fetch_commit(path, commit).await?;
        self.git.checkout(path, "FETCH_HEAD").await?;
        self.head(path).await
    }

    async fn checkout_branch(
        &self,
        url: &str,
        branch: &str,
        path: &Path,
    ) -> Result<String, EngineError> {
        if self.is_reusable(path, url).await {
            info!(repo = %url, branch = %branch, "updating cached working copy");
            match self.git.fetch_branch(path, branch).await {
                Ok(()) => {
                    self.git
                        .reset_hard(path, &format!("origin/{branch}"))
                        .await?;
                    counter!(REPO_CACHE_TOTAL, LABEL_RESULT => "reused").increment(1);
                    return self.head(path).await;
                }
                Err(e) => warn!(repo = %url, error = %e, "fetch failed, re-cloning"),
            }
        }

        remove_existing(path).await;
        info!(repo = %url, branch = %branch, "cloning branch");
        self.git.clone_shallow(url, branch, path).await?;
        counter!(REPO_CACHE_TOTAL, LABEL_RESULT => "recloned").increment(1);
        self.head(path).await
    }

    async fn head(&self, path: &Path) -> Result<String, EngineError> {
        let hash = self
            .git
            .rev_parse_short(path)
            .await
            .map_err(|e| EngineError::CommitResolution(e.to_string()))?;
        if hash.is_empty() {
            return Err(EngineError::CommitResolution(format!(
                "empty HEAD in {}",
                path.display()
            )));
        }
        Ok(hash)
    }
}

async fn remove_existing(path: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(path).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!(path = %path.display(), error = %e, "could not remove old working copy");
    }
}
