//! 참조 해석 -- 원격 태그 탐색과 태그/커밋 일치 검사
//!
//! # 태그 목록 형식
//!
//! `git ls-remote --tags --sort=-v:refname`은 최신 태그부터 한 줄씩 출력합니다.
//!
//! ```text
//! 1111111111111111111111111111111111111111	refs/tags/v2.0.0
//! 2222222222222222222222222222222222222222	refs/tags/v2.0.0^{}
//! 3333333333333333333333333333333333333333	refs/tags/v1.9.0
//! ```
//!
//! annotated 태그는 첫 줄의 해시가 태그 객체이고, `^{}` 줄의 해시가 실제 커밋입니다.
//! lightweight 태그는 `^{}` 줄이 없고 자기 해시가 곧 커밋입니다.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use allscan_core::config::{DEFAULT_BRANCH, RefSelector, RepositorySpec};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::git::GitClient;

const TAG_PREFIX: &str = "refs/tags/";
const DEREF_SUFFIX: &str = "^{}";

/// 짧은 커밋 해시 길이
pub const SHORT_HASH_LEN: usize = 7;

/// 원격에서 찾은 최신 태그
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestTag {
    /// 태그 이름 (`refs/tags/` 제외)
    pub name: String,
    /// 태그가 가리키는 커밋의 전체 해시
    pub commit: String,
}

impl LatestTag {
    pub fn short_commit(&self) -> &str {
        short_hash(&self.commit)
    }
}

/// 태그 목록에서 최신 태그와 그 커밋을 찾습니다.
///
/// 입력은 최신순으로 정렬되어 있다고 가정합니다. 한 번 순회하며 `^{}` 해시를
/// 태그 이름별로 기록하고, 처음 나온 일반 태그 줄을 최신 태그로 선택합니다.
/// 태그 줄이 하나도 없으면 `None`을 반환합니다.
pub fn parse_ls_remote(output: &str) -> Option<LatestTag> {
    let mut selected: Option<(&str, &str)> = None;
    let mut derefs: HashMap<&str, &str> = HashMap::new();

    for line in output.lines() {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(reference), None) = (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };

        let Some(name) = reference.strip_prefix(TAG_PREFIX) else {
            continue;
        };

        if let Some(base) = name.strip_suffix(DEREF_SUFFIX) {
            derefs.insert(base, hash);
            continue;
        }

        if selected.is_none() && !name.is_empty() {
            selected = Some((name, hash));
        }
    }

    let (name, own_hash) = selected?;
    let commit = derefs.get(name).copied().unwrap_or(own_hash);
    Some(LatestTag {
        name: name.to_owned(),
        commit: commit.to_owned(),
    })
}

/// 태그 목록으로부터 단일 저장소 명세를 만듭니다.
///
/// 태그가 있으면 `version` + 짧은 `commit`, 없으면 `branch = "main"`입니다.
pub fn spec_from_ls_remote(url: &str, output: &str) -> RepositorySpec {
    match parse_ls_remote(output) {
        Some(tag) => {
            info!(repo = %url, tag = %tag.name, commit = %tag.short_commit(), "resolved latest tag");
            RepositorySpec::new(url)
                .with_version(tag.name.clone())
                .with_commit(tag.short_commit())
        }
        None => {
            info!(repo = %url, branch = DEFAULT_BRANCH, "no tags found, using default branch");
            RepositorySpec::new(url).with_branch(DEFAULT_BRANCH)
        }
    }
}

/// 해시 앞 7자리. 더 짧으면 그대로 반환합니다.
pub fn short_hash(hash: &str) -> &str {
    match hash.char_indices().nth(SHORT_HASH_LEN) {
        Some((idx, _)) => &hash[..idx],
        None => hash,
    }
}

/// 짧은/전체 해시를 허용하여 두 해시가 같은 커밋을 가리키는지 확인합니다.
pub fn hashes_agree(a: &str, b: &str) -> bool {
    let a = a.trim().to_ascii_lowercase();
    let b = b.trim().to_ascii_lowercase();
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.starts_with(&b) || b.starts_with(&a)
}

/// 태그/커밋 일치 검사 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagConsistency {
    /// 태그가 선언된 커밋을 가리킴
    Consistent,
    /// 태그가 다른 커밋을 가리킴. 스캔은 태그의 실제 커밋으로 진행합니다.
    Mismatch { tag_commit: String },
    /// 로컬에서 태그를 확인할 수 없음
    Unverifiable,
}

/// 참조 해석기
///
/// 명시적 명세는 우선순위 규칙으로, 명세가 없는 단일 저장소 모드는
/// 원격 태그 탐색으로 해석합니다.
pub struct RefResolver<G: GitClient> {
    git: Arc<G>,
}

impl<G: GitClient> RefResolver<G> {
    pub fn new(git: Arc<G>) -> Self {
        Self { git }
    }

    /// 명세를 검증하고 우선순위 규칙(`version` > `commit` > `branch`)으로 선택자를 결정합니다.
    pub fn resolve(&self, spec: &RepositorySpec) -> Result<RefSelector, EngineError> {
        spec.validate()?;
        Ok(spec.selector())
    }

    /// 원격 태그를 조회해 최신 태그 명세를 만듭니다.
    ///
    /// 조회 실패는 치명적이지 않으며 기본 브랜치로 대체합니다.
    pub async fn discover(&self, url: &str) -> RepositorySpec {
        match self.git.ls_remote_tags(url).await {
            Ok(output) => spec_from_ls_remote(url, &output),
            Err(e) => {
                warn!(repo = %url, error = %e, "could not list tags, using default branch");
                RepositorySpec::new(url).with_branch(DEFAULT_BRANCH)
            }
        }
    }

    /// 체크아웃 후 태그가 선언된 커밋을 가리키는지 확인합니다.
    ///
    /// 불일치는 경고만 남깁니다.
    pub async fn verify_tag_commit(
        &self,
        repo_path: &Path,
        tag: &str,
        declared_commit: &str,
    ) -> TagConsistency {
        let tag_commit = match self.git.rev_list_tag(repo_path, tag).await {
            Ok(c) if !c.is_empty() => c,
            Ok(_) | Err(_) => return TagConsistency::Unverifiable,
        };

        if hashes_agree(&tag_commit, declared_commit) {
            TagConsistency::Consistent
        } else {
            warn!(
                tag = %tag,
                tag_commit = %tag_commit,
                expected = %declared_commit,
                "tag points to a different commit than declared, scanning the tag's commit"
            );
            TagConsistency::Mismatch { tag_commit }
        }
    }
}
