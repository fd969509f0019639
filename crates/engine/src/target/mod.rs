//! 대상 해석 -- 저장소 명세를 재현 가능한 체크아웃으로 변환
//!
//! - [`refs`]: 원격 태그 탐색, 참조 우선순위, 태그/커밋 일치 검사
//! - [`cache`]: 브랜치 작업 사본 재사용 여부 판단과 체크아웃

pub mod cache;
pub mod refs;

use std::path::PathBuf;

use serde::Serialize;

pub use cache::RepoCache;
pub use refs::{LatestTag, RefResolver, TagConsistency};

/// 로컬 모드 URL 접두사
pub const LOCAL_SCHEME: &str = "local://";

/// 체크아웃이 끝난 대상
///
/// 실행마다 저장소당 한 번 생성되며, SBOM 키와 결과/업로드 라벨에 사용됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTarget {
    /// 저장소 URL (로컬 모드는 `local://<path>`)
    pub url: String,
    /// 작업 사본 경로
    pub repo_path: PathBuf,
    /// 실제 체크아웃에서 읽은 짧은 커밋 해시
    pub commit_hash: String,
    /// 표시용 라벨 (태그, 커밋 또는 브랜치 이름)
    pub branch_tag: String,
    /// 태그로 체크아웃한 경우의 태그 이름
    pub version: Option<String>,
}

impl ResolvedTarget {
    /// 로컬 디렉토리 대상
    pub fn local(path: PathBuf, commit_hash: Option<String>) -> Self {
        Self {
            url: format!("{LOCAL_SCHEME}{}", path.display()),
            repo_path: path,
            commit_hash: commit_hash.unwrap_or_else(|| "unknown".to_owned()),
            branch_tag: "local".to_owned(),
            version: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.url.starts_with(LOCAL_SCHEME)
    }

    /// 결과 파일과 SBOM 이름에 쓰는 저장소 이름
    pub fn name(&self) -> String {
        if self.is_local() {
            self.repo_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "local".to_owned())
        } else {
            repo_name(&self.url)
        }
    }

    /// 결과 파일 이름 접두사 (`owner_name`)
    ///
    /// 이름이 같은 다른 소유자의 저장소와 결과 파일이 겹치지 않습니다.
    pub fn result_stem(&self) -> String {
        if self.is_local() {
            self.name()
        } else {
            repo_slug(&self.url).replace('/', "_")
        }
    }
}

/// URL에서 마지막 경로 요소를 `.git` 없이 추출합니다.
///
/// `https://github.com/owner/app.git` → `app`
pub fn repo_name(url: &str) -> String {
    let segments = path_segments(url);
    segments
        .last()
        .map(|s| (*s).to_owned())
        .unwrap_or_else(|| "unknown".to_owned())
}

/// URL에서 `owner/name`을 추출합니다. 소유자가 없으면 이름만 반환합니다.
///
/// `git@github.com:owner/app.git` → `owner/app`
pub fn repo_slug(url: &str) -> String {
    let segments = path_segments(url);
    match segments.as_slice() {
        [.., owner, name] => format!("{owner}/{name}"),
        [name] => (*name).to_owned(),
        [] => "unknown".to_owned(),
    }
}

/// 끝의 `.git`과 `/`를 제거한 URL
pub fn normalize_url(url: &str) -> &str {
    let url = url.trim().trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url)
}

fn path_segments(url: &str) -> Vec<&str> {
    let url = normalize_url(url);
    let path = match url.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        // scp 형식: git@host:owner/repo
        None => url.split_once(':').map(|(_, p)| p).unwrap_or(url),
    };
    path.split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .collect()
}
