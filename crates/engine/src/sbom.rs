//! SBOM 캐시 -- 해석된 대상별 CycloneDX 매니페스트 재사용
//!
//! 캐시 키는 저장소 이름 + (버전 태그) + 커밋 해시입니다. 저장 파일명에는
//! 생성 날짜가 붙지만 조회 키에는 포함되지 않으므로, 같은 커밋에 대한 반복
//! 실행은 날짜와 무관하게 기존 산출물을 재사용합니다.
//!
//! ```text
//! {repo}_{tag}_{commit}_{YYYY-MM-DD}.cdx.json   # 버전 태그
//! {repo}_{commit}_{YYYY-MM-DD}.cdx.json         # 그 외
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use allscan_core::metrics::{LABEL_RESULT, SBOM_CACHE_TOTAL};
use metrics::counter;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::runner::{CommandRunner, CommandSpec};
use crate::target::ResolvedTarget;

/// SBOM 디렉토리 이름 (결과 디렉토리 아래)
pub const SBOM_DIR: &str = "sboms";
/// SBOM 파일 확장자
pub const SBOM_SUFFIX: &str = ".cdx.json";
/// SBOM 생성 도구
pub const SBOM_TOOL: &str = "syft";

/// `v?숫자.숫자`로 시작하는 라벨인지 여부
///
/// `v1.2.3`, `2.0`, `v10.4-rc1`은 버전 태그이고 `main`, `v1`, `abc1234`는 아닙니다.
pub fn is_version_tag(label: &str) -> bool {
    let rest = label.strip_prefix('v').unwrap_or(label);
    let major = rest.bytes().take_while(u8::is_ascii_digit).count();
    if major == 0 {
        return false;
    }
    let after = &rest.as_bytes()[major..];
    after.first() == Some(&b'.') && after.get(1).is_some_and(u8::is_ascii_digit)
}

/// SBOM 캐시 키
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbomKey {
    pub repo_name: String,
    /// 버전 태그 라벨일 때만 포함
    pub tag: Option<String>,
    pub commit: String,
}

impl SbomKey {
    pub fn new(repo_name: &str, label: &str, commit: &str) -> Self {
        Self {
            repo_name: sanitize(repo_name),
            tag: is_version_tag(label).then(|| sanitize(label)),
            commit: sanitize(commit),
        }
    }

    pub fn for_target(target: &ResolvedTarget) -> Self {
        Self::new(&target.name(), &target.branch_tag, &target.commit_hash)
    }

    /// 날짜 앞까지의 파일명 접두사
    pub fn prefix(&self) -> String {
        match &self.tag {
            Some(tag) => format!("{}_{tag}_{}_", self.repo_name, self.commit),
            None => format!("{}_{}_", self.repo_name, self.commit),
        }
    }

    /// 날짜를 붙인 저장 파일명
    pub fn file_name(&self, date: &str) -> String {
        format!("{}{date}{SBOM_SUFFIX}", self.prefix())
    }

    /// 파일명이 이 키에 해당하는지 여부 (날짜 부분은 무시)
    pub fn matches(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(&self.prefix())
            .and_then(|rest| rest.strip_suffix(SBOM_SUFFIX))
            .is_some_and(is_date)
    }
}

/// SBOM 캐시
pub struct SbomCache<C: CommandRunner> {
    runner: Arc<C>,
    dir: PathBuf,
    timeout: Duration,
}

impl<C: CommandRunner> SbomCache<C> {
    /// `results_dir/sboms`를 저장 위치로 사용합니다.
    pub fn new(runner: Arc<C>, results_dir: impl AsRef<Path>, timeout: Duration) -> Self {
        let dir = results_dir.as_ref().join(SBOM_DIR);
        Self {
            runner,
            dir: std::path::absolute(&dir).unwrap_or(dir),
            timeout,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 키에 해당하는 기존 SBOM을 찾습니다. 여러 개면 가장 최근 날짜를 반환합니다.
    pub async fn lookup(&self, key: &SbomKey) -> Option<PathBuf> {
        let mut entries = tokio::fs::read_dir(&self.dir).await.ok()?;
        let mut best: Option<String> = None;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if key.matches(&name) && best.as_ref().is_none_or(|b| name > *b) {
                best = Some(name);
            }
        }
        best.map(|name| self.dir.join(name))
    }

    /// 기존 SBOM을 재사용하거나 새로 생성합니다.
    ///
    /// 생성 실패는 경고로 기록하고 `None`을 반환합니다.
    pub async fn ensure(&self, target: &ResolvedTarget) -> Option<PathBuf> {
        let key = SbomKey::for_target(target);
        if let Some(existing) = self.lookup(&key).await {
            counter!(SBOM_CACHE_TOTAL, LABEL_RESULT => "hit").increment(1);
            info!(sbom = %existing.display(), "reusing existing sbom");
            return Some(existing);
        }

        counter!(SBOM_CACHE_TOTAL, LABEL_RESULT => "miss").increment(1);
        match self.generate(&key, &target.repo_path).await {
            Ok(path) => {
                info!(sbom = %path.display(), "sbom generated");
                Some(path)
            }
            Err(e) => {
                counter!(SBOM_CACHE_TOTAL, LABEL_RESULT => "failure").increment(1);
                warn!(error = %e, "sbom generation failed, continuing without sbom");
                None
            }
        }
    }

    /// `syft scan dir:. -o cyclonedx-json=<path>`를 작업 사본에서 실행합니다.
    pub async fn generate(&self, key: &SbomKey, repo_path: &Path) -> Result<PathBuf, EngineError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| EngineError::io(&self.dir, e))?;

        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let path = self.dir.join(key.file_name(&date));
        info!(tool = SBOM_TOOL, "generating sbom");

        let spec = CommandSpec {
            program: SBOM_TOOL.to_owned(),
            args: vec![
                "scan".to_owned(),
                "dir:.".to_owned(),
                "-o".to_owned(),
                format!("cyclonedx-json={}", path.display()),
            ],
            cwd: repo_path.to_path_buf(),
            timeout: self.timeout,
        };

        let output = self
            .runner
            .run(&spec)
            .await
            .map_err(|e| EngineError::Sbom(e.to_string()))?;
        if !output.success() {
            return Err(EngineError::Sbom(format!(
                "{SBOM_TOOL} exited with {:?}: {}",
                output.code,
                output.tail()
            )));
        }
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(EngineError::Sbom(format!(
                "{SBOM_TOOL} did not write {}",
                path.display()
            )));
        }
        Ok(path)
    }
}

fn is_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() && s.len() == 10
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect()
}
