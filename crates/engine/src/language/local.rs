//! 작업 사본 순회 기반 언어 감지
//!
//! 숨김 디렉토리와 의존성/빌드 디렉토리를 건너뛰고, 남은 파일마다
//! 매니페스트 이름을 먼저, 확장자를 다음으로 확인해 언어별 파일 수를 셉니다.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::vocab::{is_skipped_dir, language_for_extension, language_for_manifest};
use crate::error::EngineError;

/// 디렉토리를 순회해 언어별 파일 수를 반환합니다.
///
/// 순회는 블로킹 I/O이므로 `spawn_blocking`에서 실행합니다.
pub async fn scan(root: &Path) -> Result<BTreeMap<String, u64>, EngineError> {
    let root: PathBuf = root.to_path_buf();
    let task_root = root.clone();
    tokio::task::spawn_blocking(move || scan_blocking(&task_root))
        .await
        .map_err(|e| {
            EngineError::io(
                &root,
                std::io::Error::other(format!("language scan task failed: {e}")),
            )
        })?
}

/// 동기 순회
pub fn scan_blocking(root: &Path) -> Result<BTreeMap<String, u64>, EngineError> {
    let meta = std::fs::metadata(root).map_err(|e| EngineError::io(root, e))?;
    if !meta.is_dir() {
        return Err(EngineError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory"),
        ));
    }

    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !skip_entry(e));

    // 접근할 수 없는 항목은 건너뜁니다.
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(lang) = classify(&entry.file_name().to_string_lossy()) {
            *counts.entry(lang.to_owned()).or_insert(0) += 1;
        }
    }

    Ok(counts)
}

/// 파일 이름 하나를 분류합니다. 매니페스트가 확장자보다 우선합니다.
pub fn classify(file_name: &str) -> Option<&'static str> {
    if let Some(lang) = language_for_manifest(file_name) {
        return Some(lang);
    }
    let (_, ext) = file_name.rsplit_once('.')?;
    language_for_extension(ext)
}

fn skip_entry(entry: &DirEntry) -> bool {
    // 루트 자체는 이름과 무관하게 순회합니다.
    entry.depth() > 0
        && entry.file_type().is_dir()
        && is_skipped_dir(&entry.file_name().to_string_lossy())
}
