//! 언어 감지
//!
//! 원격 메타데이터(GitHub 언어 API, 바이트 수)를 먼저 시도하고, 실패하면
//! 작업 사본을 순회해 파일 수를 셉니다. 원격 경로의 실패는 절대 에러로
//! 전파되지 않습니다.

pub mod local;
pub mod remote;
pub mod vocab;

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use allscan_core::metrics::{LABEL_SOURCE, LANGUAGE_DETECTION_TOTAL};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, warn};

use self::remote::GithubLanguages;
use crate::target::LOCAL_SCHEME;

/// 가중치의 출처
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageSource {
    /// 호스팅 서비스 메타데이터 (바이트 수)
    Remote,
    /// 작업 사본 순회 (파일 수)
    Local,
}

impl fmt::Display for LanguageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// 감지된 언어 집합
///
/// 저장소당 한 번 생성되며 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectedLanguageSet {
    weights: BTreeMap<String, u64>,
    source: LanguageSource,
}

impl DetectedLanguageSet {
    pub fn new(source: LanguageSource, weights: BTreeMap<String, u64>) -> Self {
        Self { weights, source }
    }

    pub fn empty(source: LanguageSource) -> Self {
        Self::new(source, BTreeMap::new())
    }

    pub fn source(&self) -> LanguageSource {
        self.source
    }

    /// 언어 이름 (정렬됨)
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight(&self, language: &str) -> u64 {
        self.weights.get(language).copied().unwrap_or(0)
    }

    pub fn weights(&self) -> &BTreeMap<String, u64> {
        &self.weights
    }

    /// 대소문자를 구분하지 않고 언어 포함 여부를 확인합니다.
    pub fn has_language(&self, language: &str) -> bool {
        self.weights.keys().any(|l| l.eq_ignore_ascii_case(language))
    }

    /// 목록 중 하나라도 감지되었는지 여부
    pub fn has_any<S: AsRef<str>>(&self, languages: &[S]) -> bool {
        languages.iter().any(|l| self.has_language(l.as_ref()))
    }

    /// 언어별 비율 (0-100)
    ///
    /// 가중치 합이 0이면 `None`입니다.
    pub fn percentages(&self) -> Option<BTreeMap<String, f64>> {
        let total: u64 = self.weights.values().sum();
        if total == 0 {
            return None;
        }
        Some(
            self.weights
                .iter()
                .map(|(lang, w)| (lang.clone(), *w as f64 * 100.0 / total as f64))
                .collect(),
        )
    }
}

/// 언어 감지기
pub struct LanguageDetector {
    remote: Option<GithubLanguages>,
}

impl LanguageDetector {
    /// 원격 조회 없이 로컬 순회만 사용하는 감지기
    pub fn local_only() -> Self {
        Self { remote: None }
    }

    pub fn with_remote(remote: GithubLanguages) -> Self {
        Self {
            remote: Some(remote),
        }
    }

    /// 저장소의 언어를 감지합니다.
    ///
    /// 로컬 순회까지 실패하면 빈 집합을 반환합니다.
    pub async fn detect(&self, url: &str, repo_path: &Path) -> DetectedLanguageSet {
        if let Some(remote) = &self.remote
            && !url.starts_with(LOCAL_SCHEME)
        {
            match remote.fetch(url).await {
                Ok(weights) => {
                    let set = DetectedLanguageSet::new(LanguageSource::Remote, weights);
                    record(&set);
                    return set;
                }
                Err(e) => debug!(repo = %url, error = %e, "remote language metadata unavailable, scanning files"),
            }
        }

        let set = match local::scan(repo_path).await {
            Ok(weights) => DetectedLanguageSet::new(LanguageSource::Local, weights),
            Err(e) => {
                warn!(repo = %url, error = %e, "failed to detect languages");
                DetectedLanguageSet::empty(LanguageSource::Local)
            }
        };
        record(&set);
        set
    }
}

fn record(set: &DetectedLanguageSet) {
    counter!(LANGUAGE_DETECTION_TOTAL, LABEL_SOURCE => set.source().to_string()).increment(1);
    if set.is_empty() {
        info!(source = %set.source(), "no specific languages detected");
    } else {
        let names: Vec<&str> = set.languages().collect();
        info!(source = %set.source(), languages = %names.join(", "), "detected languages");
    }
}
