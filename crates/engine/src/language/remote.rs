//! GitHub 언어 API
//!
//! `GET {api}/repos/{owner}/{repo}/languages` 응답(언어 이름 → 바이트 수)을
//! 정규화된 어휘로 변환합니다. github.com 저장소만 지원합니다.

use std::collections::BTreeMap;
use std::time::Duration;

use allscan_core::config::GeneralConfig;
use tracing::debug;

use super::vocab::canonical_remote_name;
use crate::error::EngineError;

const GITHUB_HOST: &str = "github.com";
const API_VERSION: &str = "2022-11-28";

/// 저장소 URL에서 `(owner, repo)`를 추출합니다.
///
/// `https://github.com/o/r(.git)`와 `git@github.com:o/r(.git)` 형식을 지원합니다.
pub fn github_repo(url: &str) -> Option<(String, String)> {
    let url = url.trim().trim_end_matches('/');
    let rest = if let Some(rest) = url.strip_prefix("git@github.com:") {
        rest
    } else {
        let without_scheme = url.split_once("://").map(|(_, r)| r)?;
        let (host, path) = without_scheme.split_once('/')?;
        // user@host 형식 허용
        let host = host.rsplit('@').next().unwrap_or(host);
        if !host.eq_ignore_ascii_case(GITHUB_HOST) {
            return None;
        }
        path
    };

    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let owner = parts.next()?;
    let repo = parts.next()?.trim_end_matches(".git");
    if parts.next().is_some() || repo.is_empty() {
        return None;
    }
    Some((owner.to_owned(), repo.to_owned()))
}

/// API 응답을 정규화된 가중치로 변환합니다.
///
/// 서로 다른 이름이 같은 언어로 매핑되면 바이트 수를 합산합니다.
pub fn map_payload(payload: &BTreeMap<String, u64>) -> BTreeMap<String, u64> {
    let mut weights = BTreeMap::new();
    for (name, bytes) in payload {
        *weights.entry(canonical_remote_name(name)).or_insert(0) += bytes;
    }
    weights
}

/// GitHub 언어 API 클라이언트
pub struct GithubLanguages {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl GithubLanguages {
    pub fn new(api_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_owned(),
            token,
            timeout,
        }
    }

    /// 설정에서 생성합니다. API URL이 비어 있으면 `None`입니다.
    ///
    /// 토큰이 없어도 생성되지만 `fetch`는 항상 실패합니다.
    pub fn from_config(general: &GeneralConfig) -> Option<Self> {
        if general.github_api_url.trim().is_empty() {
            return None;
        }
        let token = std::env::var(&general.github_token_env)
            .ok()
            .filter(|t| !t.is_empty());
        Some(Self::new(
            general.github_api_url.trim(),
            token,
            general.network_timeout(),
        ))
    }

    /// 저장소의 언어 가중치를 조회합니다.
    ///
    /// 토큰이 없으면 요청 없이 `LanguageMetadata` 에러를 반환합니다.
    pub async fn fetch(&self, url: &str) -> Result<BTreeMap<String, u64>, EngineError> {
        let token = self
            .token
            .as_deref()
            .ok_or_else(|| EngineError::LanguageMetadata("no credential".to_owned()))?;
        let (owner, repo) = github_repo(url)
            .ok_or_else(|| EngineError::LanguageMetadata(format!("not a github.com url: {url}")))?;
        let endpoint = format!("{}/repos/{owner}/{repo}/languages", self.api_url);

        let response = self
            .client
            .get(&endpoint)
            .timeout(self.timeout)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .header("User-Agent", "allscan")
            .send()
            .await
            .map_err(|e| EngineError::LanguageMetadata(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::LanguageMetadata(format!(
                "{endpoint} returned {status}"
            )));
        }

        let payload: BTreeMap<String, u64> = response
            .json()
            .await
            .map_err(|e| EngineError::LanguageMetadata(format!("invalid payload: {e}")))?;
        debug!(owner = %owner, repo = %repo, entries = payload.len(), "fetched language metadata");
        Ok(map_payload(&payload))
    }
}
