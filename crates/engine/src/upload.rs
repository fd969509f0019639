//! 결과 업로드 -- 취약점 관리 서비스로 multipart 전송
//!
//! 성공했고 scan type이 설정된 결과만 업로드합니다. 토큰 환경변수가 비어
//! 있으면 업로드 전체를 건너뜁니다. 개별 업로드 실패는 집계되어 로그로 남고
//! 실행을 중단하지 않습니다.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use allscan_core::config::GeneralConfig;
use allscan_core::metrics::{LABEL_RESULT, UPLOADS_TOTAL};
use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::runner::ScanResult;
use crate::target::repo_slug;

/// 업로드 요청 제한 시간
pub const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

const PRODUCT_TYPE: &str = "Research and Development";

/// 업로드 대상 하나
#[derive(Debug, Clone, Copy)]
pub struct UploadItem<'a> {
    pub result: &'a ScanResult,
    pub commit_hash: &'a str,
    pub branch_tag: &'a str,
}

/// 업로드 집계
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    pub uploaded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// multipart 폼 내용
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub fields: BTreeMap<&'static str, String>,
    pub file_name: String,
    pub file: Bytes,
}

impl UploadForm {
    /// 결과 하나에 대한 폼 필드를 구성합니다.
    pub fn fields_for(item: &UploadItem<'_>, scan_date: &str) -> BTreeMap<&'static str, String> {
        let product = repo_slug(&item.result.repository);
        let mut fields = BTreeMap::new();
        fields.insert("scan_date", scan_date.to_owned());
        fields.insert(
            "engagement_name",
            format!("{product}-{}", item.result.scanner),
        );
        fields.insert("product_name", product);
        fields.insert("scan_type", item.result.upload_scan_type.clone());
        fields.insert("auto_create_context", "true".to_owned());
        fields.insert("product_type_name", PRODUCT_TYPE.to_owned());
        fields.insert("do_not_reactivate", "true".to_owned());
        if !item.commit_hash.is_empty() {
            fields.insert("commit_hash", item.commit_hash.to_owned());
        }
        if !item.branch_tag.is_empty() {
            fields.insert("branch_tag", item.branch_tag.to_owned());
        }
        fields
    }

    /// 결과 파일을 읽어 폼을 만듭니다.
    pub async fn load(item: &UploadItem<'_>, scan_date: &str) -> Result<Self, EngineError> {
        let path = item
            .result
            .output_path
            .as_deref()
            .ok_or_else(|| EngineError::Upload(format!("{} has no output file", item.result.scanner)))?;
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| EngineError::io(path, e))?;
        Ok(Self {
            fields: Self::fields_for(item, scan_date),
            file_name: file_name(path),
            file: Bytes::from(data),
        })
    }

    pub fn into_multipart(self) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        let length = self.file.len() as u64;
        let part = reqwest::multipart::Part::stream_with_length(self.file, length)
            .file_name(self.file_name);
        form.part("file", part)
    }
}

/// 업로드 대상인지 여부, 아니면 건너뛰는 이유
pub fn skip_reason(result: &ScanResult) -> Option<&'static str> {
    if !result.success {
        Some("scan failed")
    } else if result.upload_scan_type.is_empty() {
        Some("no scan type configured")
    } else if result.output_path.is_none() {
        Some("no output file")
    } else {
        None
    }
}

/// 업로드 클라이언트
pub struct Uploader {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl Uploader {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }

    /// 엔드포인트가 설정되어 있고 토큰 환경변수가 있으면 생성합니다.
    pub fn from_config(general: &GeneralConfig) -> Option<Self> {
        if general.upload_endpoint.trim().is_empty() {
            return None;
        }
        match std::env::var(&general.upload_token_env) {
            Ok(token) if !token.is_empty() => Some(Self::new(general.upload_endpoint.trim(), token)),
            _ => {
                warn!(env = %general.upload_token_env, "upload token not set, skipping upload");
                None
            }
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 모든 대상 결과를 업로드하고 집계를 반환합니다.
    pub async fn upload_all(&self, items: &[UploadItem<'_>]) -> UploadStats {
        info!(endpoint = %self.endpoint, "uploading results");
        let scan_date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let mut stats = UploadStats::default();

        for item in items {
            if let Some(reason) = skip_reason(item.result) {
                info!(scanner = %item.result.scanner, reason, "skipping upload");
                stats.skipped += 1;
                continue;
            }
            match self.upload(item, &scan_date).await {
                Ok(()) => {
                    counter!(UPLOADS_TOTAL, LABEL_RESULT => "success").increment(1);
                    info!(scanner = %item.result.scanner, repo = %item.result.repository, "uploaded result");
                    stats.uploaded += 1;
                }
                Err(e) => {
                    counter!(UPLOADS_TOTAL, LABEL_RESULT => "failure").increment(1);
                    warn!(scanner = %item.result.scanner, error = %e, "upload failed");
                    stats.failed += 1;
                }
            }
        }

        info!(uploaded = stats.uploaded, failed = stats.failed, skipped = stats.skipped, "upload summary");
        stats
    }

    async fn upload(&self, item: &UploadItem<'_>, scan_date: &str) -> Result<(), EngineError> {
        let form = UploadForm::load(item, scan_date).await?;
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(UPLOAD_TIMEOUT)
            .header("Authorization", format!("Token {}", self.token))
            .multipart(form.into_multipart())
            .send()
            .await
            .map_err(|e| EngineError::Upload(format!("sending request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Upload(format!(
                "status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "result.json".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn result(output: Option<PathBuf>, success: bool, scan_type: &str) -> ScanResult {
        ScanResult {
            scanner: "grype".to_owned(),
            repository: "https://github.com/acme/demo.git".to_owned(),
            output_path: output,
            success,
            error: None,
            duration_ms: 10,
            upload_scan_type: scan_type.to_owned(),
        }
    }

    /// 요청 하나를 받아 `status`로 응답하고, 받은 요청 원문을 돌려줍니다.
    async fn one_shot_server(status: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if request_complete(&buf) {
                    break;
                }
            }
            let body = "ok";
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&buf).into_owned()
        });
        (format!("http://{addr}/api/v2/import-scan/"), handle)
    }

    fn request_complete(buf: &[u8]) -> bool {
        let text = String::from_utf8_lossy(buf);
        let Some((head, body)) = text.split_once("\r\n\r\n") else {
            return false;
        };
        let length = head.lines().find_map(|l| {
            let (k, v) = l.split_once(':')?;
            k.eq_ignore_ascii_case("content-length")
                .then(|| v.trim().parse::<usize>().ok())
                .flatten()
        });
        match length {
            Some(len) => body.len() >= len,
            None => body.ends_with("--\r\n") || body.ends_with("0\r\n\r\n"),
        }
    }

    #[test]
    fn form_fields_follow_import_contract() {
        let r = result(Some(PathBuf::from("/r/demo_grype.json")), true, "Anchore Grype");
        let item = UploadItem {
            result: &r,
            commit_hash: "abc1234",
            branch_tag: "v1.2.0",
        };
        let fields = UploadForm::fields_for(&item, "2026-01-05");
        assert_eq!(fields["scan_date"], "2026-01-05");
        assert_eq!(fields["product_name"], "acme/demo");
        assert_eq!(fields["engagement_name"], "acme/demo-grype");
        assert_eq!(fields["scan_type"], "Anchore Grype");
        assert_eq!(fields["auto_create_context"], "true");
        assert_eq!(fields["product_type_name"], "Research and Development");
        assert_eq!(fields["do_not_reactivate"], "true");
        assert_eq!(fields["commit_hash"], "abc1234");
        assert_eq!(fields["branch_tag"], "v1.2.0");
    }

    #[test]
    fn empty_commit_and_label_are_omitted() {
        let r = result(None, true, "Gosec Scanner");
        let item = UploadItem {
            result: &r,
            commit_hash: "",
            branch_tag: "",
        };
        let fields = UploadForm::fields_for(&item, "2026-01-05");
        assert!(!fields.contains_key("commit_hash"));
        assert!(!fields.contains_key("branch_tag"));
    }

    #[test]
    fn skip_rules() {
        assert_eq!(skip_reason(&result(Some("/x".into()), false, "T")), Some("scan failed"));
        assert_eq!(
            skip_reason(&result(Some("/x".into()), true, "")),
            Some("no scan type configured")
        );
        assert_eq!(skip_reason(&result(None, true, "T")), Some("no output file"));
        assert_eq!(skip_reason(&result(Some("/x".into()), true, "T")), None);
    }

    #[test]
    #[serial]
    fn from_config_requires_endpoint_and_token() {
        let mut general = GeneralConfig {
            upload_token_env: "ALLSCAN_TEST_UPLOAD_TOKEN".to_owned(),
            ..GeneralConfig::default()
        };
        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe { std::env::set_var("ALLSCAN_TEST_UPLOAD_TOKEN", "secret") };
        assert!(Uploader::from_config(&general).is_none());

        general.upload_endpoint = "https://dojo.example/api/v2/import-scan/".to_owned();
        let uploader = Uploader::from_config(&general).unwrap();
        assert_eq!(uploader.endpoint(), "https://dojo.example/api/v2/import-scan/");

        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe { std::env::remove_var("ALLSCAN_TEST_UPLOAD_TOKEN") };
        assert!(Uploader::from_config(&general).is_none());
    }

    #[tokio::test]
    async fn uploads_successful_results_with_token_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo_grype_20260105-101010.json");
        tokio::fs::write(&path, br#"{"matches":[]}"#).await.unwrap();

        let (endpoint, server) = one_shot_server("201 Created").await;
        let uploader = Uploader::new(endpoint, "t0k3n");

        let ok = result(Some(path), true, "Anchore Grype");
        let failed = result(None, false, "Anchore Grype");
        let items = [
            UploadItem {
                result: &ok,
                commit_hash: "abc1234",
                branch_tag: "main",
            },
            UploadItem {
                result: &failed,
                commit_hash: "abc1234",
                branch_tag: "main",
            },
        ];
        let stats = uploader.upload_all(&items).await;
        assert_eq!(
            stats,
            UploadStats {
                uploaded: 1,
                failed: 0,
                skipped: 1
            }
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v2/import-scan/"));
        assert!(request.to_ascii_lowercase().contains("authorization: token t0k3n"));
        assert!(request.contains("name=\"engagement_name\""));
        assert!(request.contains("acme/demo-grype"));
        assert!(request.contains("filename=\"demo_grype_20260105-101010.json\""));
    }

    #[tokio::test]
    async fn non_success_status_counts_as_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.json");
        tokio::fs::write(&path, b"{}").await.unwrap();

        let (endpoint, server) = one_shot_server("400 Bad Request").await;
        let uploader = Uploader::new(endpoint, "t");
        let ok = result(Some(path), true, "Anchore Grype");
        let stats = uploader
            .upload_all(&[UploadItem {
                result: &ok,
                commit_hash: "",
                branch_tag: "",
            }])
            .await;
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.uploaded, 0);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_output_file_is_failure() {
        let uploader = Uploader::new("http://127.0.0.1:9/", "t");
        let r = result(Some(PathBuf::from("/nonexistent/allscan/r.json")), true, "T");
        let stats = uploader
            .upload_all(&[UploadItem {
                result: &r,
                commit_hash: "",
                branch_tag: "",
            }])
            .await;
        assert_eq!(stats.failed, 1);
    }
}
