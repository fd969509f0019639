//! 오케스트레이터 -- 저장소 단위 실행 흐름
//!
//! 저장소마다 순차적으로:
//!
//! 1. 명세 검증 및 체크아웃 ([`RepoCache`]) -- 실패 시 해당 저장소만 건너뜀
//! 2. SBOM 생성 또는 재사용 ([`SbomCache`])
//! 3. 언어 감지 ([`LanguageDetector`])
//! 4. 스캐너 선택 ([`ScannerSelector`])
//! 5. 스캐너 실행 ([`ToolExecutor`]) -- `fail_fast`면 첫 실패에서 전체 중단
//!
//! 각 저장소 처리는 `repository` span 안에서 실행되어 `run_id`로 로그를
//! 묶을 수 있습니다. 실행 중 취소 토큰이 취소되면 남은 작업을 건너뜁니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use allscan_core::config::{AllscanConfig, GeneralConfig, RepositorySpec, ScannerConfig};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::coverage::{CoverageMatrix, RepoLevelScanner, ScannerOutcome, repo_level_scanners};
use crate::error::EngineError;
use crate::git::GitClient;
use crate::language::remote::GithubLanguages;
use crate::language::{DetectedLanguageSet, LanguageDetector};
use crate::parser::ParserRegistry;
use crate::runner::{CommandRunner, ScanResult, ToolContext, ToolExecutor};
use crate::sbom::{SBOM_DIR, SbomCache};
use crate::selector::{ScannerSelector, SkippedScanner};
use crate::target::{RepoCache, ResolvedTarget};
use crate::upload::{UploadItem, UploadStats, Uploader};

/// 저장소 하나의 스캔 결과
#[derive(Debug, Clone, Serialize)]
pub struct RepoScanContext {
    pub target: ResolvedTarget,
    pub languages: DetectedLanguageSet,
    /// 선택된 스캐너 (실행 순서)
    pub scanners: Vec<ScannerConfig>,
    pub skipped: Vec<SkippedScanner>,
    pub results: Vec<ScanResult>,
    pub sbom_path: Option<PathBuf>,
}

impl RepoScanContext {
    pub fn result_for(&self, scanner: &str) -> Option<&ScanResult> {
        self.results.iter().find(|r| r.scanner == scanner)
    }

    /// 카테고리를 알 수 있는 선택 스캐너의 실행 결과
    pub fn outcomes<'a>(&'a self, registry: &ParserRegistry) -> Vec<ScannerOutcome<'a>> {
        self.scanners
            .iter()
            .filter_map(|scanner| {
                let category = registry.category_for(scanner)?;
                Some(ScannerOutcome {
                    scanner,
                    category,
                    succeeded: self.result_for(&scanner.name).map(|r| r.success),
                })
            })
            .collect()
    }

    pub fn coverage(&self, registry: &ParserRegistry) -> Option<CoverageMatrix> {
        CoverageMatrix::compute(&self.languages, &self.outcomes(registry))
    }

    pub fn repo_level(&self, registry: &ParserRegistry) -> Vec<RepoLevelScanner> {
        repo_level_scanners(&self.outcomes(registry))
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// 처리하지 못한 저장소
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRepository {
    pub url: String,
    pub reason: String,
}

/// 실행 전체 결과
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub repositories: Vec<RepoScanContext>,
    pub skipped_repositories: Vec<SkippedRepository>,
    /// fail-fast 또는 취소로 중단되었는지 여부
    pub aborted: bool,
    pub upload: Option<UploadStats>,
}

impl RunReport {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_owned(),
            repositories: Vec::new(),
            skipped_repositories: Vec::new(),
            aborted: false,
            upload: None,
        }
    }

    pub fn results(&self) -> impl Iterator<Item = &ScanResult> {
        self.repositories.iter().flat_map(|r| &r.results)
    }

    pub fn total_scans(&self) -> usize {
        self.results().count()
    }

    pub fn successful(&self) -> usize {
        self.results().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results().filter(|r| !r.success).count()
    }

    pub fn total_duration(&self) -> Duration {
        self.results().map(ScanResult::duration).sum()
    }

    /// 실패한 스캔이나 건너뛴 저장소가 있는지 여부
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || !self.skipped_repositories.is_empty()
    }
}

/// 저장소 스캔 오케스트레이터
pub struct Orchestrator<G: GitClient, C: CommandRunner> {
    config: Arc<AllscanConfig>,
    git: Arc<G>,
    runner: Arc<C>,
    registry: ParserRegistry,
    detector: LanguageDetector,
    cancel: CancellationToken,
    run_id: String,
}

impl<G: GitClient, C: CommandRunner> Orchestrator<G, C> {
    /// 기본 파서 레지스트리와 설정 기반 언어 감지기로 생성합니다.
    pub fn new(
        config: Arc<AllscanConfig>,
        git: Arc<G>,
        runner: Arc<C>,
        cancel: CancellationToken,
    ) -> Self {
        let detector = match GithubLanguages::from_config(&config.general) {
            Some(remote) => LanguageDetector::with_remote(remote),
            None => LanguageDetector::local_only(),
        };
        Self {
            config,
            git,
            runner,
            registry: ParserRegistry::with_defaults(),
            detector,
            cancel,
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_detector(mut self, detector: LanguageDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// 디렉토리를 만들고 오래된 결과 파일을 정리합니다.
    pub async fn prepare(&self) -> Result<(), EngineError> {
        setup_directories(&self.config.general).await?;
        let max_age = Duration::from_secs(max_age_secs(self.config.general.results_max_age_days));
        let removed = cleanup_old_results(Path::new(&self.config.general.results_dir), max_age).await?;
        if removed > 0 {
            info!(removed, "cleaned up old result files");
        }
        Ok(())
    }

    /// 저장소 목록을 순서대로 스캔합니다.
    pub async fn run(&self, specs: &[RepositorySpec]) -> RunReport {
        let mut report = RunReport::new(&self.run_id);
        info!(run_id = %self.run_id, repositories = specs.len(), "starting run");

        for spec in specs {
            if self.cancel.is_cancelled() {
                warn!("run cancelled, skipping remaining repositories");
                report.aborted = true;
                break;
            }

            let span = info_span!("repository", run_id = %self.run_id, repo = %spec.url);
            let checkout = self.checkout(spec).instrument(span.clone()).await;
            let target = match checkout {
                Ok(target) => target,
                Err(e) => {
                    error!(parent: &span, error = %e, "skipping repository");
                    report.skipped_repositories.push(SkippedRepository {
                        url: spec.url.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            let (ctx, aborted) = self
                .scan_target(target, &spec.scanners, false)
                .instrument(span)
                .await;
            report.repositories.push(ctx);
            if aborted {
                report.aborted = true;
                break;
            }
        }

        report
    }

    /// 로컬 디렉토리를 클론 없이 스캔합니다.
    pub async fn run_local(&self, path: &Path) -> RunReport {
        let mut report = RunReport::new(&self.run_id);
        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        let commit = match self.git.rev_parse_short(&path).await {
            Ok(hash) if !hash.is_empty() => Some(hash),
            _ => None,
        };
        let target = ResolvedTarget::local(path, commit);

        let span = info_span!("repository", run_id = %self.run_id, repo = %target.url);
        let (ctx, aborted) = self.scan_target(target, &[], true).instrument(span).await;
        report.repositories.push(ctx);
        report.aborted = aborted;
        report
    }

    /// 업로드가 설정되어 있으면 결과를 업로드하고 집계를 기록합니다.
    pub async fn upload(&self, report: &mut RunReport) {
        let Some(uploader) = Uploader::from_config(&self.config.general) else {
            return;
        };
        let items: Vec<UploadItem<'_>> = report
            .repositories
            .iter()
            .filter(|ctx| !ctx.target.is_local())
            .flat_map(|ctx| {
                ctx.results.iter().map(|result| UploadItem {
                    result,
                    commit_hash: &ctx.target.commit_hash,
                    branch_tag: &ctx.target.branch_tag,
                })
            })
            .collect();
        let stats = uploader.upload_all(&items).await;
        report.upload = Some(stats);
    }

    async fn checkout(&self, spec: &RepositorySpec) -> Result<ResolvedTarget, EngineError> {
        let cache = RepoCache::new(Arc::clone(&self.git), &self.config.general.workspace);
        let target = cache.checkout(spec).await?;
        info!(commit = %target.commit_hash, label = %target.branch_tag, "checked out");
        Ok(target)
    }

    /// 체크아웃된 대상을 스캔합니다. 두 번째 값은 실행 중단 여부입니다.
    async fn scan_target(
        &self,
        target: ResolvedTarget,
        allow_list: &[String],
        local: bool,
    ) -> (RepoScanContext, bool) {
        let general = &self.config.general;

        let sbom = SbomCache::new(Arc::clone(&self.runner), &general.results_dir, general.sbom_timeout());
        let sbom_path = sbom.ensure(&target).await;

        let languages = self.detector.detect(&target.url, &target.repo_path).await;

        let selection = ScannerSelector::new(&self.config.scanners).select(&languages, allow_list);
        info!(scanners = ?selection.names(), "selected scanners");

        let mut ctx = RepoScanContext {
            scanners: selection.selected.iter().map(|s| (*s).clone()).collect(),
            skipped: selection.skipped,
            target,
            languages,
            results: Vec::new(),
            sbom_path,
        };

        let executor = ToolExecutor::new(Arc::clone(&self.runner), &general.results_dir, self.cancel.clone());
        let result_stem = ctx.target.result_stem();
        let mut aborted = false;

        for scanner in &ctx.scanners {
            if self.cancel.is_cancelled() {
                warn!("run cancelled, skipping remaining scanners");
                aborted = true;
                break;
            }
            let tool_ctx = ToolContext {
                result_stem: &result_stem,
                repo_url: &ctx.target.url,
                repo_path: &ctx.target.repo_path,
                sbom: ctx.sbom_path.as_deref(),
                local,
            };
            let result = executor.execute(scanner, &tool_ctx).await;
            let failed = !result.success;
            ctx.results.push(result);

            if failed && general.fail_fast {
                warn!(scanner = %scanner.name, "fail_fast enabled, aborting run");
                aborted = true;
                break;
            }
        }

        (ctx, aborted)
    }
}

/// 작업 공간, 결과, SBOM 디렉토리를 만듭니다.
pub async fn setup_directories(general: &GeneralConfig) -> Result<(), EngineError> {
    let results = Path::new(&general.results_dir);
    for dir in [
        Path::new(&general.workspace).to_path_buf(),
        results.to_path_buf(),
        results.join(SBOM_DIR),
    ] {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| EngineError::io(&dir, e))?;
    }
    Ok(())
}

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// 보관 일수를 초로 바꿉니다. 너무 큰 값은 `u64::MAX`에서 멈춥니다.
fn max_age_secs(days: u64) -> u64 {
    days.saturating_mul(SECS_PER_DAY)
}

/// 결과 디렉토리 바로 아래의 오래된 `*.json` 파일을 지웁니다.
///
/// `max_age`가 0이면 아무것도 지우지 않습니다. 하위 디렉토리(SBOM 포함)는 건드리지 않습니다.
pub async fn cleanup_old_results(dir: &Path, max_age: Duration) -> Result<usize, EngineError> {
    if max_age.is_zero() {
        return Ok(0);
    }
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(EngineError::io(dir, e)),
    };

    let now = SystemTime::now();
    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| EngineError::io(dir, e))?
    {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let age = meta
            .modified()
            .ok()
            .and_then(|m| now.duration_since(m).ok())
            .unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove old result"),
        }
    }
    Ok(removed)
}
