//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 엔진은 이 상수를 사용하여 `metrics::counter!()`, `metrics::histogram!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 기록은 아무 동작도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `allscan_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use allscan_core::metrics::{SCANS_TOTAL, LABEL_RESULT};
//! use metrics::counter;
//!
//! counter!(SCANS_TOTAL, LABEL_RESULT => "success").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure, hit, miss, reused, recloned)
pub const LABEL_RESULT: &str = "result";

/// 언어 감지 경로 레이블 키 (remote, local)
pub const LABEL_SOURCE: &str = "source";

/// 스캐너 이름 레이블 키
pub const LABEL_SCANNER: &str = "scanner";

// ─── 메트릭 이름 ────────────────────────────────────────────────────

/// 스캐너 실행 횟수 (counter, labels: scanner, result)
pub const SCANS_TOTAL: &str = "allscan_scans_total";

/// 스캐너 실행 시간 (histogram, label: scanner)
pub const SCAN_DURATION_SECONDS: &str = "allscan_scan_duration_seconds";

/// SBOM 캐시 조회 결과 (counter, label: result = hit | miss | failure)
pub const SBOM_CACHE_TOTAL: &str = "allscan_sbom_cache_total";

/// 저장소 작업 사본 재사용 결과 (counter, label: result = reused | recloned)
pub const REPO_CACHE_TOTAL: &str = "allscan_repo_cache_total";

/// 언어 감지 경로 (counter, label: source = remote | local)
pub const LANGUAGE_DETECTION_TOTAL: &str = "allscan_language_detection_total";

/// 결과 업로드 횟수 (counter, label: result)
pub const UPLOADS_TOTAL: &str = "allscan_uploads_total";

/// 스캐너 실행 시간 히스토그램 버킷 (초)
///
/// 1s ~ 1800s 범위 (대형 저장소의 SAST 실행 포함)
pub const SCAN_DURATION_BUCKETS: [f64; 9] = [
    1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
];

/// 모든 메트릭 이름 목록
pub const ALL_METRIC_NAMES: [&str; 6] = [
    SCANS_TOTAL,
    SCAN_DURATION_SECONDS,
    SBOM_CACHE_TOTAL,
    REPO_CACHE_TOTAL,
    LANGUAGE_DETECTION_TOTAL,
    UPLOADS_TOTAL,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 레코더를 설치한 임베딩 프로세스가 시작 시점에 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(
        SCANS_TOTAL,
        "Total number of scanner invocations by outcome"
    );
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Wall-clock duration of a single scanner invocation in seconds"
    );
    describe_counter!(
        SBOM_CACHE_TOTAL,
        "SBOM cache lookups by outcome (hit, miss, failure)"
    );
    describe_counter!(
        REPO_CACHE_TOTAL,
        "Branch working copies reused in place or re-cloned"
    );
    describe_counter!(
        LANGUAGE_DETECTION_TOTAL,
        "Language detections by source (remote metadata or local scan)"
    );
    describe_counter!(UPLOADS_TOTAL, "Result uploads by outcome");
}
