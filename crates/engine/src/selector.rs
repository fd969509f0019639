//! 스캐너 선택
//!
//! 설정된 스캐너 카탈로그를 저장소 하나에 적용 가능한 부분집합으로 줄입니다.
//!
//! - 비활성 스캐너는 선택되지 않습니다.
//! - `languages`가 비어 있는 스캐너는 범용이며 감지된 언어가 없어도 선택됩니다.
//! - 그 외에는 감지된 언어가 `languages` 또는 `languages_conditional`에 있어야 합니다.
//! - 허용 목록이 있으면 그 순서대로, 같은 필터를 거쳐 선택합니다.

use std::fmt;

use allscan_core::config::ScannerConfig;
use serde::Serialize;
use tracing::{debug, warn};

use crate::language::DetectedLanguageSet;

/// 스캐너가 선택되지 않은 이유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `enabled = false`
    Disabled,
    /// 감지된 언어와 호환되지 않음
    NoCompatibleLanguage,
    /// 허용 목록에 카탈로그에 없는 이름이 있음
    Unknown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "disabled"),
            Self::NoCompatibleLanguage => write!(f, "no compatible language detected"),
            Self::Unknown => write!(f, "not in scanner catalog"),
        }
    }
}

/// 건너뛴 스캐너
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedScanner {
    pub name: String,
    pub reason: SkipReason,
}

/// 선택 결과
#[derive(Debug, Default)]
pub struct Selection<'a> {
    /// 실행할 스캐너 (실행 순서)
    pub selected: Vec<&'a ScannerConfig>,
    /// 건너뛴 스캐너와 사유
    pub skipped: Vec<SkippedScanner>,
}

impl Selection<'_> {
    pub fn names(&self) -> Vec<&str> {
        self.selected.iter().map(|s| s.name.as_str()).collect()
    }
}

/// 스캐너 선택기
pub struct ScannerSelector<'a> {
    catalog: &'a [ScannerConfig],
}

impl<'a> ScannerSelector<'a> {
    pub fn new(catalog: &'a [ScannerConfig]) -> Self {
        Self { catalog }
    }

    /// 감지된 언어와 허용 목록으로 스캐너를 선택합니다.
    ///
    /// `allow_list`가 비어 있으면 카탈로그 순서를 따릅니다.
    pub fn select(&self, detected: &DetectedLanguageSet, allow_list: &[String]) -> Selection<'a> {
        let mut selection = Selection::default();

        if allow_list.is_empty() {
            for scanner in self.catalog {
                self.consider(scanner, detected, &mut selection);
            }
            return selection;
        }

        for name in allow_list {
            match self.catalog.iter().find(|s| s.name == *name) {
                Some(scanner) => self.consider(scanner, detected, &mut selection),
                None => {
                    warn!(scanner = %name, "requested scanner is not in the catalog, skipping");
                    selection.skipped.push(SkippedScanner {
                        name: name.clone(),
                        reason: SkipReason::Unknown,
                    });
                }
            }
        }
        selection
    }

    fn consider(
        &self,
        scanner: &'a ScannerConfig,
        detected: &DetectedLanguageSet,
        selection: &mut Selection<'a>,
    ) {
        if selection.selected.iter().any(|s| s.name == scanner.name) {
            return;
        }
        let reason = if !scanner.enabled {
            SkipReason::Disabled
        } else if !is_compatible(scanner, detected) {
            SkipReason::NoCompatibleLanguage
        } else {
            selection.selected.push(scanner);
            return;
        };
        debug!(scanner = %scanner.name, reason = %reason, "skipping scanner");
        selection.skipped.push(SkippedScanner {
            name: scanner.name.clone(),
            reason,
        });
    }
}

/// 스캐너가 감지된 언어 집합과 호환되는지 여부
///
/// 조건부 언어만 가진 스캐너는 감지된 언어가 없으면 호환되지 않습니다.
pub fn is_compatible(scanner: &ScannerConfig, detected: &DetectedLanguageSet) -> bool {
    scanner.is_universal()
        || detected.has_any(&scanner.languages)
        || detected.has_any(&scanner.languages_conditional)
}
