//! 커버리지 엔진
//!
//! (감지된 언어 × 추적 카테고리) 행렬에 각 스캐너의 실행 결과를 반영합니다.
//! 셀 상태는 `None < Conditional < Failed < Ok` 순서를 가지며, 한 번 올라간
//! 상태는 성공에 의한 `Ok` 승격을 제외하면 내려가지 않습니다.
//!
//! 추적 카테고리([`AnalysisCategory::MATRIX`]) 밖의 스캐너(시크릿, 스코어카드,
//! 바이너리)는 행렬에서 제외되고 저장소 수준 결과로 따로 보고됩니다.

use std::cmp::Ordering;
use std::fmt;

use allscan_core::config::ScannerConfig;
use allscan_core::types::AnalysisCategory;
use serde::Serialize;

use crate::language::DetectedLanguageSet;

/// 셀 하나의 커버리지 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageState {
    /// 이 카테고리의 스캐너가 언어를 다루지 않음
    #[default]
    None,
    /// 조건부 지원 스캐너만 언어를 다룸
    Conditional,
    /// 언어를 다루는 스캐너가 실패함
    Failed,
    /// 언어를 다루는 스캐너가 성공함
    Ok,
}

impl CoverageState {
    /// 성공은 이전 상태와 무관하게 `Ok`로 만듭니다.
    pub fn record_success(&mut self) {
        *self = Self::Ok;
    }

    /// 실패는 `Failed`보다 낮은 상태만 `Failed`로 올립니다.
    pub fn record_failure(&mut self) {
        if *self < Self::Failed {
            *self = Self::Failed;
        }
    }

    /// 조건부 지원은 `None`만 `Conditional`로 올립니다.
    pub fn record_conditional(&mut self) {
        if *self == Self::None {
            *self = Self::Conditional;
        }
    }

    /// 표 셀 기호
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Ok => "✔",
            Self::Failed => "⚠",
            Self::Conditional => "◐",
            Self::None => "✘",
        }
    }
}

impl fmt::Display for CoverageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Conditional => write!(f, "conditional"),
            Self::Failed => write!(f, "failed"),
            Self::Ok => write!(f, "ok"),
        }
    }
}

/// 선택된 스캐너 하나의 실행 결과
#[derive(Debug, Clone, Copy)]
pub struct ScannerOutcome<'a> {
    pub scanner: &'a ScannerConfig,
    pub category: AnalysisCategory,
    /// 결과가 없으면 `None` (fail-fast로 중단된 경우)
    pub succeeded: Option<bool>,
}

/// 행렬의 한 행
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub language: String,
    /// 0-100 비율 (가중치 합이 0이면 없음)
    pub share: Option<f64>,
    /// [`AnalysisCategory::MATRIX`] 순서의 셀
    pub cells: Vec<CoverageState>,
}

impl CoverageRow {
    pub fn cell(&self, category: AnalysisCategory) -> Option<CoverageState> {
        AnalysisCategory::MATRIX
            .iter()
            .position(|c| *c == category)
            .and_then(|i| self.cells.get(i).copied())
    }

    /// `(<1%)` 또는 반올림한 `(N%)`
    pub fn share_label(&self) -> Option<String> {
        self.share.map(share_label)
    }
}

/// 언어별 커버리지 행렬 (점유율 내림차순, 같으면 이름순)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageMatrix {
    pub categories: Vec<AnalysisCategory>,
    pub rows: Vec<CoverageRow>,
}

impl CoverageMatrix {
    /// 행렬을 계산합니다. 감지된 언어가 없으면 `None`입니다.
    pub fn compute(detected: &DetectedLanguageSet, outcomes: &[ScannerOutcome<'_>]) -> Option<Self> {
        if detected.is_empty() {
            return None;
        }
        let categories = AnalysisCategory::MATRIX.to_vec();
        let shares = detected.percentages();

        let mut rows: Vec<CoverageRow> = detected
            .languages()
            .map(|lang| CoverageRow {
                language: lang.to_owned(),
                share: shares.as_ref().and_then(|s| s.get(lang).copied()),
                cells: vec![CoverageState::None; categories.len()],
            })
            .collect();

        for outcome in outcomes {
            let Some(col) = categories.iter().position(|c| *c == outcome.category) else {
                continue;
            };
            for row in &mut rows {
                let cell = &mut row.cells[col];
                if covers_exactly(outcome.scanner, &row.language) {
                    match outcome.succeeded {
                        Some(true) => cell.record_success(),
                        Some(false) => cell.record_failure(),
                        None => {}
                    }
                } else if contains_ignore_case(&outcome.scanner.languages_conditional, &row.language)
                {
                    cell.record_conditional();
                }
            }
        }

        rows.sort_by(|a, b| {
            let (pa, pb) = (a.share.unwrap_or(0.0), b.share.unwrap_or(0.0));
            pb.partial_cmp(&pa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.language.cmp(&b.language))
        });

        Some(Self { categories, rows })
    }

    pub fn row(&self, language: &str) -> Option<&CoverageRow> {
        self.rows.iter().find(|r| r.language == language)
    }

    pub fn state(&self, language: &str, category: AnalysisCategory) -> Option<CoverageState> {
        self.row(language).and_then(|r| r.cell(category))
    }
}

/// 행렬 밖에서 보고되는 저장소 수준 스캐너
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoLevelScanner {
    pub name: String,
    pub category: AnalysisCategory,
    pub success: bool,
}

/// 추적되지 않는 카테고리의 스캐너 중 결과가 있는 것 (선택 순서)
pub fn repo_level_scanners(outcomes: &[ScannerOutcome<'_>]) -> Vec<RepoLevelScanner> {
    outcomes
        .iter()
        .filter(|o| !o.category.is_matrix_tracked())
        .filter_map(|o| {
            o.succeeded.map(|success| RepoLevelScanner {
                name: o.scanner.name.clone(),
                category: o.category,
                success,
            })
        })
        .collect()
}

/// 비율 표시 문자열
pub fn share_label(pct: f64) -> String {
    if pct < 1.0 {
        "(<1%)".to_owned()
    } else {
        format!("({}%)", (pct + 0.5) as u64)
    }
}

fn covers_exactly(scanner: &ScannerConfig, language: &str) -> bool {
    scanner.is_universal() || contains_ignore_case(&scanner.languages, language)
}

fn contains_ignore_case(list: &[String], language: &str) -> bool {
    list.iter().any(|l| l.eq_ignore_ascii_case(language))
}
