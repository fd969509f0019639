//! 엔진 벤치마크
//!
//! ls-remote 출력 파싱, 결과 파싱, 커버리지 매트릭스 계산 성능을 측정합니다.

use std::collections::BTreeMap;

use allscan_core::config::ScannerConfig;
use allscan_core::types::AnalysisCategory;
use allscan_engine::coverage::{CoverageMatrix, ScannerOutcome};
use allscan_engine::language::{DetectedLanguageSet, LanguageSource};
use allscan_engine::parser::ResultParser;
use allscan_engine::target::refs::parse_ls_remote;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

fn ls_remote_output(tags: usize) -> String {
    (0..tags)
        .rev()
        .map(|i| {
            format!(
                "{:040x}\trefs/tags/v1.{i}.0\n{:040x}\trefs/tags/v1.{i}.0^{{}}\n",
                i * 2,
                i * 2 + 1
            )
        })
        .collect()
}

fn grype_report(matches: usize) -> String {
    let severities = ["Critical", "High", "Medium", "Low", "Negligible"];
    let items: Vec<String> = (0..matches)
        .map(|i| {
            format!(
                r#"{{"vulnerability":{{"id":"CVE-2026-{i}","severity":"{}"}}}}"#,
                severities[i % severities.len()]
            )
        })
        .collect();
    format!(r#"{{"matches":[{}]}}"#, items.join(","))
}

fn bench_parse_ls_remote(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_ls_remote");
    for tags in [10, 100, 1000] {
        let output = ls_remote_output(tags);
        group.throughput(Throughput::Bytes(output.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tags), &output, |b, output| {
            b.iter(|| parse_ls_remote(black_box(output)));
        });
    }
    group.finish();
}

fn bench_parse_grype(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_grype");
    for matches in [10, 1000] {
        let report = grype_report(matches);
        group.throughput(Throughput::Bytes(report.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(matches), &report, |b, report| {
            b.iter(|| ResultParser::Grype.parse(black_box(report.as_bytes())));
        });
    }
    group.finish();
}

fn bench_coverage(c: &mut Criterion) {
    let languages = [
        "go", "python", "javascript", "typescript", "java", "rust", "ruby", "php", "c", "cpp",
    ];
    let weights: BTreeMap<String, u64> = languages
        .iter()
        .enumerate()
        .map(|(i, l)| ((*l).to_owned(), (i as u64 + 1) * 1000))
        .collect();
    let detected = DetectedLanguageSet::new(LanguageSource::Remote, weights);

    let scanners: Vec<ScannerConfig> = languages
        .iter()
        .map(|l| ScannerConfig {
            name: format!("sast-{l}"),
            languages: vec![(*l).to_owned()],
            languages_conditional: vec!["go".to_owned()],
            ..ScannerConfig::default()
        })
        .chain(std::iter::once(ScannerConfig {
            name: "grype".to_owned(),
            ..ScannerConfig::default()
        }))
        .collect();
    let outcomes: Vec<ScannerOutcome<'_>> = scanners
        .iter()
        .enumerate()
        .map(|(i, scanner)| ScannerOutcome {
            scanner,
            category: if scanner.name == "grype" {
                AnalysisCategory::Sca
            } else {
                AnalysisCategory::Sast
            },
            succeeded: Some(i % 3 != 0),
        })
        .collect();

    c.bench_function("coverage_matrix_10_languages", |b| {
        b.iter(|| CoverageMatrix::compute(black_box(&detected), black_box(&outcomes)));
    });
}

criterion_group!(benches, bench_parse_ls_remote, bench_parse_grype, bench_coverage);
criterion_main!(benches);
