//! Built-in binary artifact detector and its report parser.
//!
//! The detector walks a working copy, skipping hidden files and directories,
//! and flags a file when its extension is a known binary format or, failing
//! that, when its first 8 KiB contain a NUL byte.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use allscan_core::types::FindingSummary;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::EngineError;

/// Name after `builtin:` in the scanner command.
pub const BUILTIN_NAME: &str = "binary-detector";

/// Bytes inspected for NUL when the extension is not conclusive.
pub const SNIFF_LEN: usize = 8192;

const BINARY_EXTENSIONS: [&str; 27] = [
    "exe", "dll", "so", "dylib", "a", "o", "obj", "bin", "com", "class", "pyc", "pyo", "jar",
    "war", "ear", "whl", "egg", "deb", "rpm", "msi", "dmg", "pkg", "app", "ipa", "apk", "wasm",
    "node",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryFile {
    /// Path relative to the repository root.
    pub path: String,
    pub size: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryReport {
    #[serde(default)]
    pub binaries: Vec<BinaryFile>,
    #[serde(default)]
    pub total: usize,
}

/// Every flagged binary counts as one medium finding.
pub fn parse_binary_report(data: &[u8]) -> Result<FindingSummary, serde_json::Error> {
    let report: BinaryReport = serde_json::from_slice(data)?;
    Ok(FindingSummary {
        medium: report.total,
        total: report.total,
        ..FindingSummary::default()
    })
}

/// Scans `root` and returns the flagged files, sorted by path.
pub fn detect_binaries(root: &Path) -> Result<BinaryReport, EngineError> {
    if !root.is_dir() {
        return Err(EngineError::io(
            root,
            std::io::Error::new(std::io::ErrorKind::NotFound, "repository path is not a directory"),
        ));
    }

    let mut binaries = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

    // Unreadable entries are skipped.
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let reason = match binary_extension(path) {
            Some(ext) => format!("binary extension: .{ext}"),
            None if has_nul_prefix(path) => "binary content detected".to_owned(),
            None => continue,
        };
        let rel = path.strip_prefix(root).unwrap_or(path);
        binaries.push(BinaryFile {
            path: rel.to_string_lossy().into_owned(),
            size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            reason,
        });
    }

    let total = binaries.len();
    Ok(BinaryReport { binaries, total })
}

/// Runs the detector and writes the pretty-printed report to `output`.
///
/// Returns the number of flagged files.
pub fn run_binary_detector(root: &Path, output: &Path) -> Result<usize, EngineError> {
    let report = detect_binaries(root)?;
    let json = serde_json::to_vec_pretty(&report).map_err(|e| EngineError::Parse {
        tool: BUILTIN_NAME.to_owned(),
        reason: e.to_string(),
    })?;
    std::fs::write(output, json).map_err(|e| EngineError::io(output, e))?;
    Ok(report.total)
}

fn binary_extension(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_string_lossy().to_ascii_lowercase();
    BINARY_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn has_nul_prefix(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut buf = Vec::with_capacity(SNIFF_LEN);
    match file.take(SNIFF_LEN as u64).read_to_end(&mut buf) {
        Ok(_) => buf.contains(&0),
        Err(_) => false,
    }
}
