//! Required environment variable check
//!
//! Runs before scanning. Missing variables do not stop the run by themselves:
//! the user is asked to confirm, and the affected scanners fail individually.

use std::io::{BufRead, Write};

use allscan_core::config::AllscanConfig;
use serde::Serialize;

/// Owner name used for the upload token entry.
pub const UPLOAD_OWNER: &str = "upload";

/// A scanner (or the uploader) whose required variable is unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingEnv {
    pub owner: String,
    pub var: String,
}

/// Reports the first missing variable per enabled scanner, plus the upload
/// token when uploading is configured and the run is not local.
pub fn missing_env(config: &AllscanConfig, local: bool) -> Vec<MissingEnv> {
    let mut missing: Vec<MissingEnv> = config
        .enabled_scanners()
        .filter_map(|scanner| {
            scanner.first_missing_env().map(|var| MissingEnv {
                owner: scanner.name.clone(),
                var: var.to_owned(),
            })
        })
        .collect();

    if !local && config.upload_configured() {
        let var = &config.general.upload_token_env;
        if std::env::var(var).map(|v| v.is_empty()).unwrap_or(true) {
            missing.push(MissingEnv {
                owner: UPLOAD_OWNER.to_owned(),
                var: var.clone(),
            });
        }
    }

    missing
}

/// Prints the missing variables and asks `Continue anyway? [y/N]:`.
///
/// Only `y` / `yes` (any case) continue; EOF declines.
pub fn confirm_continue(
    missing: &[MissingEnv],
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> std::io::Result<bool> {
    writeln!(out, "Missing required environment variables:")?;
    for entry in missing {
        writeln!(out, "  - {} (needed by {})", entry.var, entry.owner)?;
    }
    write!(out, "Continue anyway? [y/N]: ")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use allscan_core::config::ScannerConfig;
    use serial_test::serial;

    fn config_with(required: &[&str], endpoint: &str) -> AllscanConfig {
        let mut config = AllscanConfig::default();
        config.general.upload_endpoint = endpoint.to_owned();
        config.general.upload_token_env = "ALLSCAN_TEST_UPLOAD_TOKEN".to_owned();
        config.scanners = vec![
            ScannerConfig {
                name: "scorecard".to_owned(),
                command: "scorecard".to_owned(),
                required_env: required.iter().map(|s| (*s).to_owned()).collect(),
                ..ScannerConfig::default()
            },
            ScannerConfig {
                name: "disabled".to_owned(),
                enabled: false,
                required_env: vec!["ALLSCAN_TEST_NEVER_SET".to_owned()],
                ..ScannerConfig::default()
            },
        ];
        config
    }

    #[test]
    #[serial]
    fn reports_first_missing_per_scanner() {
        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe {
            std::env::remove_var("ALLSCAN_TEST_GH_TOKEN");
            std::env::remove_var("ALLSCAN_TEST_OTHER");
        }
        let config = config_with(&["ALLSCAN_TEST_GH_TOKEN", "ALLSCAN_TEST_OTHER"], "");
        let missing = missing_env(&config, false);
        assert_eq!(
            missing,
            vec![MissingEnv {
                owner: "scorecard".to_owned(),
                var: "ALLSCAN_TEST_GH_TOKEN".to_owned(),
            }]
        );
    }

    #[test]
    #[serial]
    fn upload_token_checked_only_for_remote_runs() {
        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe {
            std::env::remove_var("ALLSCAN_TEST_UPLOAD_TOKEN");
        }
        let config = config_with(&[], "https://vuln.example/api/v2/import-scan/");
        let remote = missing_env(&config, false);
        assert_eq!(remote.len(), 1);
        assert_eq!(remote[0].owner, UPLOAD_OWNER);
        assert!(missing_env(&config, true).is_empty());

        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe {
            std::env::set_var("ALLSCAN_TEST_UPLOAD_TOKEN", "secret");
        }
        assert!(missing_env(&config, false).is_empty());
        // SAFETY: serial_test로 환경변수 테스트를 직렬 실행합니다.
        unsafe {
            std::env::remove_var("ALLSCAN_TEST_UPLOAD_TOKEN");
        }
    }

    #[test]
    fn confirm_accepts_only_yes() {
        let missing = vec![MissingEnv {
            owner: "scorecard".to_owned(),
            var: "GITHUB_TOKEN".to_owned(),
        }];
        for (input, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
            let mut out = Vec::new();
            let answer = confirm_continue(&missing, &mut input.as_bytes(), &mut out).unwrap();
            assert_eq!(answer, expected, "input {input:?}");
            let text = String::from_utf8(out).unwrap();
            assert!(text.contains("GITHUB_TOKEN (needed by scorecard)"));
            assert!(text.ends_with("Continue anyway? [y/N]: "));
        }
    }
}
