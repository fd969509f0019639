//! 정규화된 언어 어휘
//!
//! 모든 감지 경로는 여기 정의된 소문자 이름으로 수렴합니다.

/// 파일 확장자 (소문자, 점 제외) → 언어
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let lang = match ext.to_ascii_lowercase().as_str() {
        "go" => "go",
        "py" | "pyw" | "pyx" => "python",
        "js" | "jsx" | "mjs" | "cjs" | "vue" | "svelte" => "javascript",
        "ts" | "tsx" | "mts" | "cts" => "typescript",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" | "hxx" => "cpp",
        "cs" => "csharp",
        "rb" | "rake" | "gemspec" => "ruby",
        "php" => "php",
        "rs" => "rust",
        "swift" => "swift",
        "scala" | "sc" => "scala",
        "sh" | "bash" | "zsh" => "shell",
        "pl" | "pm" => "perl",
        "lua" => "lua",
        "r" => "r",
        "ex" | "exs" => "elixir",
        "erl" | "hrl" => "erlang",
        "hs" | "lhs" => "haskell",
        "clj" | "cljs" | "cljc" => "clojure",
        "dart" => "dart",
        "m" | "mm" => "objective-c",
        "groovy" | "gvy" => "groovy",
        _ => return None,
    };
    Some(lang)
}

/// 매니페스트/잠금 파일 이름 → 언어
///
/// 확장자보다 먼저 확인합니다. `build.gradle.kts`가 `.kts` 확장자보다 우선하는 식입니다.
pub fn language_for_manifest(file_name: &str) -> Option<&'static str> {
    let lang = match file_name {
        "go.mod" | "go.sum" => "go",
        "package.json" | "package-lock.json" | "yarn.lock" | "pnpm-lock.yaml" => "javascript",
        "requirements.txt" | "setup.py" | "pyproject.toml" | "Pipfile" | "Pipfile.lock" => {
            "python"
        }
        "pom.xml" | "build.gradle" | "settings.gradle" => "java",
        "build.gradle.kts" => "kotlin",
        "Gemfile" | "Gemfile.lock" => "ruby",
        "composer.json" | "composer.lock" => "php",
        "Cargo.toml" | "Cargo.lock" => "rust",
        "Package.swift" => "swift",
        "build.sbt" => "scala",
        "mix.exs" => "elixir",
        "rebar.config" => "erlang",
        "pubspec.yaml" => "dart",
        "Makefile" | "CMakeLists.txt" => "c",
        _ => return None,
    };
    Some(lang)
}

/// 호스팅 서비스의 언어 이름 → 정규화된 이름
///
/// 모르는 이름은 소문자로 바꿔 그대로 사용합니다.
pub fn canonical_remote_name(name: &str) -> String {
    let mapped = match name {
        "C++" => "cpp",
        "C#" => "csharp",
        "Objective-C" => "objective-c",
        "Vue" | "Svelte" => "javascript",
        _ => return name.to_lowercase(),
    };
    mapped.to_owned()
}

/// 언어 감지 시 건너뛰는 디렉토리 (숨김 디렉토리는 별도로 건너뜀)
pub const SKIPPED_DIRS: [&str; 10] = [
    "node_modules",
    "vendor",
    "__pycache__",
    "venv",
    ".venv",
    "target",
    "build",
    "dist",
    "bin",
    "obj",
];

/// 디렉토리 이름이 감지 대상에서 제외되는지 여부
pub fn is_skipped_dir(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_lookup_is_case_insensitive() {
        assert_eq!(language_for_extension("R"), Some("r"));
        assert_eq!(language_for_extension("PY"), Some("python"));
        assert_eq!(language_for_extension("txt"), None);
    }

    #[test]
    fn manifest_lookup_is_exact() {
        assert_eq!(language_for_manifest("go.mod"), Some("go"));
        assert_eq!(language_for_manifest("build.gradle.kts"), Some("kotlin"));
        assert_eq!(language_for_manifest("gemfile"), None);
    }

    #[test]
    fn remote_names_map_to_vocabulary() {
        assert_eq!(canonical_remote_name("C++"), "cpp");
        assert_eq!(canonical_remote_name("C#"), "csharp");
        assert_eq!(canonical_remote_name("Go"), "go");
        assert_eq!(canonical_remote_name("Vue"), "javascript");
        assert_eq!(canonical_remote_name("HCL"), "hcl");
    }

    #[test]
    fn skipped_dirs() {
        assert!(is_skipped_dir(".git"));
        assert!(is_skipped_dir("node_modules"));
        assert!(is_skipped_dir("target"));
        assert!(!is_skipped_dir("src"));
    }
}
