//! File path to language identifier mapping.
//!
//! Resolution order:
//! 1. Exact (case-insensitive) match of the file name against well-known
//!    extensionless names such as `Makefile` or `Dockerfile`.
//! 2. Longest matching extension suffix (`.d.ts` wins over `.ts`).
//! 3. [`UNKNOWN`].

use std::collections::BTreeSet;
use std::path::Path;

use phf::phf_map;

/// Language id returned when nothing matches.
pub const UNKNOWN: &str = "unknown";

/// Conventional file names that carry no (useful) extension.
static SPECIAL_FILES: phf::Map<&'static str, &'static str> = phf_map! {
    "dockerfile" => "dockerfile",
    "makefile" => "make",
    "gnumakefile" => "make",
    "cmake" => "cmake",
    "cmakelists.txt" => "cmake",
    "rakefile" => "ruby",
    "gemfile" => "ruby",
    "vagrantfile" => "ruby",
    "requirements.txt" => "text",
    "package.json" => "json",
    "composer.json" => "json",
    "tsconfig.json" => "json",
    ".gitignore" => "gitignore",
    ".dockerignore" => "gitignore",
    ".env" => "dotenv",
};

/// Extension (with leading dot, lowercase) to language id.
static EXTENSIONS: phf::Map<&'static str, &'static str> = phf_map! {
    // Web
    ".js" => "javascript",
    ".jsx" => "javascript",
    ".mjs" => "javascript",
    ".cjs" => "javascript",
    ".ts" => "typescript",
    ".mts" => "typescript",
    ".d.ts" => "typescript",
    ".tsx" => "tsx",
    ".html" => "html",
    ".htm" => "html",
    ".xhtml" => "html",
    ".css" => "css",
    ".scss" => "scss",
    ".sass" => "sass",
    ".less" => "css",
    ".styl" => "stylus",

    // Backend
    ".py" => "python",
    ".pyx" => "python",
    ".pyi" => "python",
    ".java" => "java",
    ".kt" => "kotlin",
    ".kts" => "kotlin",
    ".scala" => "scala",
    ".sc" => "scala",
    ".cpp" => "cpp",
    ".cc" => "cpp",
    ".cxx" => "cpp",
    ".c++" => "cpp",
    ".hpp" => "cpp",
    ".hxx" => "cpp",
    ".hh" => "cpp",
    ".c" => "c",
    ".h" => "c",
    ".cs" => "c_sharp",
    ".php" => "php",
    ".php3" => "php",
    ".php4" => "php",
    ".php5" => "php",
    ".rb" => "ruby",
    ".rbw" => "ruby",
    ".go" => "go",
    ".rs" => "rust",
    ".swift" => "swift",
    ".m" => "objective_c",
    ".mm" => "objective_c",

    // Functional
    ".hs" => "haskell",
    ".lhs" => "haskell",
    ".ml" => "ocaml",
    ".mli" => "ocaml",
    ".fs" => "fsharp",
    ".fsx" => "fsharp",
    ".clj" => "clojure",
    ".cljs" => "clojure",
    ".cljc" => "clojure",
    ".erl" => "erlang",
    ".hrl" => "erlang",
    ".ex" => "elixir",
    ".exs" => "elixir",
    ".elm" => "elm",

    // Data and config
    ".json" => "json",
    ".jsonc" => "json",
    ".json5" => "json",
    ".xml" => "xml",
    ".xsd" => "xml",
    ".xsl" => "xml",
    ".yaml" => "yaml",
    ".yml" => "yaml",
    ".toml" => "toml",
    ".ini" => "ini",
    ".cfg" => "ini",
    ".conf" => "ini",
    ".properties" => "properties",

    // Shell
    ".sh" => "bash",
    ".bash" => "bash",
    ".zsh" => "bash",
    ".fish" => "fish",
    ".ps1" => "powershell",
    ".psm1" => "powershell",
    ".psd1" => "powershell",

    // Database
    ".sql" => "sql",
    ".psql" => "sql",
    ".mysql" => "sql",

    // Other
    ".r" => "r",
    ".lua" => "lua",
    ".dart" => "dart",
    ".vim" => "vim",
    ".dockerfile" => "dockerfile",
    ".md" => "markdown",
    ".markdown" => "markdown",
    ".tex" => "latex",
    ".jl" => "julia",
    ".pl" => "perl",
    ".pm" => "perl",
    ".zig" => "zig",
    ".nim" => "nim",
    ".cr" => "crystal",
    ".d" => "d",
    ".pas" => "pascal",
    ".pp" => "pascal",
    ".ada" => "ada",
    ".adb" => "ada",
    ".ads" => "ada",
    ".f" => "fortran",
    ".f90" => "fortran",
    ".f95" => "fortran",
    ".cob" => "cobol",
    ".cbl" => "cobol",
};

/// Detect the language of a file from its path.
///
/// Never fails: returns [`UNKNOWN`] when no rule matches.
pub fn detect<P: AsRef<Path>>(path: P) -> &'static str {
    let file_name = match path.as_ref().file_name().and_then(|n| n.to_str()) {
        Some(name) => name.to_lowercase(),
        None => return UNKNOWN,
    };

    if let Some(lang) = SPECIAL_FILES.get(file_name.as_str()) {
        return *lang;
    }

    // Leftmost dot gives the longest suffix. A leading dot alone (".bashrc")
    // is a hidden-file marker, not an extension.
    for (idx, _) in file_name.match_indices('.') {
        if idx == 0 {
            continue;
        }
        if let Some(lang) = EXTENSIONS.get(&file_name[idx..]) {
            return *lang;
        }
    }

    UNKNOWN
}

/// All language ids the detector can produce, sorted.
pub fn supported_languages() -> Vec<&'static str> {
    let langs: BTreeSet<&'static str> = EXTENSIONS
        .values()
        .chain(SPECIAL_FILES.values())
        .copied()
        .collect();
    langs.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_by_extension() {
        assert_eq!(detect("src/app.py"), "python");
        assert_eq!(detect("web/index.tsx"), "tsx");
        assert_eq!(detect("lib/util.c++"), "cpp");
        assert_eq!(detect("main.go"), "go");
        assert_eq!(detect("Program.cs"), "c_sharp");
    }

    #[test]
    fn test_detect_is_case_insensitive() {
        assert_eq!(detect("analysis.R"), "r");
        assert_eq!(detect("MAIN.RS"), "rust");
        assert_eq!(detect("build/MAKEFILE"), "make");
    }

    #[test]
    fn test_special_files_win_over_extensions() {
        assert_eq!(detect("CMakeLists.txt"), "cmake");
        assert_eq!(detect("requirements.txt"), "text");
        assert_eq!(detect("Dockerfile"), "dockerfile");
        assert_eq!(detect("project/.gitignore"), "gitignore");
    }

    #[test]
    fn test_longest_extension_match() {
        assert_eq!(detect("types/index.d.ts"), "typescript");
        assert_eq!(detect("archive.backup.json"), "json");
    }

    #[test]
    fn test_unknown() {
        assert_eq!(detect("README"), UNKNOWN);
        assert_eq!(detect("notes.weird"), UNKNOWN);
        assert_eq!(detect(".bashrc"), UNKNOWN);
        assert_eq!(detect(""), UNKNOWN);
    }

    #[test]
    fn test_supported_languages() {
        let langs = supported_languages();
        assert!(langs.contains(&"python"));
        assert!(langs.contains(&"make"));
        assert!(!langs.contains(&UNKNOWN));
        let mut sorted = langs.clone();
        sorted.sort();
        assert_eq!(langs, sorted);
    }
}
