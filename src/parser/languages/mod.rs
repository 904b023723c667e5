//! Compiled-in tree-sitter grammars and their node tables.
//!
//! Each language module provides:
//! - `grammar()`: loader for the grammar crate
//! - `PROFILE`: node-kind adjustments on top of the shared table

use super::structural::LanguageProfile;
use super::GrammarLoader;

pub mod c;
pub mod cpp;
pub mod go;
pub mod java;
pub mod javascript;
pub mod python;
pub mod rust_lang;
pub mod scala;
pub mod swift;
pub mod typescript;

static BUILTIN_GRAMMARS: &[(&str, GrammarLoader)] = &[
    ("c", c::grammar),
    ("cpp", cpp::grammar),
    ("go", go::grammar),
    ("java", java::grammar),
    ("javascript", javascript::grammar),
    ("python", python::grammar),
    ("rust", rust_lang::grammar),
    ("scala", scala::grammar),
    ("swift", swift::grammar),
    ("typescript", typescript::grammar),
    ("tsx", typescript::tsx_grammar),
];

/// Profile used for grammars registered at runtime without a dedicated table.
static DEFAULT_PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[],
    name_fields: &[],
};

/// Language ids paired with their grammar loaders.
pub fn builtin_grammars() -> &'static [(&'static str, GrammarLoader)] {
    BUILTIN_GRAMMARS
}

/// Node table for `language`.
pub fn profile(language: &str) -> &'static LanguageProfile {
    match language {
        "c" => &c::PROFILE,
        "cpp" => &cpp::PROFILE,
        "go" => &go::PROFILE,
        "java" => &java::PROFILE,
        "javascript" => &javascript::PROFILE,
        "python" => &python::PROFILE,
        "rust" => &rust_lang::PROFILE,
        "scala" => &scala::PROFILE,
        "swift" => &swift::PROFILE,
        "typescript" | "tsx" => &typescript::PROFILE,
        _ => &DEFAULT_PROFILE,
    }
}

/// Shared helper for the per-language tests.
#[cfg(test)]
pub(crate) fn extract(language: &str, loader: GrammarLoader, source: &str) -> crate::analysis::Extraction {
    use super::AnalyzerBackend;

    super::structural::StructuralBackend::load(language, loader)
        .unwrap()
        .analyze(source)
        .unwrap()
}
