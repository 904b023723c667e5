//! astcache - structural analysis with a persistent AST cache.
//!
//! astcache extracts functions, classes, imports and variables from source
//! files in many languages, caches each file's analysis per project keyed by
//! a hash of its content, and applies instructions to individual elements
//! by replacing their line ranges with text from an external rewriter.
//!
//! # Architecture
//!
//! - `language`: file path to language id
//! - `parser`: analyzer backends (tree-sitter grammars, regex heuristics,
//!   the generic line counter) and the registry that orders them
//! - `analysis`: the `FileAnalysis` model and `LanguageAnalyzer`
//! - `cache`: per-project JSON cache and the registry of project caches
//! - `modify`: target selection and bottom-up element replacement
//! - `config`: YAML configuration
//! - `report`: output formatting (pretty, JSON)
//!
//! # Adding a New Language
//!
//! See `src/parser/languages/` for node-kind profiles. Add a profile and a
//! grammar loader there, and a regex family in `parser/heuristic.rs` for
//! builds without tree-sitter.

pub mod analysis;
pub mod cache;
pub mod cli;
pub mod config;
pub mod language;
pub mod modify;
pub mod parser;
pub mod report;

pub use analysis::{BackendId, Element, ElementKind, FileAnalysis, LanguageAnalyzer, Scope};
pub use cache::{CacheError, GlobalCacheRegistry, ProjectCache};
pub use config::Config;
pub use language::detect as detect_language;
pub use modify::{
    CommandRewriter, ModificationResult, RewriteError, RewriteRequest, Rewriter, TargetedModifier,
};
pub use parser::{AnalyzerBackend, BackendError, ParserBackendRegistry};
