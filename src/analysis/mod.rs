//! Source analysis.
//!
//! This module provides:
//! - `LanguageAnalyzer`: runs the backends resolved for a language in order
//!   and normalizes the first successful extraction into a `FileAnalysis`
//! - The element and analysis types persisted by the cache
//! - Per-language keyword blocklists
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────────────┐     ┌──────────────┐
//! │ source, lang │────▶│ ParserBackendRegistry│────▶│ Extraction   │
//! └──────────────┘     │ structural > regex > │     │ (raw, per    │
//!                      │ generic              │     │  backend)    │
//!                      └──────────────────────┘     └──────────────┘
//!                                                          │
//!                                                          ▼
//!                                                   ┌──────────────┐
//!                                                   │ FileAnalysis │
//!                                                   │ (normalized) │
//!                                                   └──────────────┘
//! ```

mod analyzer;
mod facts;
pub mod keywords;

pub use analyzer::{content_hash, count_lines, LanguageAnalyzer, DEFAULT_VARIABLE_CAP};
pub use facts::{BackendId, Element, ElementKind, Extraction, FileAnalysis, Scope};
