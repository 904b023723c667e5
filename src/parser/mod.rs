//! Analysis backends and the per-language registry that orders them.
//!
//! This module provides:
//! - `AnalyzerBackend` trait: one analysis strategy for one language
//! - `ParserBackendRegistry`: resolves a language id to its ordered backends
//! - Tree-sitter structural backends (feature `tree-sitter`)
//! - Regex heuristic backends and the generic fallback
//!
//! Resolution order for a language is: caller-registered backends, the
//! structural backend (if a grammar is compiled in and loads), the
//! language's heuristic backend, and finally the generic backend. The list
//! is therefore never empty.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::{BackendId, Extraction};

pub mod heuristic;

#[cfg(feature = "tree-sitter")]
pub mod languages;
#[cfg(feature = "tree-sitter")]
pub mod structural;

/// Why a backend could not produce an extraction.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{backend} backend unavailable for {language}: {reason}")]
    Unavailable {
        backend: String,
        language: String,
        reason: String,
    },

    #[error("failed to parse {language} source: {reason}")]
    ParseFailed { language: String, reason: String },

    #[error("extraction failed: {0}")]
    Extraction(String),
}

/// One concrete analysis strategy for a language.
pub trait AnalyzerBackend: Send + Sync {
    /// Which class of strategy this is; recorded as `backend_used`.
    fn id(&self) -> BackendId;

    /// Short descriptive name for logs, e.g. `tree-sitter/python`.
    fn name(&self) -> String;

    /// Extract elements from `source`.
    fn analyze(&self, source: &str) -> Result<Extraction, BackendError>;
}

/// Loads a compiled-in tree-sitter grammar.
#[cfg(feature = "tree-sitter")]
pub type GrammarLoader = fn() -> anyhow::Result<tree_sitter::Language>;

/// Ordered backend lists per language id.
///
/// Structural backends are loaded at most once per language. A language
/// whose grammar fails to load is remembered and never retried.
pub struct ParserBackendRegistry {
    extra: RwLock<HashMap<String, Vec<Arc<dyn AnalyzerBackend>>>>,
    #[cfg(feature = "tree-sitter")]
    grammars: RwLock<HashMap<String, GrammarLoader>>,
    #[cfg(feature = "tree-sitter")]
    loaded: RwLock<HashMap<String, Arc<structural::StructuralBackend>>>,
    failed: RwLock<HashSet<String>>,
    disabled: HashSet<String>,
    heuristics: HashMap<&'static str, Arc<dyn AnalyzerBackend>>,
    generic: Arc<dyn AnalyzerBackend>,
}

static SHARED: OnceCell<Arc<ParserBackendRegistry>> = OnceCell::new();

impl ParserBackendRegistry {
    /// Create a registry with every built-in grammar and heuristic.
    pub fn new() -> Self {
        Self {
            extra: RwLock::new(HashMap::new()),
            #[cfg(feature = "tree-sitter")]
            grammars: RwLock::new(
                languages::builtin_grammars()
                    .iter()
                    .map(|(lang, loader)| (lang.to_string(), *loader))
                    .collect(),
            ),
            #[cfg(feature = "tree-sitter")]
            loaded: RwLock::new(HashMap::new()),
            failed: RwLock::new(HashSet::new()),
            disabled: HashSet::new(),
            heuristics: heuristic::builtin_backends(),
            generic: Arc::new(heuristic::GenericBackend),
        }
    }

    /// Never use the structural backend for these languages.
    pub fn with_disabled_grammars<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(languages.into_iter().map(Into::into));
        self
    }

    /// Process-wide registry with default settings.
    pub fn shared() -> Arc<Self> {
        SHARED.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Put `backend` ahead of the built-in backends for `language`.
    ///
    /// Later registrations run after earlier ones.
    pub fn register_backend(&self, language: &str, backend: Arc<dyn AnalyzerBackend>) {
        self.extra
            .write()
            .entry(language.to_string())
            .or_default()
            .push(backend);
    }

    /// Add or replace the grammar loader for `language`.
    ///
    /// Clears any cached load result, so the next resolve tries the new loader.
    #[cfg(feature = "tree-sitter")]
    pub fn register_grammar(&self, language: &str, loader: GrammarLoader) {
        self.grammars.write().insert(language.to_string(), loader);
        self.loaded.write().remove(language);
        self.failed.write().remove(language);
    }

    /// Ordered backends for `language`. Always ends with the generic backend.
    pub fn resolve(&self, language: &str) -> Vec<Arc<dyn AnalyzerBackend>> {
        let mut backends: Vec<Arc<dyn AnalyzerBackend>> = self
            .extra
            .read()
            .get(language)
            .cloned()
            .unwrap_or_default();

        #[cfg(feature = "tree-sitter")]
        if let Some(backend) = self.structural(language) {
            backends.push(backend);
        }

        if let Some(backend) = self.heuristics.get(language) {
            backends.push(backend.clone());
        }

        backends.push(self.generic.clone());
        debug!(
            language,
            backends = ?backends.iter().map(|b| b.name()).collect::<Vec<_>>(),
            "resolved backends"
        );
        backends
    }

    #[cfg(feature = "tree-sitter")]
    fn structural(&self, language: &str) -> Option<Arc<dyn AnalyzerBackend>> {
        if self.disabled.contains(language) || self.failed.read().contains(language) {
            return None;
        }

        if let Some(backend) = self.loaded.read().get(language) {
            return Some(backend.clone() as Arc<dyn AnalyzerBackend>);
        }

        let loader = *self.grammars.read().get(language)?;

        let mut loaded = self.loaded.write();
        // Another thread may have finished the load while we waited.
        if let Some(backend) = loaded.get(language) {
            return Some(backend.clone() as Arc<dyn AnalyzerBackend>);
        }
        if self.failed.read().contains(language) {
            return None;
        }

        match structural::StructuralBackend::load(language, loader) {
            Ok(backend) => {
                debug!(language, "loaded tree-sitter grammar");
                let backend = Arc::new(backend);
                loaded.insert(language.to_string(), backend.clone());
                Some(backend as Arc<dyn AnalyzerBackend>)
            }
            Err(e) => {
                warn!(language, error = %e, "grammar unavailable, using heuristic analysis");
                self.failed.write().insert(language.to_string());
                None
            }
        }
    }

    /// Languages whose grammar failed to load, sorted.
    pub fn failed_languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self.failed.read().iter().cloned().collect();
        langs.sort();
        langs
    }

    /// Languages with a usable (not disabled, not failed) grammar, sorted.
    pub fn structural_languages(&self) -> Vec<String> {
        #[cfg(feature = "tree-sitter")]
        {
            let failed = self.failed.read();
            let mut langs: Vec<String> = self
                .grammars
                .read()
                .keys()
                .filter(|lang| !self.disabled.contains(*lang) && !failed.contains(*lang))
                .cloned()
                .collect();
            langs.sort();
            langs
        }

        #[cfg(not(feature = "tree-sitter"))]
        {
            Vec::new()
        }
    }

    /// Whether a language-specific heuristic backend exists.
    pub fn has_heuristic(&self, language: &str) -> bool {
        self.heuristics.contains_key(language)
    }
}

impl Default for ParserBackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
