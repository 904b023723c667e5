//! Backend dispatch and normalization.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::keywords::is_keyword;
use super::{BackendId, Element, Extraction, FileAnalysis};
use crate::language;
use crate::parser::{AnalyzerBackend, ParserBackendRegistry};

/// Variables kept per file unless configured otherwise.
pub const DEFAULT_VARIABLE_CAP: usize = 20;

/// SHA-256 hex digest of `source`.
pub fn content_hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

/// Number of `'\n'`-separated segments. The empty string has one line.
pub fn count_lines(source: &str) -> usize {
    source.split('\n').count()
}

/// Turns source text into a [`FileAnalysis`].
///
/// Never fails: if every backend errors, the result is an empty analysis
/// flagged with `has_syntax_errors` and [`BackendId::Failed`].
pub struct LanguageAnalyzer {
    registry: Arc<ParserBackendRegistry>,
    variable_cap: usize,
}

impl LanguageAnalyzer {
    pub fn new(registry: Arc<ParserBackendRegistry>) -> Self {
        Self {
            registry,
            variable_cap: DEFAULT_VARIABLE_CAP,
        }
    }

    /// Keep at most `cap` variables per file.
    pub fn with_variable_cap(mut self, cap: usize) -> Self {
        self.variable_cap = cap;
        self
    }

    pub fn registry(&self) -> &Arc<ParserBackendRegistry> {
        &self.registry
    }

    /// Analyze `source` as `language`.
    pub fn analyze(&self, source: &str, language: &str) -> FileAnalysis {
        let backends = self.registry.resolve(language);
        self.analyze_with_backends(source, language, "", &backends)
    }

    /// Detect the language of `path` and analyze `source` as that file.
    ///
    /// `file_path` is set on the analysis and on every element.
    pub fn analyze_file<P: AsRef<Path>>(&self, path: P, source: &str) -> FileAnalysis {
        let path = path.as_ref();
        let language = language::detect(path);
        let backends = self.registry.resolve(language);
        self.analyze_with_backends(source, language, &path.to_string_lossy(), &backends)
    }

    pub(crate) fn analyze_with_backends(
        &self,
        source: &str,
        language: &str,
        file_path: &str,
        backends: &[Arc<dyn AnalyzerBackend>],
    ) -> FileAnalysis {
        for backend in backends {
            match backend.analyze(source) {
                Ok(extraction) => {
                    debug!(language, backend = %backend.name(), file = file_path, "analyzed");
                    return self.normalize(source, language, file_path, extraction, backend.id());
                }
                Err(e) => {
                    warn!(
                        language,
                        backend = %backend.name(),
                        error = %e,
                        "backend failed, trying next"
                    );
                }
            }
        }

        warn!(language, file = file_path, "every backend failed");
        let extraction = Extraction {
            has_syntax_errors: true,
            ..Extraction::default()
        };
        self.normalize(source, language, file_path, extraction, BackendId::Failed)
    }

    fn normalize(
        &self,
        source: &str,
        language: &str,
        file_path: &str,
        mut extraction: Extraction,
        backend: BackendId,
    ) -> FileAnalysis {
        let named = |el: &Element| !is_keyword(&el.name, language);
        extraction.functions.retain(named);
        extraction.classes.retain(named);
        extraction.variables.retain(named);
        for class in extraction.classes.iter_mut() {
            class.methods.retain(|m| !is_keyword(m, language));
        }

        for list in [
            &mut extraction.functions,
            &mut extraction.classes,
            &mut extraction.imports,
            &mut extraction.variables,
        ] {
            list.sort_by(|a, b| (a.start_line, &a.name).cmp(&(b.start_line, &b.name)));
            for el in list.iter_mut() {
                el.file_path = file_path.to_string();
            }
        }
        extraction.variables.truncate(self.variable_cap);

        let complexity =
            extraction.branch_count + extraction.functions.len() + 2 * extraction.classes.len();
        let has_syntax_errors = extraction.has_syntax_errors
            && (backend.is_structural() || backend == BackendId::Failed);

        FileAnalysis {
            file_path: file_path.to_string(),
            language: language.to_string(),
            content_hash: content_hash(source),
            analyzed_at: Utc::now(),
            functions: extraction.functions,
            classes: extraction.classes,
            imports: extraction.imports,
            variables: extraction.variables,
            total_lines: count_lines(source),
            non_empty_lines: source.lines().filter(|l| !l.trim().is_empty()).count(),
            word_count: source.split_whitespace().count(),
            complexity_score: u32::try_from(complexity).unwrap_or(u32::MAX),
            has_syntax_errors,
            backend_used: backend,
        }
    }
}

impl Default for LanguageAnalyzer {
    fn default() -> Self {
        Self::new(ParserBackendRegistry::shared())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ElementKind;
    use crate::parser::BackendError;

    struct Fixed(Extraction);

    impl AnalyzerBackend for Fixed {
        fn id(&self) -> BackendId {
            BackendId::Heuristic
        }

        fn name(&self) -> String {
            "fixed".to_string()
        }

        fn analyze(&self, _source: &str) -> Result<Extraction, BackendError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl AnalyzerBackend for Broken {
        fn id(&self) -> BackendId {
            BackendId::Structural
        }

        fn name(&self) -> String {
            "broken".to_string()
        }

        fn analyze(&self, _source: &str) -> Result<Extraction, BackendError> {
            Err(BackendError::ParseFailed {
                language: "test".to_string(),
                reason: "boom".to_string(),
            })
        }
    }

    fn analyzer_with(language: &str, backend: Arc<dyn AnalyzerBackend>) -> LanguageAnalyzer {
        let registry = ParserBackendRegistry::new();
        registry.register_backend(language, backend);
        LanguageAnalyzer::new(Arc::new(registry))
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash("a"), content_hash("a\n"));
    }

    #[test]
    fn test_empty_file() {
        let analysis = LanguageAnalyzer::default().analyze("", "python");
        assert_eq!(analysis.total_lines, 1);
        assert_eq!(analysis.element_count(), 0);
        assert!(!analysis.has_syntax_errors);
    }

    #[test]
    fn test_unknown_language_falls_back_to_generic() {
        let source = "alpha\nbeta gamma\n\nfunction go() {\n}\n";
        let analysis = LanguageAnalyzer::default().analyze(source, "unknown");

        assert_eq!(analysis.backend_used, BackendId::Generic);
        assert_eq!(analysis.total_lines, 6);
        assert_eq!(analysis.non_empty_lines, 4);
        assert_eq!(analysis.word_count, 7);
        assert!(analysis.functions.iter().any(|f| f.name == "go"));
    }

    #[test]
    fn test_capitalized_class_names_survive() {
        let analyzer = LanguageAnalyzer::default();

        let py = analyzer.analyze("class Match:\n    pass\n", "python");
        let names: Vec<_> = py.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Match"]);

        let java = analyzer.analyze("class Record {}\n", "java");
        let names: Vec<_> = java.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Record"]);
    }

    #[test]
    fn test_keyword_names_are_dropped() {
        let mut ex = Extraction::default();
        ex.push(Element::new(ElementKind::Function, "if", 1, 2));
        ex.push(Element::new(ElementKind::Function, "add", 3, 4));
        let mut class = Element::new(ElementKind::Class, "Shape", 5, 9);
        class.methods = vec!["area".to_string(), "while".to_string()];
        ex.push(class);

        let analysis = analyzer_with("mocklang", Arc::new(Fixed(ex))).analyze("", "mocklang");

        let names: Vec<_> = analysis.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["add"]);
        assert_eq!(analysis.classes[0].methods, vec!["area"]);
    }

    #[test]
    fn test_variables_are_capped_in_source_order() {
        let mut ex = Extraction::default();
        for line in (1..=30).rev() {
            ex.push(Element::new(ElementKind::Variable, format!("v{}", line), line, line));
        }
        let backend: Arc<dyn AnalyzerBackend> = Arc::new(Fixed(ex));

        let analysis = analyzer_with("mocklang", backend.clone()).analyze("", "mocklang");
        assert_eq!(analysis.variables.len(), DEFAULT_VARIABLE_CAP);
        assert_eq!(analysis.variables[0].name, "v1");

        let analysis = analyzer_with("mocklang", backend)
            .with_variable_cap(5)
            .analyze("", "mocklang");
        assert_eq!(analysis.variables.len(), 5);
    }

    #[test]
    fn test_complexity_score() {
        let mut ex = Extraction {
            branch_count: 3,
            ..Extraction::default()
        };
        ex.push(Element::new(ElementKind::Function, "one", 1, 1));
        ex.push(Element::new(ElementKind::Function, "two", 2, 2));
        ex.push(Element::new(ElementKind::Class, "Three", 3, 3));

        let analysis = analyzer_with("mocklang", Arc::new(Fixed(ex))).analyze("", "mocklang");
        assert_eq!(analysis.complexity_score, 7);
    }

    #[test]
    fn test_heuristic_results_never_claim_syntax_errors() {
        let ex = Extraction {
            has_syntax_errors: true,
            ..Extraction::default()
        };
        let analysis = analyzer_with("mocklang", Arc::new(Fixed(ex))).analyze("x", "mocklang");
        assert!(!analysis.has_syntax_errors);
    }

    #[test]
    fn test_failed_backend_falls_through() {
        let analysis = analyzer_with("mocklang", Arc::new(Broken)).analyze("a\nb", "mocklang");
        assert_eq!(analysis.backend_used, BackendId::Generic);
        assert_eq!(analysis.total_lines, 2);
    }

    #[test]
    fn test_all_backends_failing_yields_degenerate_analysis() {
        let analyzer = LanguageAnalyzer::default();
        let backends: Vec<Arc<dyn AnalyzerBackend>> = vec![Arc::new(Broken), Arc::new(Broken)];

        let analysis = analyzer.analyze_with_backends("def f():\n", "python", "f.py", &backends);

        assert_eq!(analysis.backend_used, BackendId::Failed);
        assert!(analysis.has_syntax_errors);
        assert_eq!(analysis.element_count(), 0);
        assert_eq!(analysis.total_lines, 2);
        assert_eq!(analysis.file_path, "f.py");
    }

    #[test]
    fn test_analyze_file_sets_paths() {
        let analysis = LanguageAnalyzer::default()
            .analyze_file("src/calc.py", "def add(a, b): return a + b\n");

        assert_eq!(analysis.language, "python");
        assert_eq!(analysis.file_path, "src/calc.py");
        assert!(analysis.functions.iter().all(|f| f.file_path == "src/calc.py"));
    }

    #[cfg(feature = "tree-sitter")]
    #[test]
    fn test_calc_scenario_is_structural() {
        let source = "def add(a, b): return a + b\ndef sub(a, b): return a - b\n";
        let analysis = LanguageAnalyzer::default().analyze(source, "python");

        assert_eq!(analysis.backend_used, BackendId::Structural);
        let spans: Vec<_> = analysis
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.start_line, f.end_line))
            .collect();
        assert_eq!(spans, vec![("add", 1, 1), ("sub", 2, 2)]);
        assert_eq!(analysis.functions[0].parameters, vec!["a", "b"]);
        assert_eq!(analysis.complexity_score, 2);
    }
}
