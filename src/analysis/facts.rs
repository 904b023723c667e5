//! Structures produced by analysis and persisted by the cache.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a discovered code element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Function,
    Class,
    Import,
    Variable,
}

impl ElementKind {
    /// Convert to a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Function => "function",
            ElementKind::Class => "class",
            ElementKind::Import => "import",
            ElementKind::Variable => "variable",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an element was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Global,
    Local,
    Class,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Local => write!(f, "local"),
            Scope::Class => write!(f, "class"),
        }
    }
}

/// Which analysis strategy produced a [`FileAnalysis`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendId {
    /// Grammar-based tree-sitter parse.
    #[serde(rename = "tree_sitter")]
    Structural,
    /// Language-specific regex extraction.
    #[serde(rename = "regex")]
    Heuristic,
    /// Language-agnostic pattern matching and line statistics.
    #[serde(rename = "generic")]
    Generic,
    /// Every backend failed; the analysis is empty.
    #[serde(rename = "failed")]
    Failed,
}

impl BackendId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Structural => "tree_sitter",
            BackendId::Heuristic => "regex",
            BackendId::Generic => "generic",
            BackendId::Failed => "failed",
        }
    }

    /// Whether element spans came from a real parse tree.
    pub fn is_structural(&self) -> bool {
        matches!(self, BackendId::Structural)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One discovered code construct.
///
/// Lines are 1-indexed and inclusive. The kind is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    kind: ElementKind,
    pub start_line: usize,
    pub end_line: usize,
    #[serde(default)]
    pub start_byte: Option<usize>,
    #[serde(default)]
    pub end_byte: Option<usize>,
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Method names, for classes.
    #[serde(default)]
    pub methods: Vec<String>,
    /// Base classes, implemented interfaces or traits.
    #[serde(default)]
    pub bases: Vec<String>,
    #[serde(default)]
    pub decorators: Vec<String>,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default)]
    pub docstring: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub file_path: String,
}

impl Element {
    /// Create an element. `end_line` is raised to `start_line` if smaller.
    pub fn new(kind: ElementKind, name: impl Into<String>, start_line: usize, end_line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            start_line,
            end_line: end_line.max(start_line),
            start_byte: None,
            end_byte: None,
            parameters: Vec::new(),
            methods: Vec::new(),
            bases: Vec::new(),
            decorators: Vec::new(),
            is_async: false,
            docstring: None,
            scope: Scope::Global,
            file_path: String::new(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn with_bytes(mut self, start: usize, end: usize) -> Self {
        self.start_byte = Some(start);
        self.end_byte = Some(end.max(start));
        self
    }

    /// Number of lines covered.
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Whether `line` falls inside this element.
    pub fn contains_line(&self, line: usize) -> bool {
        line >= self.start_line && line <= self.end_line
    }
}

/// Elements extracted by a backend, before normalization.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub functions: Vec<Element>,
    pub classes: Vec<Element>,
    pub imports: Vec<Element>,
    pub variables: Vec<Element>,
    /// Number of branching, loop and exception constructs seen.
    pub branch_count: usize,
    pub has_syntax_errors: bool,
}

impl Extraction {
    /// Route an element into the list for its kind.
    pub fn push(&mut self, element: Element) {
        match element.kind() {
            ElementKind::Function => self.functions.push(element),
            ElementKind::Class => self.classes.push(element),
            ElementKind::Import => self.imports.push(element),
            ElementKind::Variable => self.variables.push(element),
        }
    }
}

/// One file's extracted structure.
///
/// Replaced wholesale on re-analysis; never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub file_path: String,
    pub language: String,
    /// SHA-256 hex digest of the exact source bytes.
    pub content_hash: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub functions: Vec<Element>,
    #[serde(default)]
    pub classes: Vec<Element>,
    #[serde(default)]
    pub imports: Vec<Element>,
    #[serde(default)]
    pub variables: Vec<Element>,
    pub total_lines: usize,
    #[serde(default)]
    pub non_empty_lines: usize,
    #[serde(default)]
    pub word_count: usize,
    pub complexity_score: u32,
    pub has_syntax_errors: bool,
    pub backend_used: BackendId,
}

impl FileAnalysis {
    /// Iterate over every element, grouped by kind.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.functions
            .iter()
            .chain(self.classes.iter())
            .chain(self.imports.iter())
            .chain(self.variables.iter())
    }

    /// Functions followed by classes: the elements that can be rewritten.
    pub fn callables_and_classes(&self) -> impl Iterator<Item = &Element> {
        self.functions.iter().chain(self.classes.iter())
    }

    pub fn element_count(&self) -> usize {
        self.functions.len() + self.classes.len() + self.imports.len() + self.variables.len()
    }

    /// Human-readable structural overview handed to the rewrite collaborator
    /// when no single element is targeted.
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("File: {}", self.file_path),
            format!("Language: {}", self.language),
            format!("Total lines: {}", self.total_lines),
            format!("Complexity score: {}", self.complexity_score),
            format!("Has syntax errors: {}", self.has_syntax_errors),
        ];

        if !self.functions.is_empty() {
            parts.push(format!("\nFunctions ({}):", self.functions.len()));
            for func in &self.functions {
                let mut line = format!("  - {}()", func.name);
                if !func.parameters.is_empty() {
                    line.push_str(&format!(" [params: {}]", func.parameters.join(", ")));
                }
                if func.is_async {
                    line.push_str(" [async]");
                }
                parts.push(line);
            }
        }

        if !self.classes.is_empty() {
            parts.push(format!("\nClasses ({}):", self.classes.len()));
            for class in &self.classes {
                let mut line = format!("  - {}", class.name);
                if !class.bases.is_empty() {
                    line.push_str(&format!(" extends {}", class.bases.join(", ")));
                }
                if !class.methods.is_empty() {
                    line.push_str(&format!(" [methods: {}]", class.methods.join(", ")));
                }
                parts.push(line);
            }
        }

        if !self.imports.is_empty() {
            parts.push(format!("\nImports ({}):", self.imports.len()));
            for import in self.imports.iter().take(10) {
                parts.push(format!("  - {}", import.name));
            }
        }

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_end_line_never_precedes_start() {
        let el = Element::new(ElementKind::Function, "f", 10, 3);
        assert_eq!(el.start_line, 10);
        assert_eq!(el.end_line, 10);
        assert_eq!(el.line_count(), 1);
    }

    #[test]
    fn test_element_serializes_kind_lowercase() {
        let el = Element::new(ElementKind::Class, "Config", 1, 4);
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["kind"], "class");
        assert_eq!(json["scope"], "global");

        let back: Element = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), ElementKind::Class);
    }

    #[test]
    fn test_backend_id_wire_names() {
        assert_eq!(
            serde_json::to_string(&BackendId::Structural).unwrap(),
            "\"tree_sitter\""
        );
        assert_eq!(BackendId::Heuristic.to_string(), "regex");
        assert!(!BackendId::Generic.is_structural());
    }

    #[test]
    fn test_extraction_routes_by_kind() {
        let mut ex = Extraction::default();
        ex.push(Element::new(ElementKind::Import, "os", 1, 1));
        ex.push(Element::new(ElementKind::Function, "main", 3, 5));
        ex.push(Element::new(ElementKind::Variable, "x", 2, 2));
        assert_eq!(ex.imports.len(), 1);
        assert_eq!(ex.functions.len(), 1);
        assert_eq!(ex.variables.len(), 1);
        assert!(ex.classes.is_empty());
    }

    #[test]
    fn test_contains_line() {
        let el = Element::new(ElementKind::Function, "f", 3, 6);
        assert!(el.contains_line(3));
        assert!(el.contains_line(6));
        assert!(!el.contains_line(7));
    }
}
