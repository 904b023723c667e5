//! Tree-sitter backed structural analysis.
//!
//! A single walker serves every grammar. Each grammar contributes a
//! [`LanguageProfile`] that adjusts the shared node-kind table and tells the
//! walker where names live for constructs that do not use a `name` field.

use lazy_static::lazy_static;
use regex::Regex;
use tree_sitter::{Language, Node, Parser as TsParser, Tree};

use super::heuristic::{clean_decorator, strip_comment};
use super::{languages, AnalyzerBackend, BackendError, GrammarLoader};
use crate::analysis::keywords::is_keyword;
use crate::analysis::{BackendId, Element, ElementKind, Extraction, Scope};

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"\b([A-Za-z_$][A-Za-z0-9_$]*)\b").unwrap();
    static ref CAPITALIZED: Regex = Regex::new(r"\b([A-Z][A-Za-z0-9_]*)\b").unwrap();
    static ref DECLARATION_KEYWORD: Regex = Regex::new(
        r"\b(?:def|function|func|fn|class|struct|interface|enum|trait|object|type|var|let|const|val)\s+([A-Za-z_$][A-Za-z0-9_$]*)"
    )
    .unwrap();
    static ref ASYNC: Regex = Regex::new(r"\basync\b").unwrap();
    static ref QUOTED: Regex = Regex::new(r#"["'`]([^"'`]+)["'`]"#).unwrap();
    static ref INCLUDE: Regex = Regex::new(r#"[<"]([^>"]+)[>"]"#).unwrap();
    static ref FROM_IMPORT: Regex = Regex::new(r"^\s*from\s+([\w.]+)").unwrap();
    static ref IMPORT_PATH: Regex =
        Regex::new(r"\b(?:import|use|include|using)\s+(?:static\s+)?([\w.:*]+)").unwrap();
}

/// Node kinds whose presence adds one to the complexity score.
const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "if_expression",
    "elif_clause",
    "for_statement",
    "for_in_statement",
    "for_expression",
    "for_range_loop",
    "enhanced_for_statement",
    "while_statement",
    "while_expression",
    "do_statement",
    "repeat_while_statement",
    "loop_expression",
    "try_statement",
    "try_expression",
    "catch_clause",
    "catch_block",
    "except_clause",
    "switch_statement",
    "switch_case",
    "switch_entry",
    "case_statement",
    "case_clause",
    "expression_case",
    "type_case",
    "communication_case",
    "match_arm",
    "guard_statement",
    "conditional_expression",
    "ternary_expression",
];

/// Function-like nodes that are usually anonymous and take their name
/// from the binding that holds them.
const ANONYMOUS_KINDS: &[&str] = &["arrow_function", "function_expression", "generator_function"];

const HERITAGE_KINDS: &[&str] = &[
    "class_heritage",
    "superclass",
    "super_interfaces",
    "extends_interfaces",
    "extends_type_clause",
    "base_class_clause",
    "extends_clause",
    "inheritance_specifier",
];

const DECORATOR_KINDS: &[&str] = &["decorator", "marker_annotation", "annotation", "attribute"];

/// Per-grammar adjustments to the shared walker.
pub struct LanguageProfile {
    /// Node kinds added to the shared table. `None` removes a shared mapping.
    pub node_kinds: &'static [(&'static str, Option<ElementKind>)],
    /// `(node kind, field)` pairs for constructs named by a field other than `name`.
    pub name_fields: &'static [(&'static str, &'static str)],
}

impl LanguageProfile {
    fn kind_for(&self, node_kind: &str) -> Option<ElementKind> {
        match self.node_kinds.iter().find(|(kind, _)| *kind == node_kind) {
            Some((_, mapped)) => *mapped,
            None => shared_kind(node_kind),
        }
    }

    fn name_field(&self, node_kind: &str) -> Option<&'static str> {
        self.name_fields
            .iter()
            .find(|(kind, _)| *kind == node_kind)
            .map(|(_, field)| *field)
    }
}

/// Construct names that mean the same thing across most grammars.
fn shared_kind(node_kind: &str) -> Option<ElementKind> {
    match node_kind {
        "function_definition"
        | "function_declaration"
        | "method_definition"
        | "method_declaration"
        | "function_expression"
        | "arrow_function"
        | "generator_function"
        | "generator_function_declaration" => Some(ElementKind::Function),

        "class_definition"
        | "class_declaration"
        | "interface_declaration"
        | "struct_declaration"
        | "enum_declaration"
        | "type_declaration" => Some(ElementKind::Class),

        "import_statement"
        | "import_declaration"
        | "import_from_statement"
        | "preproc_include"
        | "use_declaration" => Some(ElementKind::Import),

        // Reassignments such as `total += i` are not declarations.
        "variable_declarator"
        | "let_declaration"
        | "const_declaration"
        | "var_declaration" => Some(ElementKind::Variable),

        _ => None,
    }
}

fn is_identifier_kind(kind: &str) -> bool {
    matches!(
        kind,
        "identifier"
            | "type_identifier"
            | "property_identifier"
            | "private_property_identifier"
            | "field_identifier"
            | "simple_identifier"
            | "shorthand_property_identifier"
    )
}

/// A grammar-backed analyzer for one language.
pub struct StructuralBackend {
    language_id: String,
    grammar: Language,
    profile: &'static LanguageProfile,
}

impl StructuralBackend {
    /// Load the grammar and check it is usable with the linked tree-sitter runtime.
    pub fn load(language_id: &str, loader: GrammarLoader) -> Result<Self, BackendError> {
        let unavailable = |reason: String| BackendError::Unavailable {
            backend: "tree-sitter".to_string(),
            language: language_id.to_string(),
            reason,
        };

        let grammar = loader().map_err(|e| unavailable(e.to_string()))?;
        TsParser::new()
            .set_language(&grammar)
            .map_err(|e| unavailable(e.to_string()))?;

        Ok(Self {
            language_id: language_id.to_string(),
            grammar,
            profile: languages::profile(language_id),
        })
    }

    fn parse(&self, source: &str) -> Result<Tree, BackendError> {
        let parse_failed = |reason: String| BackendError::ParseFailed {
            language: self.language_id.clone(),
            reason,
        };

        let mut parser = TsParser::new();
        parser
            .set_language(&self.grammar)
            .map_err(|e| parse_failed(e.to_string()))?;
        parser
            .parse(source, None)
            .ok_or_else(|| parse_failed("parser returned no tree".to_string()))
    }
}

impl AnalyzerBackend for StructuralBackend {
    fn id(&self) -> BackendId {
        BackendId::Structural
    }

    fn name(&self) -> String {
        format!("tree-sitter/{}", self.language_id)
    }

    fn analyze(&self, source: &str) -> Result<Extraction, BackendError> {
        let tree = self.parse(source)?;
        let root = tree.root_node();

        let mut walker = Walker {
            source,
            language: &self.language_id,
            profile: self.profile,
            extraction: Extraction::default(),
            context: Vec::new(),
        };
        walker.walk(root);

        let mut extraction = walker.extraction;
        extraction.has_syntax_errors = root.has_error();
        Ok(extraction)
    }
}

#[derive(Clone, Copy)]
enum Enclosing {
    Class(usize),
    Function,
}

enum Step<'t> {
    Enter(Node<'t>),
    Leave,
}

struct Walker<'a> {
    source: &'a str,
    language: &'a str,
    profile: &'a LanguageProfile,
    extraction: Extraction,
    context: Vec<Enclosing>,
}

impl<'a> Walker<'a> {
    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Pre-order traversal with an explicit stack so deep trees cannot
    /// exhaust the call stack.
    fn walk(&mut self, root: Node) {
        let mut stack = vec![Step::Enter(root)];

        while let Some(step) = stack.pop() {
            let node = match step {
                Step::Leave => {
                    self.context.pop();
                    continue;
                }
                Step::Enter(node) => node,
            };

            if BRANCH_KINDS.contains(&node.kind()) {
                self.extraction.branch_count += 1;
            }

            let kind = self.classify(node);
            if let Some(kind) = kind {
                if let Some(enclosing) = self.record(node, kind) {
                    self.context.push(enclosing);
                    stack.push(Step::Leave);
                }
            }

            if kind == Some(ElementKind::Import) {
                continue;
            }

            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev().map(Step::Enter));
        }
    }

    fn classify(&self, node: Node) -> Option<ElementKind> {
        if !node.is_named() {
            return None;
        }
        let node_kind = node.kind();

        if node_kind == "call_expression" {
            let callee = node.child_by_field_name("function")?;
            return (self.text(callee) == "require").then_some(ElementKind::Import);
        }

        let kind = self.profile.kind_for(node_kind)?;
        // `struct foo x;` mentions a type without declaring one.
        if node_kind.ends_with("_specifier") && node.child_by_field_name("body").is_none() {
            return None;
        }
        Some(kind)
    }

    /// Build and store the element for `node`. Returns the context to push
    /// while visiting its children, if any.
    fn record(&mut self, node: Node, kind: ElementKind) -> Option<Enclosing> {
        let element = self.build(node, kind)?;

        match kind {
            ElementKind::Function => {
                if let Some(Enclosing::Class(idx)) = self.context.last() {
                    if !element.name.is_empty() {
                        self.extraction.classes[*idx].methods.push(element.name.clone());
                    }
                }
                self.extraction.functions.push(element);
                Some(Enclosing::Function)
            }
            ElementKind::Class => {
                let idx = self.extraction.classes.len();
                self.extraction.classes.push(element);
                Some(Enclosing::Class(idx))
            }
            ElementKind::Import | ElementKind::Variable => {
                self.extraction.push(element);
                None
            }
        }
    }

    /// Functions and classes without a recoverable name keep an empty one.
    /// Unnamed imports and variables are dropped.
    fn build(&self, node: Node, kind: ElementKind) -> Option<Element> {
        let name = self.element_name(node, kind).unwrap_or_default();
        let name = name.trim();
        if name.is_empty() && matches!(kind, ElementKind::Import | ElementKind::Variable) {
            return None;
        }

        // Python decorators live on a wrapper node that owns the full span.
        let outer = match node.parent() {
            Some(parent) if parent.kind() == "decorated_definition" => parent,
            _ => node,
        };

        let start_line = outer.start_position().row + 1;
        let end = node.end_position();
        let end_line = if end.column == 0 && end.row > outer.start_position().row {
            end.row
        } else {
            end.row + 1
        };

        let mut element = Element::new(kind, name, start_line, end_line)
            .with_bytes(outer.start_byte(), node.end_byte());
        element.scope = self.current_scope();

        match kind {
            ElementKind::Function => {
                element.parameters = self.parameters(node);
                element.decorators = self.decorators(node);
                element.is_async = ASYNC.is_match(self.text(node).lines().next().unwrap_or(""));
                element.docstring = self
                    .python_docstring(node)
                    .or_else(|| self.leading_comment(outer));
            }
            ElementKind::Class => {
                element.bases = self.bases(node);
                element.decorators = self.decorators(node);
                element.docstring = self
                    .python_docstring(node)
                    .or_else(|| self.leading_comment(outer));
            }
            ElementKind::Import | ElementKind::Variable => {}
        }

        Some(element)
    }

    fn current_scope(&self) -> Scope {
        match self.context.last() {
            Some(Enclosing::Class(_)) => Scope::Class,
            Some(Enclosing::Function) => Scope::Local,
            None => Scope::Global,
        }
    }

    fn element_name(&self, node: Node, kind: ElementKind) -> Option<String> {
        if kind == ElementKind::Import {
            return self.import_name(node);
        }

        let node_kind = node.kind();
        if let Some(field) = self.profile.name_field(node_kind) {
            if let Some(name) = node
                .child_by_field_name(field)
                .and_then(|child| self.identifier_in(child))
            {
                return Some(name);
            }
        }

        for field in ["name", "declarator"] {
            if let Some(name) = node
                .child_by_field_name(field)
                .and_then(|child| self.identifier_in(child))
            {
                return Some(name);
            }
        }

        // `x => x * 2` has an identifier child that is a parameter, not a name.
        if ANONYMOUS_KINDS.contains(&node_kind) {
            return self.name_from_binding(node);
        }

        let mut cursor = node.walk();
        let direct = node
            .named_children(&mut cursor)
            .find(|child| is_identifier_kind(child.kind()));
        if let Some(child) = direct {
            return Some(self.text(child).to_string());
        }

        let text = self.text(node);
        let head = text.lines().next().unwrap_or("");
        if let Some(caps) = DECLARATION_KEYWORD.captures(head) {
            if !is_keyword(&caps[1], self.language) {
                return Some(caps[1].to_string());
            }
        }

        IDENTIFIER
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|word| !is_keyword(word, self.language))
            .map(str::to_string)
    }

    /// `const add = (a, b) => ...` names the arrow function `add`.
    fn name_from_binding(&self, node: Node) -> Option<String> {
        let parent = node.parent()?;
        let fields: &[&str] = match parent.kind() {
            "variable_declarator" => &["name"],
            "pair" => &["key"],
            "assignment_expression" => &["left"],
            "field_definition" | "public_field_definition" => &["name", "property"],
            _ => return None,
        };
        fields
            .iter()
            .filter_map(|field| parent.child_by_field_name(field))
            .find_map(|child| self.identifier_in(child))
    }

    /// Resolve the identifier a declarator-like node ultimately names.
    fn identifier_in(&self, node: Node) -> Option<String> {
        let kind = node.kind();
        if is_identifier_kind(kind) || matches!(kind, "destructor_name" | "operator_name") {
            let text = self.text(node);
            return (!text.is_empty()).then(|| text.to_string());
        }

        for field in ["name", "declarator", "property", "attribute", "field", "pattern", "type"] {
            if let Some(child) = node.child_by_field_name(field) {
                return self.identifier_in(child);
            }
        }

        self.first_identifier(node)
    }

    fn first_identifier(&self, node: Node) -> Option<String> {
        let mut cursor = node.walk();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if is_identifier_kind(current.kind()) {
                return Some(self.text(current).to_string());
            }
            let children: Vec<Node> = current.named_children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
        None
    }

    fn import_name(&self, node: Node) -> Option<String> {
        let text = self.text(node);
        let caps = match self.language {
            "python" => FROM_IMPORT
                .captures(text)
                .or_else(|| IMPORT_PATH.captures(text)),
            "c" | "cpp" => INCLUDE.captures(text),
            "javascript" | "typescript" | "tsx" | "go" => QUOTED
                .captures(text)
                .or_else(|| IMPORT_PATH.captures(text)),
            _ => IMPORT_PATH.captures(text).or_else(|| QUOTED.captures(text)),
        }?;
        let name = caps[1].trim_end_matches(':');
        (!name.is_empty()).then(|| name.to_string())
    }

    fn parameters(&self, node: Node) -> Vec<String> {
        let mut params = Vec::new();
        let mut cursor = node.walk();

        match self.parameter_list(node) {
            Some(list) => {
                let children: Vec<Node> = list.named_children(&mut cursor).collect();
                for child in children {
                    self.push_parameter(child, &mut params);
                }
            }
            None => {
                if let Some(single) = node.child_by_field_name("parameter") {
                    self.push_parameter(single, &mut params);
                }
                let children: Vec<Node> = node
                    .named_children(&mut cursor)
                    .filter(|child| child.kind() == "parameter")
                    .collect();
                for child in children {
                    self.push_parameter(child, &mut params);
                }
            }
        }

        params
    }

    fn parameter_list<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        if let Some(list) = node.child_by_field_name("parameters") {
            return Some(list);
        }
        // C and C++ keep the parameter list inside the declarator chain.
        let mut current = node.child_by_field_name("declarator");
        while let Some(decl) = current {
            if let Some(list) = decl.child_by_field_name("parameters") {
                return Some(list);
            }
            current = decl.child_by_field_name("declarator");
        }
        None
    }

    fn push_parameter(&self, param: Node, out: &mut Vec<String>) {
        let kind = param.kind();
        if kind.contains("comment") {
            return;
        }
        if kind == "self_parameter" {
            out.push("self".to_string());
            return;
        }
        if is_identifier_kind(kind) {
            out.push(self.text(param).to_string());
            return;
        }

        let mut cursor = param.walk();
        let names: Vec<Node> = param
            .children_by_field_name("name", &mut cursor)
            .filter(|n| !n.kind().contains("type"))
            .collect();
        if !names.is_empty() {
            // Go declares `a, b int` in one node; a Swift parameter has one label.
            let take = if self.language == "swift" { 1 } else { names.len() };
            out.extend(
                names
                    .into_iter()
                    .take(take)
                    .filter_map(|n| self.identifier_in(n)),
            );
            return;
        }

        for field in ["pattern", "declarator"] {
            if let Some(name) = param
                .child_by_field_name(field)
                .and_then(|child| self.identifier_in(child))
            {
                out.push(name);
                return;
            }
        }

        if let Some(name) = self.first_identifier(param) {
            out.push(name);
        }
    }

    fn decorators(&self, node: Node) -> Vec<String> {
        let mut out = Vec::new();

        // Rust attributes are siblings that precede the item.
        let mut sibling = node.prev_named_sibling();
        while let Some(s) = sibling {
            match s.kind() {
                "attribute_item" => out.insert(0, clean_decorator(self.text(s))),
                kind if kind.contains("comment") => {}
                _ => break,
            }
            sibling = s.prev_named_sibling();
        }

        self.collect_decorators(node, &mut out);

        let mut cursor = node.walk();
        let modifiers: Vec<Node> = node
            .named_children(&mut cursor)
            .filter(|child| child.kind() == "modifiers")
            .collect();
        for m in modifiers {
            self.collect_decorators(m, &mut out);
        }

        if let Some(parent) = node.parent() {
            if parent.kind() == "decorated_definition" {
                self.collect_decorators(parent, &mut out);
            }
        }

        out
    }

    fn collect_decorators(&self, holder: Node, out: &mut Vec<String>) {
        let mut cursor = holder.walk();
        for child in holder.named_children(&mut cursor) {
            if DECORATOR_KINDS.contains(&child.kind()) {
                out.push(clean_decorator(self.text(child)));
            }
        }
    }

    fn bases(&self, node: Node) -> Vec<String> {
        let mut bases = Vec::new();

        if let Some(supers) = node.child_by_field_name("superclasses") {
            let mut cursor = supers.walk();
            for arg in supers.named_children(&mut cursor) {
                if arg.kind() != "keyword_argument" && !arg.kind().contains("comment") {
                    bases.push(self.text(arg).to_string());
                }
            }
            return bases;
        }

        if node.kind() == "impl_item" {
            if let Some(tr) = node.child_by_field_name("trait") {
                bases.push(self.text(tr).to_string());
            }
            return bases;
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if !HERITAGE_KINDS.contains(&child.kind()) {
                continue;
            }
            for m in CAPITALIZED.find_iter(self.text(child)) {
                let base = m.as_str().to_string();
                if !bases.contains(&base) {
                    bases.push(base);
                }
            }
        }
        bases
    }

    fn python_docstring(&self, node: Node) -> Option<String> {
        let body = node.child_by_field_name("body")?;
        let first = body.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string = first.named_child(0)?;
        if string.kind() != "string" {
            return None;
        }
        let doc = strip_quotes(self.text(string));
        (!doc.is_empty()).then_some(doc)
    }

    /// Comments ending on the line directly above `node`, top to bottom.
    fn leading_comment(&self, node: Node) -> Option<String> {
        let mut lines = Vec::new();
        let mut expected_row = node.start_position().row;
        let mut sibling = node.prev_sibling();

        while let Some(s) = sibling {
            let kind = s.kind();
            if kind == "attribute_item" || kind == "decorator" {
                expected_row = s.start_position().row;
                sibling = s.prev_sibling();
                continue;
            }
            if !kind.contains("comment") {
                break;
            }
            let end = s.end_position();
            let end_row = if end.column == 0 && end.row > 0 {
                end.row - 1
            } else {
                end.row
            };
            if end_row + 1 < expected_row {
                break;
            }
            lines.push(strip_comment(self.text(s)));
            expected_row = s.start_position().row;
            sibling = s.prev_sibling();
        }

        lines.reverse();
        let doc = lines.join("\n").trim().to_string();
        (!doc.is_empty()).then_some(doc)
    }
}

fn strip_quotes(text: &str) -> String {
    text.trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> StructuralBackend {
        StructuralBackend::load("python", languages::python::grammar).unwrap()
    }

    #[test]
    fn test_branch_constructs_counted() {
        let source = "def f(x):\n    if x:\n        return 1\n    for i in x:\n        pass\n    return 0\n";
        let ex = python().analyze(source).unwrap();
        assert_eq!(ex.branch_count, 2);
    }

    #[test]
    fn test_syntax_errors_reported() {
        let ex = python().analyze("def broken(:\n    pass\n").unwrap();
        assert!(ex.has_syntax_errors);

        let ex = python().analyze("def ok():\n    pass\n").unwrap();
        assert!(!ex.has_syntax_errors);
    }

    #[test]
    fn test_methods_attached_to_class() {
        let source = "class Stack:\n    def push(self, item):\n        pass\n\n    def pop(self):\n        pass\n";
        let ex = python().analyze(source).unwrap();

        assert_eq!(ex.classes.len(), 1);
        assert_eq!(ex.classes[0].methods, vec!["push", "pop"]);
        let push = ex.functions.iter().find(|f| f.name == "push").unwrap();
        assert_eq!(push.scope, Scope::Class);
        assert_eq!(push.parameters, vec!["self", "item"]);
    }
}
