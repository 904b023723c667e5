//! Regex-based fallback extraction.
//!
//! Heuristic backends never report syntax errors and tag their results as
//! lower confidence through `backend_used`. Block ends are estimated by brace
//! matching, or by indentation for Python, so the resulting line ranges are
//! still usable for targeted rewriting.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::{AnalyzerBackend, BackendError};
use crate::analysis::keywords::is_keyword;
use crate::analysis::{BackendId, Element, ElementKind, Extraction, Scope};

struct Rule {
    kind: ElementKind,
    regex: Regex,
}

macro_rules! rule {
    ($kind:ident, $pattern:expr) => {
        Rule {
            kind: ElementKind::$kind,
            regex: Regex::new($pattern).unwrap(),
        }
    };
}

lazy_static! {
    static ref PYTHON_RULES: Vec<Rule> = vec![
        rule!(Function, r"(?m)^[ \t]*(?:async[ \t]+)?def[ \t]+(?P<name>[A-Za-z_]\w*)[ \t]*\((?P<params>[^)]*)\)"),
        rule!(Class, r"(?m)^[ \t]*class[ \t]+(?P<name>[A-Za-z_]\w*)(?:[ \t]*\((?P<bases>[^)]*)\))?"),
        rule!(Import, r"(?m)^[ \t]*import[ \t]+(?P<name>[\w.]+)"),
        rule!(Import, r"(?m)^[ \t]*from[ \t]+(?P<name>[\w.]+)[ \t]+import\b"),
        rule!(Variable, r"(?m)^(?P<name>[A-Za-z_]\w*)[ \t]*(?::[^=\n]+)?=[^=]"),
    ];

    static ref JAVASCRIPT_RULES: Vec<Rule> = vec![
        rule!(Function, r"\b(?:async\s+)?function\s*\*?\s*(?P<name>[A-Za-z_$][\w$]*)\s*\((?P<params>[^)]*)\)"),
        rule!(Function, r"\b(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\s*\*?\s*[\w$]*\s*)?\((?P<params>[^)]*)\)\s*(?:=>|\{)"),
        rule!(Function, r"\b(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?P<params>[A-Za-z_$][\w$]*)\s*=>"),
        rule!(Function, r"(?P<name>[A-Za-z_$][\w$]*)\s*:\s*(?:async\s+)?function\s*\((?P<params>[^)]*)\)"),
        rule!(Function, r"(?m)^[ \t]*(?:(?:static|async|get|set|public|private|protected)[ \t]+)*(?P<name>[A-Za-z_$][\w$]*)[ \t]*\((?P<params>[^)]*)\)[ \t]*(?::[^{\n]+)?\{"),
        rule!(Class, r"\bclass\s+(?P<name>[A-Za-z_$][\w$]*)(?:\s+extends\s+(?P<bases>[A-Za-z_$][\w$.]*))?"),
        rule!(Import, r#"\bimport\s+[^'";]*?\bfrom\s+['"](?P<name>[^'"]+)['"]"#),
        rule!(Import, r#"\bimport\s*\(?\s*['"](?P<name>[^'"]+)['"]"#),
        rule!(Import, r#"\brequire\(\s*['"](?P<name>[^'"]+)['"]\s*\)"#),
        rule!(Variable, r"\b(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)"),
    ];

    static ref TYPESCRIPT_RULES: Vec<Rule> = vec![
        rule!(Class, r"(?m)^[ \t]*(?:export[ \t]+)?(?:declare[ \t]+)?interface[ \t]+(?P<name>[A-Za-z_$][\w$]*)"),
        rule!(Class, r"(?m)^[ \t]*(?:export[ \t]+)?type[ \t]+(?P<name>[A-Za-z_$][\w$]*)[^=\n]*="),
        rule!(Class, r"(?m)^[ \t]*(?:export[ \t]+)?(?:const[ \t]+)?enum[ \t]+(?P<name>[A-Za-z_$][\w$]*)"),
    ];

    static ref JAVA_RULES: Vec<Rule> = vec![
        rule!(Class, r"(?m)^[ \t]*(?:(?:public|private|protected|abstract|final|static|sealed)\s+)*(?:class|interface|enum|record)\s+(?P<name>[A-Za-z_$][\w$]*)(?:<[^>{]*>)?(?:\s+extends\s+(?P<bases>[\w$.]+))?"),
        rule!(Function, r"(?m)^[ \t]*(?:(?:public|private|protected|static|final|abstract|synchronized|native|default)\s+)*(?:<[^>]+>\s+)?(?P<ret>[\w$<>\[\],.? ]+?)\s+(?P<name>[A-Za-z_$][\w$]*)\s*\((?P<params>[^)]*)\)\s*(?:throws\s+[\w$.,\s]+?)?\s*[{;]"),
        rule!(Import, r"(?m)^[ \t]*import\s+(?:static\s+)?(?P<name>[\w$.*]+)\s*;"),
    ];

    static ref C_FAMILY_RULES: Vec<Rule> = vec![
        rule!(Function, r"(?m)^[ \t]*(?P<ret>(?:[A-Za-z_][\w:<>*&]*[ \t*&]+)+)(?P<name>[A-Za-z_~][\w:~]*)[ \t]*\((?P<params>[^)]*)\)[ \t]*(?:const[ \t]*)?(?:override[ \t]*)?(?:noexcept[ \t]*)?(?:\{|;|$)"),
        rule!(Class, r"(?m)^[ \t]*(?:typedef[ \t]+)?(?:class|struct|union|enum)[ \t]+(?P<name>[A-Za-z_]\w*)(?:[ \t]*:[ \t]*(?:public|private|protected)?[ \t]*(?P<bases>[\w:]+))?[^;\n]*(?:\{|$)"),
        rule!(Import, r#"(?m)^[ \t]*#[ \t]*include[ \t]*[<"](?P<name>[^>"]+)[>"]"#),
    ];

    static ref C_SHARP_RULES: Vec<Rule> = vec![
        rule!(Class, r"(?m)^[ \t]*(?:(?:public|private|protected|internal|static|abstract|sealed|partial)\s+)*(?:class|interface|struct|record|enum)\s+(?P<name>[A-Za-z_]\w*)(?:<[^>{]*>)?(?:\s*:\s*(?P<bases>[^{\n]+))?"),
        rule!(Function, r"(?m)^[ \t]*(?:(?:public|private|protected|internal|static|virtual|override|abstract|async|sealed|extern|unsafe|new|partial)\s+)*(?P<ret>[\w<>\[\],.?]+)\s+(?P<name>[A-Za-z_]\w*)\s*(?:<[^>]*>)?\s*\((?P<params>[^)]*)\)"),
        rule!(Import, r"(?m)^[ \t]*using\s+(?:static\s+)?(?P<name>[\w.]+)\s*;"),
    ];

    static ref GO_RULES: Vec<Rule> = vec![
        rule!(Function, r"(?m)^func\s+(?:\([^)]*\)\s*)?(?P<name>[A-Za-z_]\w*)\s*(?:\[[^\]]*\])?\((?P<params>[^)]*)\)"),
        rule!(Class, r"(?m)^type\s+(?P<name>[A-Za-z_]\w*)\s+(?:struct|interface)\b"),
        rule!(Import, r#"(?m)^import\s+(?:[\w.]+\s+)?"(?P<name>[^"]+)""#),
        rule!(Variable, r"(?m)^(?:var|const)\s+(?P<name>[A-Za-z_]\w*)"),
    ];

    static ref RUST_RULES: Vec<Rule> = vec![
        rule!(Function, r#"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(?:const[ \t]+)?(?:async[ \t]+)?(?:unsafe[ \t]+)?(?:extern[ \t]+"[^"]*"[ \t]+)?fn[ \t]+(?P<name>[A-Za-z_]\w*)[^(\n]*\((?P<params>[^)]*)\)"#),
        rule!(Class, r"(?m)^[ \t]*(?:pub(?:\([^)]*\))?[ \t]+)?(?:struct|enum|trait|union)[ \t]+(?P<name>[A-Za-z_]\w*)"),
        rule!(Class, r"(?m)^[ \t]*(?:unsafe[ \t]+)?impl(?:<[^{]*?>)?[ \t]+(?:(?P<bases>[^{\n]+?)[ \t]+for[ \t]+)?(?P<name>[A-Za-z_][\w:]*)"),
        rule!(Import, r"(?m)^[ \t]*(?:pub[ \t]+)?use[ \t]+(?P<name>[\w:]+)"),
        rule!(Variable, r"\blet[ \t]+(?:mut[ \t]+)?(?P<name>[A-Za-z_]\w*)"),
        rule!(Variable, r"(?m)^[ \t]*(?:pub[ \t]+)?(?:const|static)[ \t]+(?:mut[ \t]+)?(?P<name>[A-Z_][A-Z0-9_]*)"),
    ];

    static ref GENERIC_RULES: Vec<Rule> = vec![
        rule!(Function, r"(?i)\bfunction\s+(?P<name>[A-Za-z_]\w*)"),
        rule!(Function, r"(?i)\bdef\s+(?P<name>[A-Za-z_]\w*)"),
        rule!(Function, r"(?P<name>[A-Za-z_]\w*)\s*\((?P<params>[^)]*)\)\s*\{"),
        rule!(Function, r"(?P<name>[A-Za-z_]\w*)\s*:\s*function"),
    ];

    static ref GO_IMPORT_BLOCK: Regex = Regex::new(r"(?m)^import\s*\(([^)]*)\)").unwrap();
    static ref GO_IMPORT_PATH: Regex = Regex::new(r#""([^"]+)""#).unwrap();
    static ref BRANCH: Regex = Regex::new(r"\b(?:if|elif|for|foreach|while|case|catch|except)\b").unwrap();
    static ref ASYNC: Regex = Regex::new(r"\basync\b").unwrap();
    static ref WORD: Regex = Regex::new(r"[A-Za-z_$][\w$]*").unwrap();
}

/// Leading words that show a "declaration" match is really a statement.
const STATEMENT_WORDS: &[&str] = &[
    "return", "new", "throw", "else", "case", "goto", "delete", "await", "yield", "typeof",
    "sizeof",
];

/// Pattern families shared by related languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Python,
    JavaScript,
    TypeScript,
    Java,
    CFamily,
    CSharp,
    Go,
    Rust,
    Markup,
    Generic,
}

#[derive(Clone, Copy)]
enum ParamStyle {
    /// `name: Type` or bare `name`.
    NameFirst,
    /// `Type name`.
    TypeFirst,
}

impl Family {
    fn rule_sets(self) -> Vec<&'static [Rule]> {
        match self {
            Family::Python => vec![&PYTHON_RULES],
            Family::JavaScript => vec![&JAVASCRIPT_RULES],
            Family::TypeScript => vec![&JAVASCRIPT_RULES, &TYPESCRIPT_RULES],
            Family::Java => vec![&JAVA_RULES],
            Family::CFamily => vec![&C_FAMILY_RULES],
            Family::CSharp => vec![&C_SHARP_RULES],
            Family::Go => vec![&GO_RULES],
            Family::Rust => vec![&RUST_RULES],
            Family::Markup => vec![],
            Family::Generic => vec![&GENERIC_RULES],
        }
    }

    fn param_style(self) -> ParamStyle {
        match self {
            Family::Java | Family::CFamily | Family::CSharp => ParamStyle::TypeFirst,
            _ => ParamStyle::NameFirst,
        }
    }

    fn indented_blocks(self) -> bool {
        self == Family::Python
    }

    /// Whether `'` opens a string rather than a character literal.
    fn single_quote_strings(self) -> bool {
        matches!(
            self,
            Family::Python | Family::JavaScript | Family::TypeScript | Family::Generic
        )
    }

    fn is_decorator_line(self, line: &str) -> bool {
        match self {
            Family::Python | Family::JavaScript | Family::TypeScript | Family::Java => {
                line.starts_with('@')
            }
            Family::CSharp => line.starts_with('[') && line.ends_with(']'),
            Family::Rust => line.starts_with("#["),
            _ => false,
        }
    }

    fn is_comment_line(self, line: &str) -> bool {
        match self {
            Family::Python => line.starts_with('#'),
            Family::Markup => false,
            _ => {
                line.starts_with("//")
                    || line.starts_with("/*")
                    || line.starts_with('*')
                    || line.ends_with("*/")
            }
        }
    }
}

/// Language-specific regex extraction.
pub struct HeuristicBackend {
    language: &'static str,
    family: Family,
}

impl AnalyzerBackend for HeuristicBackend {
    fn id(&self) -> BackendId {
        BackendId::Heuristic
    }

    fn name(&self) -> String {
        format!("regex/{}", self.language)
    }

    fn analyze(&self, source: &str) -> Result<Extraction, BackendError> {
        Ok(extract(source, self.family, self.language))
    }
}

/// Language-agnostic pattern matching; the last resort for every language.
pub struct GenericBackend;

impl AnalyzerBackend for GenericBackend {
    fn id(&self) -> BackendId {
        BackendId::Generic
    }

    fn name(&self) -> String {
        "generic".to_string()
    }

    fn analyze(&self, source: &str) -> Result<Extraction, BackendError> {
        Ok(extract(source, Family::Generic, "unknown"))
    }
}

/// Heuristic backends keyed by language id.
pub fn builtin_backends() -> HashMap<&'static str, Arc<dyn AnalyzerBackend>> {
    let table: &[(&'static str, Family)] = &[
        ("python", Family::Python),
        ("javascript", Family::JavaScript),
        ("typescript", Family::TypeScript),
        ("tsx", Family::TypeScript),
        ("java", Family::Java),
        ("c", Family::CFamily),
        ("cpp", Family::CFamily),
        ("objective_c", Family::CFamily),
        ("c_sharp", Family::CSharp),
        ("go", Family::Go),
        ("rust", Family::Rust),
        ("html", Family::Markup),
        ("css", Family::Markup),
        ("scss", Family::Markup),
        ("sass", Family::Markup),
        ("json", Family::Markup),
        ("xml", Family::Markup),
        ("yaml", Family::Markup),
        ("toml", Family::Markup),
        ("markdown", Family::Markup),
    ];

    table
        .iter()
        .map(|&(language, family)| {
            let backend: Arc<dyn AnalyzerBackend> = Arc::new(HeuristicBackend { language, family });
            (language, backend)
        })
        .collect()
}

/// Byte offset to line number lookups.
struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            starts,
            len: source.len(),
        }
    }

    /// 1-based line containing `offset`.
    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }

    fn line_start(&self, line: usize) -> usize {
        self.starts.get(line - 1).copied().unwrap_or(self.len)
    }

    fn line_end(&self, line: usize) -> usize {
        self.starts
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.len)
    }
}

fn extract(source: &str, family: Family, language: &str) -> Extraction {
    let index = LineIndex::new(source);
    let lines: Vec<&str> = source.split('\n').collect();
    let mut extraction = Extraction::default();
    let mut seen = HashSet::new();

    for rules in family.rule_sets() {
        for rule in rules {
            for caps in rule.regex.captures_iter(source) {
                let Some(name_match) = caps.name("name") else {
                    continue;
                };
                let name = normalize_name(name_match.as_str());
                if name.is_empty() || is_statement(&caps) {
                    continue;
                }

                let name_line = index.line_of(name_match.start());
                if !seen.insert((rule.kind, name.to_string(), name_line)) {
                    continue;
                }

                let element = match rule.kind {
                    ElementKind::Function | ElementKind::Class => build_block(
                        rule.kind, name, name_line, &caps, source, &lines, &index, family, language,
                    ),
                    _ => Element::new(rule.kind, name, name_line, name_line)
                        .with_bytes(index.line_start(name_line), index.line_end(name_line)),
                };
                extraction.push(element);
            }
        }
    }

    if family == Family::Go {
        for block in GO_IMPORT_BLOCK.captures_iter(source) {
            let Some(body) = block.get(1) else { continue };
            for path in GO_IMPORT_PATH.captures_iter(body.as_str()) {
                let m = &path[1];
                let offset = body.start() + path.get(0).map(|g| g.start()).unwrap_or(0);
                let line = index.line_of(offset);
                extraction.push(
                    Element::new(ElementKind::Import, m, line, line)
                        .with_bytes(index.line_start(line), index.line_end(line)),
                );
            }
        }
    }

    for list in [
        &mut extraction.functions,
        &mut extraction.classes,
        &mut extraction.imports,
        &mut extraction.variables,
    ] {
        list.sort_by(|a, b| (a.start_line, &a.name).cmp(&(b.start_line, &b.name)));
    }
    assign_scopes(&mut extraction);

    extraction.branch_count = BRANCH.find_iter(source).count();
    extraction
}

fn normalize_name(raw: &str) -> &str {
    raw.rsplit("::").next().unwrap_or(raw).trim()
}

fn is_statement(caps: &Captures) -> bool {
    caps.name("ret")
        .and_then(|ret| ret.as_str().split_whitespace().last())
        .map(|word| STATEMENT_WORDS.contains(&word))
        .unwrap_or(false)
}

#[allow(clippy::too_many_arguments)]
fn build_block(
    kind: ElementKind,
    name: &str,
    name_line: usize,
    caps: &Captures,
    source: &str,
    lines: &[&str],
    index: &LineIndex,
    family: Family,
    language: &str,
) -> Element {
    let (body_start, end_line) = if family.indented_blocks() {
        indented_block(lines, name_line - 1)
    } else {
        let name_end = caps.name("name").map(|m| m.end()).unwrap_or(0);
        let end = block_end(source, name_end, family)
            .map(|offset| index.line_of(offset))
            .unwrap_or(name_line);
        (name_line, end)
    };

    let (decorators, comment, start_line) = prefix_lines(lines, name_line, family);
    let docstring = if family.indented_blocks() {
        python_docstring(lines, body_start).or(comment)
    } else {
        comment
    };

    let mut element = Element::new(kind, name, start_line, end_line)
        .with_bytes(index.line_start(start_line), index.line_end(end_line));
    element.decorators = decorators;
    element.docstring = docstring;

    if let Some(params) = caps.name("params") {
        element.parameters = parse_params(params.as_str(), family.param_style(), language);
    }
    if let Some(bases) = caps.name("bases") {
        element.bases = bases
            .as_str()
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty() && !b.contains('='))
            .map(str::to_string)
            .collect();
    }
    if let Some(whole) = caps.get(0) {
        let head_end = caps.name("params").map(|p| p.start()).unwrap_or(whole.end());
        element.is_async = ASYNC.is_match(&source[whole.start()..head_end]);
    }

    element
}

/// Offset of the brace closing the block that follows `from`.
///
/// Returns `None` when a `;` at paren depth zero comes first (a prototype or
/// declaration without a body). An unterminated block runs to end of input.
fn block_end(source: &str, from: usize, family: Family) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut i = from;
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut opened = false;

    while i < bytes.len() {
        match bytes[i] {
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 1;
            }
            b'"' | b'`' => i = skip_string(bytes, i),
            b'\'' if family.single_quote_strings() => i = skip_string(bytes, i),
            b'\'' => i = skip_char_literal(bytes, i),
            b'(' if !opened => parens += 1,
            b')' if !opened => parens = parens.saturating_sub(1),
            b';' if !opened && parens == 0 => return None,
            b'{' if opened || parens == 0 => {
                opened = true;
                depth += 1;
            }
            b'}' if opened => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }

    opened.then(|| bytes.len().saturating_sub(1))
}

/// Index of the closing quote of the string starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b if b == quote => return i,
            b'\n' if quote != b'`' => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

/// Skip `'x'` or `'\n'`; anything else (a Rust lifetime) is left alone.
fn skip_char_literal(bytes: &[u8], start: usize) -> usize {
    if bytes.get(start + 1) == Some(&b'\\') {
        let limit = (start + 10).min(bytes.len());
        return (start + 2..limit)
            .find(|&i| bytes[i] == b'\'')
            .unwrap_or(start);
    }
    if bytes.get(start + 2) == Some(&b'\'') {
        return start + 2;
    }
    start
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// `(first body line, last block line)` for the Python block whose header
/// is at 0-based index `header`. Both results are 1-based.
fn indented_block(lines: &[&str], header: usize) -> (usize, usize) {
    let base = indent_of(lines[header]);

    // A signature may span several lines until its parentheses balance.
    let mut header_end = header;
    let mut balance: i64 = 0;
    for (idx, line) in lines.iter().enumerate().skip(header) {
        balance += line.matches('(').count() as i64 - line.matches(')').count() as i64;
        header_end = idx;
        if balance <= 0 {
            break;
        }
    }

    // `def add(a, b): return a + b`
    let header_line = lines[header_end].split('#').next().unwrap_or("");
    if let Some(colon) = header_line.rfind(':') {
        if !header_line[colon + 1..].trim().is_empty() {
            return (header_end + 1, header_end + 1);
        }
    }

    let mut end = header_end;
    for (idx, line) in lines.iter().enumerate().skip(header_end + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= base {
            break;
        }
        end = idx;
    }

    (header_end + 2, end + 1)
}

fn python_docstring(lines: &[&str], body_start: usize) -> Option<String> {
    let first_idx = (body_start.saturating_sub(1)..lines.len()).find(|&i| !lines[i].trim().is_empty())?;
    let first = lines[first_idx].trim();
    let quote = ["\"\"\"", "'''"].into_iter().find(|q| first.starts_with(q))?;

    let rest = &first[3..];
    if let Some(close) = rest.find(quote) {
        return Some(rest[..close].trim().to_string());
    }

    let mut doc = vec![rest.trim().to_string()];
    for line in &lines[first_idx + 1..] {
        if let Some(close) = line.find(quote) {
            doc.push(line[..close].trim().to_string());
            break;
        }
        doc.push(line.trim().to_string());
    }
    let doc = doc.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

/// Decorators and doc comments directly above `name_line`, plus the line the
/// element's span starts on once decorators are included.
fn prefix_lines(lines: &[&str], name_line: usize, family: Family) -> (Vec<String>, Option<String>, usize) {
    let mut decorators = Vec::new();
    let mut idx = name_line - 1;
    while idx > 0 && family.is_decorator_line(lines[idx - 1].trim()) {
        decorators.insert(0, clean_decorator(lines[idx - 1]));
        idx -= 1;
    }
    let start_line = idx + 1;

    let mut comment = Vec::new();
    while idx > 0 && family.is_comment_line(lines[idx - 1].trim()) {
        comment.insert(0, lines[idx - 1]);
        idx -= 1;
    }
    let doc = strip_comment(&comment.join("\n"));

    (decorators, (!doc.is_empty()).then_some(doc), start_line)
}

fn parse_params(params: &str, style: ParamStyle, language: &str) -> Vec<String> {
    split_top_level(params)
        .into_iter()
        .filter_map(|piece| {
            let head = piece.split('=').next().unwrap_or("");
            match style {
                ParamStyle::NameFirst => {
                    let head = head.split(':').next().unwrap_or("");
                    WORD.find_iter(head)
                        .map(|m| m.as_str())
                        .find(|w| *w == "self" || !is_keyword(w, language))
                        .map(str::to_string)
                }
                ParamStyle::TypeFirst => WORD
                    .find_iter(head)
                    .last()
                    .map(|m| m.as_str())
                    .filter(|w| !is_keyword(w, language))
                    .map(str::to_string),
            }
        })
        .collect()
}

/// Split on commas that are not nested in brackets.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth <= 0 => {
                pieces.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);
    pieces.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Attach functions to their innermost enclosing class and set scopes.
fn assign_scopes(extraction: &mut Extraction) {
    let classes: Vec<(usize, usize)> = extraction
        .classes
        .iter()
        .map(|c| (c.start_line, c.end_line))
        .collect();
    let functions: Vec<(usize, usize)> = extraction
        .functions
        .iter()
        .map(|f| (f.start_line, f.end_line))
        .collect();

    let innermost = |line: usize, spans: &[(usize, usize)]| -> Option<(usize, usize)> {
        spans
            .iter()
            .enumerate()
            .filter(|(_, (start, end))| *start < line && line <= *end)
            .max_by_key(|(_, (start, _))| *start)
            .map(|(idx, (start, _))| (idx, *start))
    };

    let scope_of = |line: usize| -> (Scope, Option<usize>) {
        match (innermost(line, &classes), innermost(line, &functions)) {
            (Some((class_idx, class_start)), Some((_, fn_start))) if class_start > fn_start => {
                (Scope::Class, Some(class_idx))
            }
            (Some((class_idx, _)), None) => (Scope::Class, Some(class_idx)),
            (_, Some(_)) => (Scope::Local, None),
            (None, None) => (Scope::Global, None),
        }
    };

    let mut methods: Vec<(usize, String)> = Vec::new();
    for func in extraction.functions.iter_mut() {
        let (scope, class_idx) = scope_of(func.start_line);
        func.scope = scope;
        if let Some(idx) = class_idx {
            methods.push((idx, func.name.clone()));
        }
    }
    for (idx, name) in methods {
        extraction.classes[idx].methods.push(name);
    }

    for var in extraction.variables.iter_mut() {
        var.scope = scope_of(var.start_line).0;
    }
    for class in extraction.classes.iter_mut() {
        class.scope = scope_of(class.start_line).0;
    }
}

/// Strip comment markers from a (possibly multi-line) comment.
pub(crate) fn strip_comment(text: &str) -> String {
    text.lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_suffix("*/").unwrap_or(line);
            let line = ["/**", "/*!", "/*", "///", "//!", "//", "#", "*"]
                .iter()
                .find_map(|marker| line.strip_prefix(marker))
                .unwrap_or(line);
            line.trim()
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// `@name(args)` / `#[attr]` / `[Attr]` to the bare decorator text.
pub(crate) fn clean_decorator(text: &str) -> String {
    let first = text.lines().next().unwrap_or("").trim();
    let first = first.strip_prefix('@').unwrap_or(first);
    if let Some(inner) = first.strip_prefix("#[") {
        return inner.strip_suffix(']').unwrap_or(inner).to_string();
    }
    if let Some(inner) = first.strip_prefix('[') {
        return inner.strip_suffix(']').unwrap_or(inner).to_string();
    }
    first.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(language: &'static str) -> impl Fn(&str) -> Extraction {
        let backends = builtin_backends();
        let backend = backends.get(language).unwrap().clone();
        move |source: &str| backend.analyze(source).unwrap()
    }

    #[test]
    fn test_python_indentation_blocks() {
        let source = "import os\n\nclass Calc(Base):\n    \"\"\"Adds things.\"\"\"\n\n    def add(self, a, b=1):\n        return a + b\n\n    @staticmethod\n    def zero():\n        return 0\n\ndef main():\n    pass\n";
        let ex = run("python")(source);

        let calc = &ex.classes[0];
        assert_eq!(calc.name, "Calc");
        assert_eq!((calc.start_line, calc.end_line), (3, 11));
        assert_eq!(calc.bases, vec!["Base"]);
        assert_eq!(calc.docstring.as_deref(), Some("Adds things."));
        assert_eq!(calc.methods, vec!["add", "zero"]);

        let add = ex.functions.iter().find(|f| f.name == "add").unwrap();
        assert_eq!(add.parameters, vec!["self", "a", "b"]);
        assert_eq!((add.start_line, add.end_line), (6, 7));
        assert_eq!(add.scope, Scope::Class);

        let zero = ex.functions.iter().find(|f| f.name == "zero").unwrap();
        assert_eq!(zero.decorators, vec!["staticmethod"]);
        assert_eq!(zero.start_line, 9);

        let main = ex.functions.iter().find(|f| f.name == "main").unwrap();
        assert_eq!(main.scope, Scope::Global);
        assert_eq!(ex.imports[0].name, "os");
    }

    #[test]
    fn test_python_one_liners() {
        let source = "def add(a, b): return a + b\ndef sub(a, b): return a - b\n";
        let ex = run("python")(source);
        let spans: Vec<_> = ex
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f.start_line, f.end_line))
            .collect();
        assert_eq!(spans, vec![("add", 1, 1), ("sub", 2, 2)]);
    }

    #[test]
    fn test_brace_block_end_skips_strings_and_comments() {
        let source = "function f(a) {\n  const s = \"}\";\n  // }\n  return a;\n}\nfunction g() {}\n";
        let ex = run("javascript")(source);

        let f = ex.functions.iter().find(|f| f.name == "f").unwrap();
        assert_eq!((f.start_line, f.end_line), (1, 5));
        let g = ex.functions.iter().find(|f| f.name == "g").unwrap();
        assert_eq!((g.start_line, g.end_line), (6, 6));
    }

    #[test]
    fn test_javascript_patterns() {
        let source = "import x from './x';\nconst y = require('y');\nconst mul = async (a, b) => {\n  return a * b;\n};\nclass Box extends Base {\n  open(lid) {\n    return lid;\n  }\n}\n";
        let ex = run("javascript")(source);

        let imports: Vec<_> = ex.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(imports, vec!["./x", "y"]);

        let mul = ex.functions.iter().find(|f| f.name == "mul").unwrap();
        assert!(mul.is_async);
        assert_eq!(mul.parameters, vec!["a", "b"]);
        assert_eq!(mul.end_line, 5);

        let boxed = &ex.classes[0];
        assert_eq!(boxed.bases, vec!["Base"]);
        assert_eq!(boxed.methods, vec!["open"]);
    }

    #[test]
    fn test_java_statements_are_not_methods() {
        let source = "public class A {\n    public A(int x) {\n        throw new IllegalStateException(msg);\n    }\n    int size() {\n        return compute(x);\n    }\n}\n";
        let ex = run("java")(source);

        let mut names: Vec<_> = ex.functions.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["A", "size"]);

        let ctor = ex.functions.iter().find(|f| f.name == "A").unwrap();
        assert_eq!(ctor.parameters, vec!["x"]);
    }

    #[test]
    fn test_c_prototypes_are_single_line() {
        let source = "#include <stdio.h>\nint add(int a, int b);\nint add(int a, int b)\n{\n    return a + b;\n}\n";
        let ex = run("c")(source);

        let spans: Vec<_> = ex.functions.iter().map(|f| (f.start_line, f.end_line)).collect();
        assert_eq!(spans, vec![(2, 2), (3, 6)]);
        assert_eq!(ex.functions[1].parameters, vec!["a", "b"]);
        assert_eq!(ex.imports[0].name, "stdio.h");
    }

    #[test]
    fn test_rust_lifetimes_do_not_break_blocks() {
        let source = "use std::fmt;\n\nimpl<'a> fmt::Display for Wrapper<'a> {\n    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {\n        write!(f, \"{}\", 'x')\n    }\n}\n";
        let ex = run("rust")(source);

        let imp = &ex.classes[0];
        assert_eq!(imp.name, "Wrapper");
        assert_eq!(imp.bases, vec!["fmt::Display"]);
        assert_eq!((imp.start_line, imp.end_line), (3, 7));

        let fmt = &ex.functions[0];
        assert_eq!(fmt.parameters, vec!["self", "f"]);
        assert_eq!((fmt.start_line, fmt.end_line), (4, 6));
    }

    #[test]
    fn test_go_import_block() {
        let source = "package main\n\nimport (\n\t\"fmt\"\n\tstr \"strings\"\n)\n\nfunc main() {\n\tfmt.Println(str.ToUpper(\"x\"))\n}\n";
        let ex = run("go")(source);

        let imports: Vec<_> = ex.imports.iter().map(|i| (i.name.as_str(), i.start_line)).collect();
        assert_eq!(imports, vec![("fmt", 4), ("strings", 5)]);
        assert_eq!((ex.functions[0].start_line, ex.functions[0].end_line), (8, 10));
    }

    #[test]
    fn test_markup_has_no_elements() {
        let ex = run("html")("<html><body><div>hi</div></body></html>");
        assert!(ex.functions.is_empty() && ex.classes.is_empty());
        assert!(!ex.has_syntax_errors);
    }

    #[test]
    fn test_generic_backend() {
        let source = "FUNCTION total(a, b) {\n  return a + b\n}\n";
        let ex = GenericBackend.analyze(source).unwrap();
        assert_eq!(ex.functions.len(), 1);
        assert_eq!(ex.functions[0].name, "total");
        assert_eq!(ex.functions[0].end_line, 3);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("Map<K, V> m, int[] xs, fn(a, b)"),
            vec!["Map<K, V> m", "int[] xs", "fn(a, b)"]
        );
        assert!(split_top_level("  ").is_empty());
    }

    #[test]
    fn test_clean_decorator() {
        assert_eq!(clean_decorator("@app.route(\"/\")"), "app.route(\"/\")");
        assert_eq!(clean_decorator("#[derive(Debug)]"), "derive(Debug)");
        assert_eq!(clean_decorator("[Serializable]"), "Serializable");
    }

    #[test]
    fn test_strip_comment() {
        assert_eq!(strip_comment("/// Adds two numbers."), "Adds two numbers.");
        assert_eq!(strip_comment("/**\n * Docs here.\n */"), "Docs here.");
        assert_eq!(strip_comment("# note"), "note");
    }
}
