//! Per-language reserved word blocklists.
//!
//! Names that match one of these are never reported as element names,
//! returned from name searches, or selected as rewrite targets. Known
//! languages are matched case-sensitively; the generic list ignores case.

use phf::phf_set;

static PYTHON: phf::Set<&'static str> = phf_set! {
    "def", "class", "import", "from", "if", "else", "elif", "for", "while", "try",
    "except", "finally", "with", "as", "return", "yield", "lambda", "and", "or",
    "not", "in", "is", "async", "await", "pass", "break", "continue", "raise",
    "global", "nonlocal", "del", "assert", "None", "True", "False", "self", "match",
    "case",
};

static JAVASCRIPT: phf::Set<&'static str> = phf_set! {
    "function", "class", "import", "from", "export", "if", "else", "for", "while",
    "do", "try", "catch", "finally", "return", "var", "let", "const", "typeof",
    "instanceof", "new", "this", "super", "extends", "async", "await", "yield",
    "switch", "case", "default", "break", "continue", "throw", "delete", "void",
    "null", "undefined", "true", "false", "static", "get", "set", "of", "in",
};

static TYPESCRIPT: phf::Set<&'static str> = phf_set! {
    "function", "class", "import", "from", "export", "if", "else", "for", "while",
    "do", "try", "catch", "finally", "return", "var", "let", "const", "typeof",
    "instanceof", "new", "this", "super", "extends", "async", "await", "yield",
    "switch", "case", "default", "break", "continue", "throw", "delete", "void",
    "null", "undefined", "true", "false", "static", "get", "set", "of", "in",
    "interface", "type", "enum", "implements", "namespace", "module", "declare",
    "abstract", "public", "private", "protected", "readonly", "keyof", "as", "any",
};

static JAVA: phf::Set<&'static str> = phf_set! {
    "class", "interface", "import", "package", "if", "else", "for", "while", "do",
    "try", "catch", "finally", "return", "public", "private", "protected", "static",
    "final", "abstract", "extends", "implements", "new", "this", "super", "void",
    "switch", "case", "default", "break", "continue", "throw", "throws", "enum",
    "synchronized", "native", "transient", "volatile", "null", "true", "false",
    "record",
};

static GO: phf::Set<&'static str> = phf_set! {
    "func", "type", "import", "package", "if", "else", "for", "range", "return",
    "var", "const", "struct", "interface", "map", "chan", "go", "defer", "select",
    "switch", "case", "default", "break", "continue", "fallthrough", "goto", "nil",
    "true", "false",
};

static RUST: phf::Set<&'static str> = phf_set! {
    "fn", "struct", "enum", "impl", "trait", "use", "if", "else", "for", "while",
    "loop", "return", "let", "mut", "pub", "mod", "crate", "self", "super", "match",
    "where", "type", "const", "static", "unsafe", "async", "await", "move", "ref",
    "dyn", "extern", "as", "in", "break", "continue", "true", "false",
};

static C_FAMILY: phf::Set<&'static str> = phf_set! {
    "if", "else", "for", "while", "do", "switch", "case", "default", "break",
    "continue", "return", "goto", "struct", "union", "enum", "typedef", "static",
    "extern", "const", "volatile", "inline", "sizeof", "void", "int", "char",
    "short", "long", "float", "double", "signed", "unsigned", "auto", "register",
    "class", "namespace", "template", "typename", "public", "private", "protected",
    "virtual", "override", "new", "delete", "this", "using", "operator", "include",
    "define",
};

static C_SHARP: phf::Set<&'static str> = phf_set! {
    "class", "interface", "struct", "enum", "namespace", "using", "if", "else",
    "for", "foreach", "while", "do", "try", "catch", "finally", "return", "public",
    "private", "protected", "internal", "static", "virtual", "override", "abstract",
    "sealed", "new", "this", "base", "void", "switch", "case", "default", "break",
    "continue", "throw", "async", "await", "null", "true", "false", "var",
};

static SCALA: phf::Set<&'static str> = phf_set! {
    "def", "class", "object", "trait", "import", "package", "if", "else", "for",
    "while", "do", "try", "catch", "finally", "return", "val", "var", "extends",
    "with", "new", "this", "super", "match", "case", "yield", "implicit", "override",
    "sealed", "abstract", "final", "lazy", "type", "null", "true", "false",
};

static SWIFT: phf::Set<&'static str> = phf_set! {
    "func", "class", "struct", "enum", "protocol", "extension", "import", "if",
    "else", "for", "while", "repeat", "guard", "switch", "case", "default", "return",
    "let", "var", "init", "deinit", "self", "super", "public", "private", "internal",
    "fileprivate", "open", "static", "override", "throws", "throw", "try", "async",
    "await", "nil", "true", "false", "in",
};

/// Minimal set applied to languages without a dedicated list.
static GENERIC: phf::Set<&'static str> = phf_set! {
    "function", "def", "fn", "func", "class", "struct", "import", "if", "else",
    "for", "while", "return", "switch", "case",
};

fn keywords_for(language: &str) -> Option<&'static phf::Set<&'static str>> {
    match language {
        "python" => Some(&PYTHON),
        "javascript" => Some(&JAVASCRIPT),
        "typescript" | "tsx" => Some(&TYPESCRIPT),
        "java" => Some(&JAVA),
        "go" => Some(&GO),
        "rust" => Some(&RUST),
        "c" | "cpp" | "objective_c" => Some(&C_FAMILY),
        "c_sharp" => Some(&C_SHARP),
        "scala" => Some(&SCALA),
        "swift" => Some(&SWIFT),
        _ => None,
    }
}

/// Whether `word` is a reserved word of `language`.
///
/// Known languages match exactly (`Match` is not `match`); the generic list
/// ignores case.
pub fn is_keyword(word: &str, language: &str) -> bool {
    match keywords_for(language) {
        Some(words) => words.contains(word),
        None => GENERIC.contains(word.to_lowercase().as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_keywords() {
        assert!(is_keyword("def", "python"));
        assert!(is_keyword("None", "python"));
        assert!(!is_keyword("none", "python"));
        assert!(!is_keyword("add", "python"));
    }

    #[test]
    fn test_capitalized_names_are_not_keywords() {
        assert!(!is_keyword("Match", "python"));
        assert!(!is_keyword("Class", "python"));
        assert!(!is_keyword("Record", "java"));
        assert!(!is_keyword("Set", "javascript"));
        assert!(!is_keyword("Get", "typescript"));
        assert!(!is_keyword("Type", "rust"));
        assert!(!is_keyword("Move", "rust"));
        assert!(is_keyword("record", "java"));
        assert!(is_keyword("move", "rust"));
    }

    #[test]
    fn test_tsx_shares_typescript_list() {
        assert!(is_keyword("interface", "tsx"));
        assert!(!is_keyword("interface", "javascript"));
    }

    #[test]
    fn test_unknown_language_uses_generic_list() {
        assert!(is_keyword("function", "cobol"));
        assert!(is_keyword("FUNCTION", "cobol"));
        assert!(!is_keyword("payroll", "cobol"));
    }
}
