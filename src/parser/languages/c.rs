//! C grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_c::LANGUAGE.into())
}

/// Aggregate types count as classes only when they carry a body.
pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("struct_specifier", Some(ElementKind::Class)),
        ("union_specifier", Some(ElementKind::Class)),
        ("enum_specifier", Some(ElementKind::Class)),
        ("init_declarator", Some(ElementKind::Variable)),
    ],
    name_fields: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::languages::extract;

    const SOURCE: &str = r#"#include <stdio.h>
#include "util.h"

struct point {
    int x;
    int y;
};

/* Sum of two ints. */
static int add(int a, int b) {
    return a + b;
}

int *make(void) {
    int total = 0;
    for (int i = 0; i < 3; i++) {
        total += i;
    }
    return 0;
}
"#;

    #[test]
    fn test_c_includes_and_structs() {
        let ex = extract("c", grammar, SOURCE);

        let imports: Vec<_> = ex.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(imports, vec!["stdio.h", "util.h"]);

        assert_eq!(ex.classes.len(), 1);
        assert_eq!(ex.classes[0].name, "point");
        assert_eq!(ex.classes[0].start_line, 4);
    }

    #[test]
    fn test_c_declarator_chains() {
        let ex = extract("c", grammar, SOURCE);

        let add = ex.functions.iter().find(|f| f.name == "add").unwrap();
        assert_eq!(add.parameters, vec!["a", "b"]);
        assert_eq!(add.docstring.as_deref(), Some("Sum of two ints."));
        assert_eq!((add.start_line, add.end_line), (10, 12));

        let make = ex.functions.iter().find(|f| f.name == "make").unwrap();
        assert!(make.parameters.is_empty());

        let vars: Vec<_> = ex.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(vars, vec!["total", "i"]);
    }

    #[test]
    fn test_c_reassignment_is_not_a_declaration() {
        let source = "int count = 1;\n\nvoid bump(void) {\n    count = 2;\n    count += 3;\n}\n";
        let ex = extract("c", grammar, source);

        let vars: Vec<_> = ex.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(vars, vec!["count"]);
    }
}
