//! Rust grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_rust::LANGUAGE.into())
}

/// Type-level items are classes. Impl blocks are named after the
/// implementing type.
pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("function_item", Some(ElementKind::Function)),
        ("function_signature_item", Some(ElementKind::Function)),
        ("struct_item", Some(ElementKind::Class)),
        ("enum_item", Some(ElementKind::Class)),
        ("union_item", Some(ElementKind::Class)),
        ("trait_item", Some(ElementKind::Class)),
        ("impl_item", Some(ElementKind::Class)),
        ("const_item", Some(ElementKind::Variable)),
        ("static_item", Some(ElementKind::Variable)),
    ],
    name_fields: &[("impl_item", "type"), ("let_declaration", "pattern")],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Scope;
    use crate::parser::languages::extract;

    const SOURCE: &str = r#"use std::fmt;

/// A counter.
#[derive(Debug, Default)]
pub struct Counter {
    value: u32,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

pub async fn tick(counter: &mut Counter, by: u32) {
    let next = counter.value + by;
    if next > 10 {
        counter.value = 0;
    } else {
        counter.value = next;
    }
}
"#;

    #[test]
    fn test_rust_struct_attributes_and_docs() {
        let ex = extract("rust", grammar, SOURCE);
        let counter = &ex.classes[0];

        assert_eq!(counter.name, "Counter");
        assert_eq!(counter.decorators, vec!["derive(Debug, Default)"]);
        assert_eq!(counter.docstring.as_deref(), Some("A counter."));
        assert_eq!((counter.start_line, counter.end_line), (5, 7));
    }

    #[test]
    fn test_rust_impl_named_after_type() {
        let ex = extract("rust", grammar, SOURCE);
        let imp = &ex.classes[1];

        assert_eq!(imp.name, "Counter");
        assert_eq!(imp.bases, vec!["fmt::Display"]);
        assert_eq!(imp.methods, vec!["fmt"]);

        let fmt = ex.functions.iter().find(|f| f.name == "fmt").unwrap();
        assert_eq!(fmt.parameters, vec!["self", "f"]);
        assert_eq!(fmt.scope, Scope::Class);
    }

    #[test]
    fn test_rust_functions_and_bindings() {
        let ex = extract("rust", grammar, SOURCE);

        let tick = ex.functions.iter().find(|f| f.name == "tick").unwrap();
        assert!(tick.is_async);
        assert_eq!(tick.parameters, vec!["counter", "by"]);

        let vars: Vec<_> = ex.variables.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(vars, vec!["next"]);
        assert_eq!(ex.imports[0].name, "std::fmt");
        assert_eq!(ex.branch_count, 1);
    }
}
