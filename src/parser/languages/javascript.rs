//! JavaScript grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_javascript::LANGUAGE.into())
}

pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[("field_definition", Some(ElementKind::Variable))],
    name_fields: &[("field_definition", "property")],
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::languages::extract;

    const SOURCE: &str = r#"import React from 'react';
const fs = require('fs');

/** Adds numbers. */
function add(a, b = 1, ...rest) {
  return a + b;
}

const mul = async (x, y) => x * y;

class Greeter extends Base {
  greet(name) {
    return name ? `hi ${name}` : 'hi';
  }
}

items.forEach(function (item) { console.log(item); });
"#;

    #[test]
    fn test_javascript_imports_include_require() {
        let ex = extract("javascript", grammar, SOURCE);
        let imports: Vec<_> = ex.imports.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(imports, vec!["react", "fs"]);
    }

    #[test]
    fn test_javascript_functions() {
        let ex = extract("javascript", grammar, SOURCE);

        let mut names: Vec<_> = ex.functions.iter().map(|f| f.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["", "add", "greet", "mul"], "anonymous callbacks have no name");

        let callback = ex.functions.iter().find(|f| f.name.is_empty()).unwrap();
        assert_eq!((callback.start_line, callback.end_line), (17, 17));
        assert_eq!(callback.parameters, vec!["item"]);

        let add = ex.functions.iter().find(|f| f.name == "add").unwrap();
        assert_eq!(add.parameters, vec!["a", "b", "rest"]);
        assert_eq!(add.docstring.as_deref(), Some("Adds numbers."));
        assert_eq!((add.start_line, add.end_line), (5, 7));

        let mul = ex.functions.iter().find(|f| f.name == "mul").unwrap();
        assert!(mul.is_async);
        assert_eq!(mul.parameters, vec!["x", "y"]);
    }

    #[test]
    fn test_javascript_class() {
        let ex = extract("javascript", grammar, SOURCE);
        let greeter = ex.classes.iter().find(|c| c.name == "Greeter").unwrap();
        assert_eq!(greeter.bases, vec!["Base"]);
        assert_eq!(greeter.methods, vec!["greet"]);
        assert_eq!(ex.branch_count, 1);
    }
}
