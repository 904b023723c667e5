//! Python grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_python::LANGUAGE.into())
}

/// Assignments are Python's only variable declarations.
pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[("assignment", Some(ElementKind::Variable))],
    name_fields: &[("assignment", "left")],
};
