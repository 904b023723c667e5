//! Swift grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_swift::LANGUAGE.into())
}

/// `class_declaration` covers classes, structs, enums and extensions.
pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("protocol_declaration", Some(ElementKind::Class)),
        ("protocol_function_declaration", Some(ElementKind::Function)),
        ("property_declaration", Some(ElementKind::Variable)),
    ],
    name_fields: &[],
};
