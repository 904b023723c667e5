//! C++ grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_cpp::LANGUAGE.into())
}

pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("class_specifier", Some(ElementKind::Class)),
        ("struct_specifier", Some(ElementKind::Class)),
        ("union_specifier", Some(ElementKind::Class)),
        ("enum_specifier", Some(ElementKind::Class)),
        ("init_declarator", Some(ElementKind::Variable)),
    ],
    name_fields: &[],
};
