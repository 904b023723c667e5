//! Java grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_java::LANGUAGE.into())
}

pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("constructor_declaration", Some(ElementKind::Function)),
        ("record_declaration", Some(ElementKind::Class)),
        ("annotation_type_declaration", Some(ElementKind::Class)),
    ],
    name_fields: &[],
};
