//! Go grammar.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_go::LANGUAGE.into())
}

/// Go groups declarations; the individual specs are the elements.
pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("type_declaration", None),
        ("type_spec", Some(ElementKind::Class)),
        ("import_declaration", None),
        ("import_spec", Some(ElementKind::Import)),
        ("var_declaration", None),
        ("const_declaration", None),
        ("var_spec", Some(ElementKind::Variable)),
        ("const_spec", Some(ElementKind::Variable)),
        ("short_var_declaration", Some(ElementKind::Variable)),
    ],
    name_fields: &[("short_var_declaration", "left")],
};
