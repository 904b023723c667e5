//! TypeScript and TSX grammars.

use tree_sitter::Language;

use crate::analysis::ElementKind;
use crate::parser::structural::LanguageProfile;

pub fn grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
}

pub fn tsx_grammar() -> anyhow::Result<Language> {
    Ok(tree_sitter_typescript::LANGUAGE_TSX.into())
}

/// Shared by `.ts` and `.tsx`; type-level declarations count as classes.
pub static PROFILE: LanguageProfile = LanguageProfile {
    node_kinds: &[
        ("abstract_class_declaration", Some(ElementKind::Class)),
        ("type_alias_declaration", Some(ElementKind::Class)),
        ("method_signature", Some(ElementKind::Function)),
        ("abstract_method_signature", Some(ElementKind::Function)),
        ("public_field_definition", Some(ElementKind::Variable)),
    ],
    name_fields: &[],
};
