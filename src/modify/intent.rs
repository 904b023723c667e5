//! Instruction classification and target selection.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::analysis::keywords::is_keyword;
use crate::analysis::{Element, ElementKind, FileAnalysis};

/// Coarse category of a change request. Advisory only: it is reported and
/// logged but never influences which elements are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModificationType {
    Add,
    Fix,
    Update,
    Remove,
    Refactor,
    General,
}

impl ModificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModificationType::Add => "add",
            ModificationType::Fix => "fix",
            ModificationType::Update => "update",
            ModificationType::Remove => "remove",
            ModificationType::Refactor => "refactor",
            ModificationType::General => "general",
        }
    }
}

impl fmt::Display for ModificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checked in order; the first category with a matching word wins.
const CATEGORIES: &[(ModificationType, &[&str])] = &[
    (ModificationType::Add, &["add", "create", "new", "implement"]),
    (ModificationType::Fix, &["fix", "bug", "error", "correct", "syntax"]),
    (ModificationType::Update, &["update", "modify", "change", "improve"]),
    (ModificationType::Remove, &["remove", "delete", "drop"]),
    (ModificationType::Refactor, &["refactor", "restructure", "optimize"]),
];

/// Words that refer to "the functions" without naming one.
const GENERIC_WORDS: &[&str] = &["function", "method"];

/// Shortest element name that can be targeted, exclusive.
const MIN_NAME_LEN: usize = 2;

pub fn classify(instruction: &str) -> ModificationType {
    let lower = instruction.to_lowercase();
    CATEGORIES
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(kind, _)| *kind)
        .unwrap_or(ModificationType::General)
}

/// Selected targets in the order they must be replaced.
#[derive(Debug, Clone, Serialize)]
pub struct ModificationPlan {
    pub modification_type: ModificationType,
    pub targets: Vec<Element>,
}

/// Classify `instruction` and pick the elements of `analysis` it refers to.
///
/// Functions and classes whose name is mentioned in the instruction are
/// selected. If none is mentioned but the instruction talks about a
/// function or method generically, every function is selected. Names of
/// two characters or fewer and keywords are never selected.
///
/// Targets are ordered by `end_line` descending (ties: outer element
/// first), so replacing them in order never shifts a pending target.
pub fn plan(analysis: &FileAnalysis, instruction: &str) -> ModificationPlan {
    let lower = instruction.to_lowercase();

    let eligible: Vec<&Element> = analysis
        .callables_and_classes()
        .filter(|el| el.name.chars().count() > MIN_NAME_LEN)
        .filter(|el| !is_keyword(&el.name, &analysis.language))
        .collect();

    let named: Vec<&Element> = eligible
        .iter()
        .copied()
        .filter(|el| mentions(&lower, &el.name.to_lowercase()))
        .collect();

    let chosen = if !named.is_empty() {
        named
    } else if GENERIC_WORDS.iter().any(|w| lower.contains(w)) {
        eligible
            .into_iter()
            .filter(|el| el.kind() == ElementKind::Function)
            .collect()
    } else {
        Vec::new()
    };

    let mut seen = HashSet::new();
    let mut targets: Vec<Element> = chosen
        .into_iter()
        .filter(|el| seen.insert((el.kind(), el.name.clone(), el.start_line)))
        .cloned()
        .collect();
    targets.sort_by(|a, b| {
        b.end_line
            .cmp(&a.end_line)
            .then(a.start_line.cmp(&b.start_line))
    });

    ModificationPlan {
        modification_type: classify(instruction),
        targets,
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `name` occurs in `text` as a whole identifier.
fn mentions(text: &str, name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    text.match_indices(name).any(|(i, _)| {
        let before = text[..i].chars().next_back();
        let after = text[i + name.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}
