//! Targeted modification of cached elements.
//!
//! ```text
//!  instruction ──► plan ──► targets (end_line desc)
//!                              │
//!       source lines ◄─ splice ┤ per target: extract ► Rewriter ► compare
//!                              │
//!                   no targets ┴► whole-file request
//! ```
//!
//! Targets are replaced bottom-up, so a replacement never moves the lines of
//! a target that is still pending. All edits happen on an in-memory line
//! buffer; nothing is written to disk here.

mod intent;
mod rewriter;

pub use intent::{classify, plan, ModificationPlan, ModificationType};
pub use rewriter::{extract_code, CommandRewriter, RewriteError, RewriteRequest, Rewriter};

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::{BackendId, Element, ElementKind, FileAnalysis};

/// What happened to one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Modified,
    Unchanged,
    Failed,
    /// The recorded range starts past the end of the live file.
    Stale,
    /// The range intersects an element that was already replaced.
    Overlapping,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementOutcome {
    pub kind: ElementKind,
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ElementOutcome {
    fn new(target: &Element, end_line: usize, status: OutcomeStatus, detail: Option<String>) -> Self {
        Self {
            kind: target.kind(),
            name: target.name.clone(),
            start_line: target.start_line,
            end_line,
            status,
            detail,
        }
    }

    pub fn describe(&self) -> String {
        let what = format!("{} '{}'", self.kind, self.name);
        match self.status {
            OutcomeStatus::Modified => format!(
                "Modified {} (lines {}-{})",
                what, self.start_line, self.end_line
            ),
            OutcomeStatus::Unchanged => format!("No changes needed for {}", what),
            OutcomeStatus::Failed => format!(
                "Failed to modify {}: {}",
                what,
                self.detail.as_deref().unwrap_or("unknown error")
            ),
            OutcomeStatus::Stale => format!(
                "Skipped {}: line {} is past the end of the file",
                what, self.start_line
            ),
            OutcomeStatus::Overlapping => {
                format!("Skipped {}: overlaps an element already modified", what)
            }
        }
    }
}

/// One replaced region. `old_start` is 1-based in the original file,
/// `new_start` in the modified one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hunk {
    pub old_start: usize,
    pub old_lines: Vec<String>,
    pub new_start: usize,
    pub new_lines: Vec<String>,
}

impl Hunk {
    /// Hunk for replacing `old` at `old_start` with `new`, with the lines
    /// both sides share at either end dropped. `None` if nothing differs.
    fn trimmed(old_start: usize, old: &[String], new: &[String]) -> Option<Self> {
        let prefix = old
            .iter()
            .zip(new.iter())
            .take_while(|(a, b)| a == b)
            .count();
        let suffix = old[prefix..]
            .iter()
            .rev()
            .zip(new[prefix..].iter().rev())
            .take_while(|(a, b)| a == b)
            .count();

        let old_lines = old[prefix..old.len() - suffix].to_vec();
        let new_lines = new[prefix..new.len() - suffix].to_vec();
        if old_lines.is_empty() && new_lines.is_empty() {
            return None;
        }
        Some(Self {
            old_start: old_start + prefix,
            old_lines,
            new_start: 0,
            new_lines,
        })
    }
}

/// Result of one modification request. Always produced, even when every
/// rewrite failed.
#[derive(Debug, Clone, Serialize)]
pub struct ModificationResult {
    pub success: bool,
    pub file_path: String,
    pub modification_type: ModificationType,
    /// The whole file went to the rewriter because no element was targeted.
    pub whole_file: bool,
    pub original_content: String,
    pub modified_content: String,
    pub outcomes: Vec<ElementOutcome>,
    pub changes: Vec<String>,
    pub targets_modified: usize,
    pub backend_used: BackendId,
    pub hunks: Vec<Hunk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModificationResult {
    pub fn is_changed(&self) -> bool {
        self.original_content != self.modified_content
    }

    /// Unified diff of the change, without context lines. Empty when
    /// nothing changed.
    pub fn diff(&self) -> String {
        if self.hunks.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        let _ = writeln!(out, "--- a/{}", self.file_path);
        let _ = writeln!(out, "+++ b/{}", self.file_path);
        for hunk in &self.hunks {
            let _ = writeln!(
                out,
                "@@ -{} +{} @@",
                hunk_range(hunk.old_start, hunk.old_lines.len()),
                hunk_range(hunk.new_start, hunk.new_lines.len())
            );
            for line in &hunk.old_lines {
                let _ = writeln!(out, "-{}", line);
            }
            for line in &hunk.new_lines {
                let _ = writeln!(out, "+{}", line);
            }
        }
        out
    }
}

fn hunk_range(start: usize, count: usize) -> String {
    match count {
        0 => format!("{},0", start.saturating_sub(1)),
        1 => start.to_string(),
        n => format!("{},{}", start, n),
    }
}

fn split_lines(text: &str) -> Vec<String> {
    text.split('\n').map(str::to_string).collect()
}

/// Replacement text as buffer lines. Blank text deletes the range.
fn replacement_lines(replacement: &str) -> Vec<String> {
    if replacement.trim().is_empty() {
        Vec::new()
    } else {
        split_lines(replacement.trim_end_matches(['\r', '\n']))
    }
}

/// Give each hunk its position in the modified file.
fn place_hunks(mut hunks: Vec<Hunk>) -> Vec<Hunk> {
    hunks.sort_by_key(|h| h.old_start);
    let mut shift: isize = 0;
    for hunk in &mut hunks {
        hunk.new_start = (hunk.old_start as isize + shift).max(1) as usize;
        shift += hunk.new_lines.len() as isize - hunk.old_lines.len() as isize;
    }
    hunks
}

/// Applies instructions to the elements of an analyzed file through a
/// [`Rewriter`].
pub struct TargetedModifier<R> {
    rewriter: R,
}

impl<R: Rewriter> TargetedModifier<R> {
    pub fn new(rewriter: R) -> Self {
        Self { rewriter }
    }

    pub fn rewriter(&self) -> &R {
        &self.rewriter
    }

    /// Classification and ordered targets, without rewriting anything.
    pub fn plan(&self, analysis: &FileAnalysis, instruction: &str) -> ModificationPlan {
        plan(analysis, instruction)
    }

    /// Apply `instruction` to `source`, whose structure is `analysis`.
    ///
    /// `analysis` may be older than `source`: an `end_line` past the end of
    /// the file is truncated to the last line, and a target starting past
    /// it is reported as [`OutcomeStatus::Stale`].
    pub fn modify(
        &self,
        analysis: &FileAnalysis,
        source: &str,
        instruction: &str,
    ) -> ModificationResult {
        let plan = plan(analysis, instruction);
        info!(
            file = %analysis.file_path,
            kind = %plan.modification_type,
            targets = plan.targets.len(),
            "modifying file"
        );

        if plan.targets.is_empty() {
            return self.modify_whole_file(analysis, source, instruction, plan.modification_type);
        }

        let mut lines = split_lines(source);
        let mut replaced: Vec<(usize, usize)> = Vec::new();
        let mut hunks = Vec::new();
        let mut outcomes = Vec::with_capacity(plan.targets.len());

        for target in &plan.targets {
            let total = lines.len();
            if target.start_line == 0 || target.start_line > total {
                debug!(name = %target.name, start = target.start_line, total, "stale target");
                outcomes.push(ElementOutcome::new(target, target.end_line, OutcomeStatus::Stale, None));
                continue;
            }

            let start = target.start_line;
            let end = target.end_line.min(total);
            if end < target.end_line {
                debug!(name = %target.name, from = target.end_line, to = end, "clamped end line");
            }

            if replaced.iter().any(|&(s, e)| start <= e && s <= end) {
                outcomes.push(ElementOutcome::new(target, end, OutcomeStatus::Overlapping, None));
                continue;
            }

            let original_lines = &lines[start - 1..end];
            let original = original_lines.join("\n");
            let request =
                RewriteRequest::for_element(analysis, target, &original, instruction, start, end);

            match self.rewriter.rewrite(&request) {
                Err(e) => {
                    warn!(name = %target.name, error = %e, "rewrite failed");
                    outcomes.push(ElementOutcome::new(
                        target,
                        end,
                        OutcomeStatus::Failed,
                        Some(e.to_string()),
                    ));
                }
                Ok(replacement) if replacement.trim() == original.trim() => {
                    outcomes.push(ElementOutcome::new(target, end, OutcomeStatus::Unchanged, None));
                }
                Ok(replacement) => {
                    let new_lines = replacement_lines(&replacement);
                    hunks.extend(Hunk::trimmed(start, original_lines, &new_lines));
                    lines.splice(start - 1..end, new_lines);
                    replaced.push((start, end));
                    outcomes.push(ElementOutcome::new(target, end, OutcomeStatus::Modified, None));
                }
            }
        }

        let failed = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count();
        let success = failed < outcomes.len();
        let targets_modified = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Modified)
            .count();
        info!(
            file = %analysis.file_path,
            modified = targets_modified,
            failed,
            "modification finished"
        );

        ModificationResult {
            success,
            file_path: analysis.file_path.clone(),
            modification_type: plan.modification_type,
            whole_file: false,
            original_content: source.to_string(),
            modified_content: lines.join("\n"),
            changes: outcomes.iter().map(ElementOutcome::describe).collect(),
            outcomes,
            targets_modified,
            backend_used: analysis.backend_used,
            hunks: place_hunks(hunks),
            error: (!success).then(|| format!("all {} targets failed", failed)),
        }
    }

    fn modify_whole_file(
        &self,
        analysis: &FileAnalysis,
        source: &str,
        instruction: &str,
        modification_type: ModificationType,
    ) -> ModificationResult {
        let mut result = ModificationResult {
            success: false,
            file_path: analysis.file_path.clone(),
            modification_type,
            whole_file: true,
            original_content: source.to_string(),
            modified_content: source.to_string(),
            outcomes: Vec::new(),
            changes: Vec::new(),
            targets_modified: 0,
            backend_used: analysis.backend_used,
            hunks: Vec::new(),
            error: None,
        };

        let request = RewriteRequest::for_file(analysis, source, instruction);
        match self.rewriter.rewrite(&request) {
            Err(e) => {
                warn!(file = %analysis.file_path, error = %e, "whole-file rewrite failed");
                result.changes.push(format!("Failed to modify file: {}", e));
                result.error = Some(e.to_string());
            }
            Ok(replacement) if replacement.trim() == source.trim() => {
                result.success = true;
                result.changes.push("No changes needed".to_string());
            }
            Ok(mut replacement) => {
                if source.ends_with('\n') && !replacement.ends_with('\n') {
                    replacement.push('\n');
                }
                let old = split_lines(source);
                let new = split_lines(&replacement);
                result.hunks = place_hunks(Hunk::trimmed(1, &old, &new).into_iter().collect());
                result.success = true;
                result.changes.push("Applied general modification to file".to_string());
                result.modified_content = replacement;
            }
        }
        result
    }
}
