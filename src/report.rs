//! Output formatting for astcache results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::Serialize;

use crate::analysis::{Element, FileAnalysis};
use crate::cache::{ElementMatch, GlobalSummary, ProjectSummary};
use crate::modify::{ModificationPlan, ModificationResult, OutcomeStatus};

/// Output format selected with `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    Pretty,
    Json,
}

// =============================================================================
// JSON Format
// =============================================================================

/// Envelope around every JSON result.
#[derive(Serialize)]
pub struct JsonReport<'a, T: Serialize> {
    pub version: &'static str,
    pub command: &'a str,
    pub result: &'a T,
}

/// Write `result` as pretty-printed JSON to stdout.
pub fn write_json<T: Serialize>(command: &str, result: &T) -> anyhow::Result<()> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        command,
        result,
    };
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

fn write_header(title: &str) {
    println!();
    print!("  ");
    print!("{}", "astcache".cyan().bold());
    println!(" v{}  {}", env!("CARGO_PKG_VERSION"), title.dimmed());
    println!();
}

fn line_range(start: usize, end: usize) -> String {
    if start == end {
        format!(":{}", start)
    } else {
        format!(":{}-{}", start, end)
    }
}

fn write_element(element: &Element) {
    print!("    {:<10}", element.kind().as_str().dimmed());
    print!("{}", element.name.bold());
    if !element.parameters.is_empty() {
        print!("({})", element.parameters.join(", "));
    }
    print!("{}", line_range(element.start_line, element.end_line).dimmed());
    if element.is_async {
        print!(" {}", "async".yellow());
    }
    if !element.bases.is_empty() {
        print!(" {}", format!("extends {}", element.bases.join(", ")).dimmed());
    }
    println!();
    if !element.methods.is_empty() {
        println!("              {}", format!("methods: {}", element.methods.join(", ")).dimmed());
    }
}

/// Print one file's analysis.
pub fn write_analysis(analysis: &FileAnalysis) {
    write_header("analyze");

    print!("  {}", "File:     ".dimmed());
    println!("{}", analysis.file_path.blue());
    print!("  {}", "Language: ".dimmed());
    println!("{}", analysis.language);
    print!("  {}", "Backend:  ".dimmed());
    if analysis.backend_used.is_structural() {
        println!("{}", analysis.backend_used.as_str().green());
    } else {
        println!("{}", analysis.backend_used.as_str().yellow());
    }
    print!("  {}", "Lines:    ".dimmed());
    println!(
        "{} ({} non-empty, {} words)",
        analysis.total_lines, analysis.non_empty_lines, analysis.word_count
    );
    print!("  {}", "Complexity: ".dimmed());
    println!("{}", analysis.complexity_score);
    if analysis.has_syntax_errors {
        println!("  {}", "⚠ syntax errors".red());
    }
    println!();

    let sections: [(&str, &[Element]); 4] = [
        ("Classes", analysis.classes.as_slice()),
        ("Functions", analysis.functions.as_slice()),
        ("Imports", analysis.imports.as_slice()),
        ("Variables", analysis.variables.as_slice()),
    ];
    for (title, elements) in sections {
        if elements.is_empty() {
            continue;
        }
        println!("  {} ({}):", title.bold(), elements.len());
        for element in elements {
            write_element(element);
        }
        println!();
    }
}

/// Print name search results.
pub fn write_matches(query: &str, matches: &[ElementMatch]) {
    write_header("find");

    if matches.is_empty() {
        println!("  No elements matching {:?}", query);
        println!();
        return;
    }

    println!("  {} ({}):", "Matches".bold(), matches.len());
    println!();
    for m in matches {
        print!("    {:<10}", m.kind.as_str().dimmed());
        print!("{:<28}", m.name.bold());
        print!("{}", m.file_path.blue());
        println!("{}", line_range(m.start_line, m.end_line).dimmed());
    }
    println!();
}

/// Print one project's summary.
pub fn write_project_summary(summary: &ProjectSummary) {
    write_header("summary");
    write_project_block(summary);
}

fn write_project_block(summary: &ProjectSummary) {
    print!("  {}", "Project: ".dimmed());
    println!("{} ({})", summary.project_name.bold(), summary.project_id);
    println!(
        "    {} files, {} functions, {} classes, {} lines",
        summary.total_files, summary.total_functions, summary.total_classes, summary.total_lines
    );

    if !summary.languages.is_empty() {
        let langs: Vec<String> = summary
            .languages
            .iter()
            .map(|(lang, count)| format!("{} {}", lang, count))
            .collect();
        println!("    {}", langs.join(", ").dimmed());
    }
    println!();

    for file in &summary.files {
        print!("    {:<48}", file.file_path.blue());
        println!(
            "{}",
            format!(
                "{:<12} {:>3} fn {:>3} cls {:>5} lines",
                file.language, file.functions, file.classes, file.lines
            )
            .dimmed()
        );
    }
    if !summary.files.is_empty() {
        println!();
    }
}

/// Print every open project's summary.
pub fn write_global_summary(summary: &GlobalSummary) {
    write_header("summary");

    if summary.projects.is_empty() {
        println!("  No cached projects");
        println!();
        return;
    }
    println!("  {} ({}):", "Projects".bold(), summary.total_projects);
    println!();
    for project in &summary.projects {
        write_project_block(project);
    }
}

/// Print the targets an instruction would touch.
pub fn write_plan(file: &str, instruction: &str, plan: &ModificationPlan) {
    write_header("plan");

    print!("  {}", "File:        ".dimmed());
    println!("{}", file.blue());
    print!("  {}", "Instruction: ".dimmed());
    println!("{}", instruction);
    print!("  {}", "Type:        ".dimmed());
    println!("{}", plan.modification_type);
    println!();

    if plan.targets.is_empty() {
        println!("  No element targeted; the whole file would be rewritten.");
        println!();
        return;
    }

    println!("  {} (in replacement order):", "Targets".bold());
    for target in &plan.targets {
        write_element(target);
    }
    println!();
}

/// Color a unified diff for the terminal.
pub fn colorize_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| {
            if line.starts_with("---") || line.starts_with("+++") {
                line.bold().to_string()
            } else if line.starts_with("@@") {
                line.cyan().to_string()
            } else if line.starts_with('-') {
                line.red().to_string()
            } else if line.starts_with('+') {
                line.green().to_string()
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn write_outcome_tag(status: OutcomeStatus) {
    match status {
        OutcomeStatus::Modified => print!("    {} ", "DONE ".green()),
        OutcomeStatus::Unchanged => print!("    {} ", "SAME ".dimmed()),
        OutcomeStatus::Failed => print!("    {} ", "FAIL ".red()),
        OutcomeStatus::Stale | OutcomeStatus::Overlapping => print!("    {} ", "SKIP ".yellow()),
    }
}

/// Print a modification result followed by its diff.
pub fn write_modification(result: &ModificationResult, written: bool) {
    write_header("modify");

    if result.success {
        print!("  {}", "✓ OK".green());
    } else {
        print!("  {}", "✗ FAILED".red());
    }
    print!("  {} ", result.modification_type);
    if result.whole_file {
        print!("{}", "(whole file)".dimmed());
    } else {
        print!(
            "{}",
            format!("({} of {} targets modified)", result.targets_modified, result.outcomes.len())
                .dimmed()
        );
    }
    println!();
    if let Some(error) = &result.error {
        println!("  {}", error.red());
    }
    println!();

    if result.outcomes.is_empty() {
        for change in &result.changes {
            println!("    {}", change);
        }
    } else {
        for outcome in &result.outcomes {
            write_outcome_tag(outcome.status);
            println!("{}", outcome.describe());
        }
    }
    println!();

    let diff = result.diff();
    if diff.is_empty() {
        println!("  {}", "No changes.".dimmed());
    } else {
        println!("{}", colorize_diff(&diff));
        println!();
        if written {
            println!("  Wrote {}", result.file_path.blue());
        } else {
            println!("  {}", "(dry run, use --write to save)".dimmed());
        }
    }
    println!();
}

/// One row of the `languages` table.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageRow {
    pub language: String,
    pub structural: bool,
    pub heuristic: bool,
}

/// Print which backends serve each detectable language.
pub fn write_languages(rows: &[LanguageRow], failed: &[String]) {
    write_header("languages");

    println!("  {:<16}{:<12}{}", "Language".bold(), "tree-sitter".bold(), "regex".bold());
    for row in rows {
        let mark = |on: bool| if on { "yes".green() } else { "-".dimmed() };
        println!(
            "  {:<16}{:<12}{}",
            row.language,
            mark(row.structural),
            mark(row.heuristic)
        );
    }
    println!();

    if !failed.is_empty() {
        println!("  {} {}", "Unavailable grammars:".yellow(), failed.join(", "));
        println!();
    }
}
