//! The boundary to whatever generates replacement text.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::analysis::{Element, ElementKind, FileAnalysis};

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)```[\w+#.-]*[ \t]*\r?\n(.*?)\r?\n[ \t]*```").unwrap();
}

/// Imports listed in an element request.
const MAX_CONTEXT_IMPORTS: usize = 5;

#[derive(Debug, Error)]
pub enum RewriteError {
    #[error("rewriter refused: {0}")]
    Refused(String),

    #[error("rewriter failed: {0}")]
    Failed(String),

    #[error("rewriter I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Everything a rewriter gets to produce one replacement.
///
/// For an element request `original` is the element's line range; for a
/// whole-file request it is the entire file and the element fields are empty.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteRequest {
    pub language: String,
    pub file_path: String,
    pub element_kind: Option<ElementKind>,
    pub element_name: Option<String>,
    pub start_line: usize,
    pub end_line: usize,
    pub parameters: Vec<String>,
    pub decorators: Vec<String>,
    pub bases: Vec<String>,
    pub methods: Vec<String>,
    pub is_async: bool,
    pub imports: Vec<String>,
    /// Element and file facts as readable text.
    pub context: String,
    pub file_summary: String,
    pub original: String,
    pub instruction: String,
}

impl RewriteRequest {
    /// Request for one element whose current text spans
    /// `start_line..=end_line`.
    pub fn for_element(
        analysis: &FileAnalysis,
        element: &Element,
        original: &str,
        instruction: &str,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            language: analysis.language.clone(),
            file_path: analysis.file_path.clone(),
            element_kind: Some(element.kind()),
            element_name: Some(element.name.clone()),
            start_line,
            end_line,
            parameters: element.parameters.clone(),
            decorators: element.decorators.clone(),
            bases: element.bases.clone(),
            methods: element.methods.clone(),
            is_async: element.is_async,
            imports: analysis.imports.iter().map(|i| i.name.clone()).collect(),
            context: element_context(analysis, element),
            file_summary: analysis.summary(),
            original: original.to_string(),
            instruction: instruction.to_string(),
        }
    }

    /// Request to rewrite the whole file.
    pub fn for_file(analysis: &FileAnalysis, source: &str, instruction: &str) -> Self {
        Self {
            language: analysis.language.clone(),
            file_path: analysis.file_path.clone(),
            element_kind: None,
            element_name: None,
            start_line: 1,
            end_line: analysis.total_lines,
            parameters: Vec::new(),
            decorators: Vec::new(),
            bases: Vec::new(),
            methods: Vec::new(),
            is_async: false,
            imports: analysis.imports.iter().map(|i| i.name.clone()).collect(),
            context: String::new(),
            file_summary: analysis.summary(),
            original: source.to_string(),
            instruction: instruction.to_string(),
        }
    }
}

fn element_context(analysis: &FileAnalysis, element: &Element) -> String {
    let mut parts = Vec::new();

    match element.kind() {
        ElementKind::Function => {
            parts.push(format!("Function: {}", element.name));
            if !element.parameters.is_empty() {
                parts.push(format!("Parameters: {}", element.parameters.join(", ")));
            }
            if element.is_async {
                parts.push("Type: Async function".to_string());
            }
            if !element.decorators.is_empty() {
                parts.push(format!("Decorators: {}", element.decorators.join(", ")));
            }
        }
        ElementKind::Class => {
            parts.push(format!("Class: {}", element.name));
            if !element.bases.is_empty() {
                parts.push(format!("Inherits from: {}", element.bases.join(", ")));
            }
            if !element.methods.is_empty() {
                parts.push(format!("Methods: {}", element.methods.join(", ")));
            }
        }
        kind => parts.push(format!("{}: {}", kind, element.name)),
    }

    parts.push(format!("File: {}", analysis.file_path));
    parts.push(format!("Language: {}", analysis.language));
    parts.push(format!("Total functions in file: {}", analysis.functions.len()));
    parts.push(format!("Total classes in file: {}", analysis.classes.len()));
    if !analysis.imports.is_empty() {
        let names: Vec<&str> = analysis
            .imports
            .iter()
            .take(MAX_CONTEXT_IMPORTS)
            .map(|i| i.name.as_str())
            .collect();
        parts.push(format!("File imports: {}", names.join(", ")));
    }

    parts.join("\n")
}

/// Produces replacement text for a request.
///
/// Returning an empty string for an element request deletes the element.
pub trait Rewriter {
    fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError>;
}

impl<F> Rewriter for F
where
    F: Fn(&RewriteRequest) -> Result<String, RewriteError>,
{
    fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        self(request)
    }
}

/// The contents of the first fenced code block in `reply`, or the whole
/// reply without trailing line breaks.
pub fn extract_code(reply: &str) -> String {
    match CODE_FENCE.captures(reply).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().to_string(),
        None => reply.trim_end_matches(['\r', '\n']).to_string(),
    }
}

/// Runs an external program per request: the request is written to its
/// stdin as JSON and the replacement is read from its stdout.
#[derive(Debug, Clone)]
pub struct CommandRewriter {
    program: String,
    args: Vec<String>,
}

impl CommandRewriter {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a command line on whitespace into program and arguments.
    pub fn parse(command_line: &str) -> Result<Self, RewriteError> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| RewriteError::Failed("empty rewriter command".to_string()))?;
        Ok(Self::new(program, words.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Rewriter for CommandRewriter {
    fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteError> {
        let payload =
            serde_json::to_vec(request).map_err(|e| RewriteError::Failed(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from another thread so a chatty child cannot deadlock us.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || {
                if let Err(e) = stdin.write_all(&payload) {
                    debug!(error = %e, "rewriter closed stdin early");
                }
            })
        });

        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RewriteError::Failed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let reply = String::from_utf8_lossy(&output.stdout);
        if reply.trim().is_empty() {
            return Err(RewriteError::Refused(format!("{} printed nothing", self.program)));
        }
        Ok(extract_code(&reply))
    }
}
