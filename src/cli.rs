//! Command-line interface for astcache.

use clap::{Args, Parser, Subcommand};
use globset::GlobSet;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::cache::{GlobalCacheRegistry, ProjectCache};
use crate::config::{self, Config};
use crate::language;
use crate::modify::{self, CommandRewriter, TargetedModifier};
use crate::report::{self, Format, LanguageRow};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Directories never descended into while indexing.
const SKIPPED_DIRS: &[&str] = &["node_modules", "target", "vendor", "__pycache__", "venv"];

/// Multi-language structural analysis with a persistent AST cache.
///
/// astcache extracts functions, classes, imports and variables from source
/// files, caches the results per project keyed by content hash, and applies
/// instructions to individual elements through an external rewriter.
#[derive(Parser)]
#[command(name = "astcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a single file
    Analyze(AnalyzeArgs),
    /// Analyze a directory into a project cache
    Index(IndexArgs),
    /// Search cached elements by name
    Find(FindArgs),
    /// Summarize one or all project caches
    Summary(SummaryArgs),
    /// Show which elements an instruction would modify
    Plan(PlanArgs),
    /// Apply an instruction to a file through an external rewriter
    Modify(ModifyArgs),
    /// Remove old entries from a project cache
    Cleanup(CleanupArgs),
    /// Delete a project cache
    Clear(ClearArgs),
    /// List detectable languages and their backends
    Languages(LanguagesArgs),
}

/// Project selection shared by cache commands.
#[derive(Args)]
pub struct ProjectArgs {
    /// Project id
    #[arg(short, long)]
    pub project: String,

    /// Human-readable project name (default: the id)
    #[arg(long)]
    pub name: Option<String>,
}

impl ProjectArgs {
    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.project)
    }
}

#[derive(Parser)]
pub struct AnalyzeArgs {
    /// File to analyze
    pub file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

#[derive(Parser)]
pub struct IndexArgs {
    /// Directory to index
    pub dir: PathBuf,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

#[derive(Parser)]
pub struct FindArgs {
    /// Case-insensitive substring of element names
    pub query: String,

    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

#[derive(Parser)]
pub struct SummaryArgs {
    /// Project id (default: every project in the cache directory)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Human-readable project name (default: the id)
    #[arg(long)]
    pub name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

#[derive(Parser)]
pub struct PlanArgs {
    /// File the instruction applies to
    pub file: PathBuf,

    /// The instruction, e.g. "fix the add function"
    pub instruction: String,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

#[derive(Parser)]
pub struct ModifyArgs {
    /// File to modify
    pub file: PathBuf,

    /// The instruction, e.g. "fix the add function"
    pub instruction: String,

    /// Command that reads a JSON request on stdin and prints the replacement
    #[arg(short, long)]
    pub rewriter: String,

    /// Write the modified file back to disk
    #[arg(short, long)]
    pub write: bool,

    /// Use (and refresh) this project's cache
    #[arg(short, long)]
    pub project: Option<String>,

    /// Human-readable project name (default: the id)
    #[arg(long)]
    pub name: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

#[derive(Parser)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Remove entries older than this many days (default: from config)
    #[arg(long)]
    pub max_age_days: Option<u64>,
}

#[derive(Parser)]
pub struct ClearArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}

#[derive(Parser)]
pub struct LanguagesArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Pretty)]
    pub format: Format,
}

/// Loaded configuration plus the project caches built from it.
struct Session {
    config: Config,
    registry: GlobalCacheRegistry,
}

impl Session {
    fn project(&self, id: &str, name: &str) -> anyhow::Result<Arc<ProjectCache>> {
        Ok(self.registry.get_or_create(id, name)?)
    }
}

/// Load config or report why not. `None` means exit with [`EXIT_ERROR`].
fn load_session(config_path: Option<&Path>) -> Option<Session> {
    let (config, path) = match Config::load(config_path) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: invalid config: {}", e);
            return None;
        }
    };
    if let Some(path) = &path {
        debug!(config = %path.display(), "loaded config");
    }

    let analyzer = Arc::new(config.build_analyzer());
    let registry = GlobalCacheRegistry::new(config.get_cache_dir(), analyzer);
    Some(Session { config, registry })
}

/// Run the parsed command line. Errors map to [`EXIT_ERROR`].
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    let Some(session) = load_session(cli.config.as_deref()) else {
        return Ok(EXIT_ERROR);
    };

    let code = match &cli.command {
        Commands::Analyze(args) => run_analyze(&session, args)?,
        Commands::Index(args) => run_index(&session, args)?,
        Commands::Find(args) => run_find(&session, args)?,
        Commands::Summary(args) => run_summary(&session, args)?,
        Commands::Plan(args) => run_plan(&session, args)?,
        Commands::Modify(args) => run_modify(&session, args)?,
        Commands::Cleanup(args) => run_cleanup(&session, args)?,
        Commands::Clear(args) => run_clear(&session, args)?,
        Commands::Languages(args) => run_languages(&session, args)?,
    };

    session.registry.flush()?;
    Ok(code)
}

/// Cache key for a path: `/`-separated, without leading `./`.
pub fn cache_key(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/").replace("//", "/")
}

fn read_source(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            eprintln!("Error: cannot read {}: {}", path.display(), e);
            None
        }
    }
}

/// Run the analyze command.
fn run_analyze(session: &Session, args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let Some(source) = read_source(&args.file) else {
        return Ok(EXIT_ERROR);
    };

    let analysis = session
        .registry
        .analyzer()
        .analyze_file(cache_key(&args.file), &source);

    match args.format {
        Format::Json => report::write_json("analyze", &analysis)?,
        Format::Pretty => report::write_analysis(&analysis),
    }
    Ok(EXIT_SUCCESS)
}

/// Collect indexable files under `root`.
fn collect_files(root: &Path, config: &Config, exclusions: &GlobSet) -> anyhow::Result<Vec<PathBuf>> {
    let include_hidden = config.should_include_hidden();
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            let relative = e.path().strip_prefix(root).unwrap_or(e.path());
            if exclusions.is_match(relative) {
                return false;
            }
            if e.file_type().is_dir() {
                let name = e.file_name().to_string_lossy();
                if !include_hidden && name.starts_with('.') {
                    return false;
                }
                if SKIPPED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
            }
            true
        })
    {
        let entry = entry?;
        if entry.file_type().is_file() && language::detect(entry.path()) != language::UNKNOWN {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[derive(serde::Serialize)]
struct IndexReport {
    project_id: String,
    files: usize,
    analyzed: usize,
    unchanged: usize,
    unreadable: usize,
}

/// Run the index command.
fn run_index(session: &Session, args: &IndexArgs) -> anyhow::Result<i32> {
    if !args.dir.is_dir() {
        eprintln!("Error: not a directory: {}", args.dir.display());
        return Ok(EXIT_ERROR);
    }

    let exclusions = session.config.exclusions()?;
    let files = collect_files(&args.dir, &session.config, &exclusions)?;
    let cache = session.project(&args.project.project, args.project.name())?;

    let progress = ProgressBar::new(files.len() as u64);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
    {
        progress.set_style(style);
    }
    if args.format == Format::Json {
        progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let analyzed = AtomicUsize::new(0);
    let unchanged = AtomicUsize::new(0);
    let unreadable = AtomicUsize::new(0);

    files.par_iter().for_each(|path| {
        let relative = path.strip_prefix(&args.dir).unwrap_or(path);
        let key = cache_key(relative);
        match fs::read_to_string(path) {
            Ok(content) => {
                if cache.is_cached_and_valid(&key, &content) {
                    unchanged.fetch_add(1, Ordering::Relaxed);
                } else {
                    cache.get_or_analyze(&key, &content);
                    analyzed.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                unreadable.fetch_add(1, Ordering::Relaxed);
            }
        }
        progress.inc(1);
    });
    progress.finish_and_clear();
    cache.flush()?;

    let report = IndexReport {
        project_id: cache.project_id().to_string(),
        files: files.len(),
        analyzed: analyzed.into_inner(),
        unchanged: unchanged.into_inner(),
        unreadable: unreadable.into_inner(),
    };

    match args.format {
        Format::Json => report::write_json("index", &report)?,
        Format::Pretty => {
            println!(
                "Indexed {} files into project '{}' ({} analyzed, {} unchanged, {} unreadable)",
                report.files, report.project_id, report.analyzed, report.unchanged, report.unreadable
            );
        }
    }

    if report.unreadable > 0 {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the find command.
fn run_find(session: &Session, args: &FindArgs) -> anyhow::Result<i32> {
    let cache = session.project(&args.project.project, args.project.name())?;
    let matches = cache.find_by_name(&args.query);

    match args.format {
        Format::Json => report::write_json("find", &matches)?,
        Format::Pretty => report::write_matches(&args.query, &matches),
    }
    Ok(EXIT_SUCCESS)
}

/// Run the summary command.
fn run_summary(session: &Session, args: &SummaryArgs) -> anyhow::Result<i32> {
    if let Some(project) = &args.project {
        let name = args.name.as_deref().unwrap_or(project);
        let summary = session.project(project, name)?.summary();
        match args.format {
            Format::Json => report::write_json("summary", &summary)?,
            Format::Pretty => report::write_project_summary(&summary),
        }
        return Ok(EXIT_SUCCESS);
    }

    session.registry.open_all()?;
    let summary = session.registry.summary();
    match args.format {
        Format::Json => report::write_json("summary", &summary)?,
        Format::Pretty => report::write_global_summary(&summary),
    }
    Ok(EXIT_SUCCESS)
}

/// Run the plan command.
fn run_plan(session: &Session, args: &PlanArgs) -> anyhow::Result<i32> {
    let Some(source) = read_source(&args.file) else {
        return Ok(EXIT_ERROR);
    };

    let key = cache_key(&args.file);
    let analysis = session.registry.analyzer().analyze_file(&key, &source);
    let plan = modify::plan(&analysis, &args.instruction);

    match args.format {
        Format::Json => report::write_json("plan", &plan)?,
        Format::Pretty => report::write_plan(&key, &args.instruction, &plan),
    }
    Ok(EXIT_SUCCESS)
}

/// Run the modify command.
fn run_modify(session: &Session, args: &ModifyArgs) -> anyhow::Result<i32> {
    let rewriter = match CommandRewriter::parse(&args.rewriter) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };
    let Some(source) = read_source(&args.file) else {
        return Ok(EXIT_ERROR);
    };

    let key = cache_key(&args.file);
    let cache = match &args.project {
        Some(id) => Some(session.project(id, args.name.as_deref().unwrap_or(id))?),
        None => None,
    };
    let analysis = match &cache {
        Some(cache) => cache.get_or_analyze(&key, &source),
        None => Arc::new(session.registry.analyzer().analyze_file(&key, &source)),
    };

    let modifier = TargetedModifier::new(rewriter);
    let result = modifier.modify(&analysis, &source, &args.instruction);

    let written = args.write && result.success && result.is_changed();
    if written {
        fs::write(&args.file, &result.modified_content)?;
        if let Some(cache) = &cache {
            cache.refresh(&key, &result.modified_content);
            cache.flush()?;
        }
    }

    match args.format {
        Format::Json => report::write_json("modify", &result)?,
        Format::Pretty => report::write_modification(&result, written),
    }

    if result.success {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the cleanup command.
fn run_cleanup(session: &Session, args: &CleanupArgs) -> anyhow::Result<i32> {
    let days = args
        .max_age_days
        .unwrap_or_else(|| session.config.get_max_age_days());
    let cache = session.project(&args.project.project, args.project.name())?;
    let removed = cache.cleanup(config::days(days));

    println!(
        "Removed {} entries older than {} days from project '{}'",
        removed,
        days,
        cache.project_id()
    );
    Ok(EXIT_SUCCESS)
}

/// Run the clear command.
fn run_clear(session: &Session, args: &ClearArgs) -> anyhow::Result<i32> {
    session.project(&args.project.project, args.project.name())?;
    session.registry.clear_project(&args.project.project);

    println!("Cleared project '{}'", args.project.project);
    Ok(EXIT_SUCCESS)
}

/// Run the languages command.
fn run_languages(session: &Session, args: &LanguagesArgs) -> anyhow::Result<i32> {
    let backends = session.registry.analyzer().registry();
    let structural = backends.structural_languages();

    let rows: Vec<LanguageRow> = language::supported_languages()
        .into_iter()
        .map(|lang| LanguageRow {
            language: lang.to_string(),
            structural: structural.iter().any(|s| s == lang),
            heuristic: backends.has_heuristic(lang),
        })
        .collect();

    match args.format {
        Format::Json => report::write_json("languages", &rows)?,
        Format::Pretty => report::write_languages(&rows, &backends.failed_languages()),
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_key_normalizes_paths() {
        assert_eq!(cache_key(Path::new("./src/calc.py")), "src/calc.py");
        assert_eq!(cache_key(Path::new("calc.py")), "calc.py");
    }

    #[test]
    fn test_cli_parses_modify() {
        let cli = Cli::try_parse_from([
            "astcache",
            "modify",
            "calc.py",
            "fix the add function",
            "--rewriter",
            "my-tool --fast",
            "--write",
            "-p",
            "demo",
        ])
        .unwrap();
        match cli.command {
            Commands::Modify(args) => {
                assert!(args.write);
                assert_eq!(args.rewriter, "my-tool --fast");
                assert_eq!(args.project.as_deref(), Some("demo"));
                assert_eq!(args.format, Format::Pretty);
            }
            _ => panic!("expected modify"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["astcache", "analyze", "x.py", "--format", "sarif"]).is_err());
    }

    #[test]
    fn test_collect_files_honors_exclusions() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("gen")).unwrap();
        fs::create_dir_all(root.join(".hidden")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/a.py"), "x = 1\n").unwrap();
        fs::write(root.join("src/notes.unknownext"), "x").unwrap();
        fs::write(root.join("gen/b.py"), "x = 1\n").unwrap();
        fs::write(root.join(".hidden/c.py"), "x = 1\n").unwrap();
        fs::write(root.join("node_modules/pkg/d.js"), "x").unwrap();

        let config = Config {
            excluded_paths: vec!["gen/**".to_string()],
            ..Config::default()
        };
        let files = collect_files(root, &config, &config.exclusions().unwrap()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| cache_key(p.strip_prefix(root).unwrap()))
            .collect();
        assert_eq!(names, vec!["src/a.py"]);
    }
}
