//! Two-tier (memory + disk) analysis cache.
//!
//! A [`ProjectCache`] serves one project. Entries are keyed by file path and
//! validated by the SHA-256 of the file content: an analysis is only returned
//! for the exact bytes it was computed from. [`GlobalCacheRegistry`] hands
//! out one cache per project id.

mod global;
mod index;
mod store;

pub use global::{GlobalCacheRegistry, GlobalSummary};
pub use index::{storage_key, CacheIndex, CacheIndexEntry};
pub use store::{CacheError, CacheStore, JsonStore, ProjectMeta};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::analysis::keywords::is_keyword;
use crate::analysis::{content_hash, Element, ElementKind, FileAnalysis, LanguageAnalyzer};

/// Directory name for a project: `<sanitized name>_<first 8 chars of id>`.
pub fn project_dir_name(project_name: &str, project_id: &str) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let mut name = sanitize(project_name.trim());
    if name.is_empty() {
        name = "project".to_string();
    }
    let id: String = sanitize(project_id).chars().take(8).collect();
    format!("{}_{}", name, id)
}

/// One element found by a name search.
#[derive(Debug, Clone, Serialize)]
pub struct ElementMatch {
    pub kind: ElementKind,
    pub name: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub element: Element,
}

impl ElementMatch {
    fn new(file_path: &str, element: &Element) -> Self {
        Self {
            kind: element.kind(),
            name: element.name.clone(),
            file_path: file_path.to_string(),
            start_line: element.start_line,
            end_line: element.end_line,
            element: element.clone(),
        }
    }
}

/// Per-file row of a [`ProjectSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub file_path: String,
    pub language: String,
    pub functions: usize,
    pub classes: usize,
    pub lines: usize,
    pub complexity: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub project_name: String,
    pub total_files: usize,
    pub languages: BTreeMap<String, usize>,
    pub total_functions: usize,
    pub total_classes: usize,
    pub total_lines: usize,
    pub files: Vec<FileSummary>,
}

#[derive(Default)]
struct CacheState {
    index: CacheIndex,
    memory: HashMap<String, Arc<FileAnalysis>>,
    /// The index has changes not yet written to the store.
    dirty: bool,
}

/// Analysis cache for one project.
///
/// Cache operations never fail: unreadable records are logged and treated
/// as misses, and failed writes only cost a later re-analysis. Records are
/// written as they are filled; the index is written by [`ProjectCache::flush`],
/// by cleanup, and when the cache is dropped.
pub struct ProjectCache {
    project_id: String,
    project_name: String,
    store: Box<dyn CacheStore>,
    analyzer: Arc<LanguageAnalyzer>,
    state: RwLock<CacheState>,
}

impl ProjectCache {
    /// Open (or create) the JSON cache for a project under `base_dir`.
    pub fn open<P: AsRef<Path>>(
        base_dir: P,
        project_id: &str,
        project_name: &str,
        analyzer: Arc<LanguageAnalyzer>,
    ) -> Result<Self, CacheError> {
        let dir = base_dir
            .as_ref()
            .join(project_dir_name(project_name, project_id));
        let store = JsonStore::open(dir)?;
        let meta = ProjectMeta {
            project_id: project_id.to_string(),
            project_name: project_name.to_string(),
        };
        if store.load_meta().ok().flatten().as_ref() != Some(&meta) {
            store.save_meta(&meta)?;
        }
        Ok(Self::with_store(project_id, project_name, Box::new(store), analyzer))
    }

    /// Use a custom storage backend.
    pub fn with_store(
        project_id: &str,
        project_name: &str,
        store: Box<dyn CacheStore>,
        analyzer: Arc<LanguageAnalyzer>,
    ) -> Self {
        let index = store.load_index().unwrap_or_else(|e| {
            warn!(project = project_id, error = %e, "unreadable cache index, starting empty");
            CacheIndex::default()
        });
        debug!(project = project_id, files = index.len(), "opened project cache");

        Self {
            project_id: project_id.to_string(),
            project_name: project_name.to_string(),
            store,
            analyzer,
            state: RwLock::new(CacheState {
                index,
                memory: HashMap::new(),
                dirty: false,
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn analyzer(&self) -> &Arc<LanguageAnalyzer> {
        &self.analyzer
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.state.read().index.paths()
    }

    /// The analysis of `content` at `path`, from cache when the stored hash
    /// matches and freshly computed (and stored) otherwise.
    pub fn get_or_analyze(&self, path: &str, content: &str) -> Arc<FileAnalysis> {
        let hash = content_hash(content);
        if let Some(hit) = self.lookup(path, Some(&hash)) {
            debug!(path, "cache hit");
            return hit;
        }

        debug!(path, "cache miss, analyzing");
        let analysis = Arc::new(self.analyzer.analyze_file(path, content));
        self.store_analysis(path, analysis.clone());
        analysis
    }

    /// Whether the cached analysis for `path` was computed from `content`.
    pub fn is_cached_and_valid(&self, path: &str, content: &str) -> bool {
        self.state
            .read()
            .index
            .get(path)
            .is_some_and(|entry| entry.content_hash == content_hash(content))
    }

    /// The cached analysis for `path`, whatever content it was computed from.
    pub fn get(&self, path: &str) -> Option<Arc<FileAnalysis>> {
        self.lookup(path, None)
    }

    /// Drop any cached analysis for `path` and analyze `content` again.
    pub fn refresh(&self, path: &str, content: &str) -> Arc<FileAnalysis> {
        self.invalidate(path);
        self.get_or_analyze(path, content)
    }

    /// Forget `path`. Its record file stays on disk until the next cleanup.
    pub fn invalidate(&self, path: &str) -> bool {
        let mut state = self.state.write();
        state.memory.remove(path);
        if state.index.remove(path).is_none() {
            return false;
        }
        state.dirty = true;
        debug!(path, "invalidated");
        true
    }

    /// Case-insensitive substring search over element names of every
    /// cached file. Keyword names never match.
    pub fn find_by_name(&self, query: &str) -> Vec<ElementMatch> {
        let query = query.to_lowercase();
        let mut matches = Vec::new();

        for path in self.paths() {
            let Some(analysis) = self.get(&path) else {
                continue;
            };
            matches.extend(
                analysis
                    .elements()
                    .filter(|el| el.name.to_lowercase().contains(&query))
                    .filter(|el| !is_keyword(&el.name, &analysis.language))
                    .map(|el| ElementMatch::new(&path, el)),
            );
        }
        matches
    }

    /// Functions and classes of one cached file, optionally filtered by a
    /// case-insensitive name substring.
    pub fn find_in_file(&self, path: &str, name_filter: Option<&str>) -> Vec<ElementMatch> {
        let Some(analysis) = self.get(path) else {
            return Vec::new();
        };
        let filter = name_filter.map(str::to_lowercase);

        analysis
            .callables_and_classes()
            .filter(|el| match &filter {
                Some(f) => el.name.to_lowercase().contains(f.as_str()),
                None => true,
            })
            .map(|el| ElementMatch::new(path, el))
            .collect()
    }

    /// Remove entries analyzed at or before `now - max_age`, and record files
    /// that no entry refers to. Returns the number of entries removed.
    pub fn cleanup(&self, max_age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));

        let mut state = self.state.write();
        let stale = cutoff
            .map(|cutoff| state.index.stale_paths(cutoff))
            .unwrap_or_default();

        for path in &stale {
            state.memory.remove(path);
            if let Some(entry) = state.index.remove(path) {
                if let Err(e) = self.store.remove_record(&entry.storage_key) {
                    warn!(path = %path, error = %e, "failed to remove cache record");
                }
            }
        }

        // Fills write their record under the same lock, so every record on
        // disk at this point is either indexed or orphaned.
        let orphans = self.sweep_orphans(&state.index);
        if !stale.is_empty() || state.dirty {
            match self.store.save_index(&state.index) {
                Ok(()) => state.dirty = false,
                Err(e) => {
                    warn!(project = %self.project_id, error = %e, "failed to save cache index")
                }
            }
        }

        info!(
            project = %self.project_id,
            removed = stale.len(),
            orphans,
            "cache cleanup"
        );
        stale.len()
    }

    fn sweep_orphans(&self, index: &CacheIndex) -> usize {
        let keys = match self.store.record_keys() {
            Ok(keys) => keys,
            Err(e) => {
                warn!(project = %self.project_id, error = %e, "failed to list cache records");
                return 0;
            }
        };

        let live = index.storage_keys();
        let mut removed = 0;
        for key in keys.iter().filter(|k| !live.contains(k.as_str())) {
            match self.store.remove_record(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "failed to remove orphaned record"),
            }
        }
        removed
    }

    /// Drop every entry and delete all stored data for the project.
    pub fn clear(&self) {
        let mut state = self.state.write();
        *state = CacheState::default();
        match self.store.clear() {
            Ok(()) => info!(project = %self.project_id, "cleared cache"),
            Err(e) => warn!(project = %self.project_id, error = %e, "failed to clear cache storage"),
        }
    }

    /// Write the index if it changed since it was last written.
    pub fn flush(&self) -> Result<(), CacheError> {
        let mut state = self.state.write();
        if !state.dirty {
            return Ok(());
        }
        self.store.save_index(&state.index)?;
        state.dirty = false;
        debug!(project = %self.project_id, files = state.index.len(), "flushed cache index");
        Ok(())
    }

    pub fn summary(&self) -> ProjectSummary {
        let mut summary = ProjectSummary {
            project_id: self.project_id.clone(),
            project_name: self.project_name.clone(),
            total_files: self.len(),
            languages: BTreeMap::new(),
            total_functions: 0,
            total_classes: 0,
            total_lines: 0,
            files: Vec::new(),
        };

        for path in self.paths() {
            let Some(analysis) = self.get(&path) else {
                continue;
            };
            *summary
                .languages
                .entry(analysis.language.clone())
                .or_default() += 1;
            summary.total_functions += analysis.functions.len();
            summary.total_classes += analysis.classes.len();
            summary.total_lines += analysis.total_lines;
            summary.files.push(FileSummary {
                file_path: path,
                language: analysis.language.clone(),
                functions: analysis.functions.len(),
                classes: analysis.classes.len(),
                lines: analysis.total_lines,
                complexity: analysis.complexity_score,
            });
        }
        summary
    }

    /// Memory first, then disk. With `hash`, only an analysis of that exact
    /// content is returned.
    fn lookup(&self, path: &str, hash: Option<&str>) -> Option<Arc<FileAnalysis>> {
        let key = {
            let state = self.state.read();
            let entry = state.index.get(path)?;
            if hash.is_some_and(|h| h != entry.content_hash) {
                return None;
            }
            if let Some(analysis) = state.memory.get(path) {
                if analysis.content_hash == entry.content_hash {
                    return Some(analysis.clone());
                }
            }
            entry.storage_key.clone()
        };

        let analysis = match self.store.load_record(&key) {
            Ok(Some(analysis)) => analysis,
            Ok(None) => {
                debug!(path, "cache record missing");
                return None;
            }
            Err(e) => {
                warn!(path, error = %e, "unreadable cache record, re-analyzing");
                return None;
            }
        };

        let mut state = self.state.write();
        let expected = state.index.get(path).map(|e| e.content_hash.clone())?;
        if analysis.content_hash != expected || analysis.file_path != path {
            warn!(path, "cache record does not match index entry, re-analyzing");
            return None;
        }
        if hash.is_some_and(|h| h != expected) {
            return None;
        }

        let analysis = Arc::new(analysis);
        state.memory.insert(path.to_string(), analysis.clone());
        Some(analysis)
    }

    fn store_analysis(&self, path: &str, analysis: Arc<FileAnalysis>) {
        let entry = CacheIndexEntry {
            file_path: path.to_string(),
            content_hash: analysis.content_hash.clone(),
            last_analyzed: analysis.analyzed_at,
            storage_key: storage_key(path),
            language: analysis.language.clone(),
        };

        let mut state = self.state.write();
        if let Err(e) = self.store.save_record(&entry.storage_key, &analysis) {
            warn!(path, error = %e, "failed to write cache record");
        }
        state.memory.insert(path.to_string(), analysis);
        state.index.insert(entry);
        state.dirty = true;
        info!(path, "cached analysis");
    }
}

impl Drop for ProjectCache {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(project = %self.project_id, error = %e, "failed to save cache index");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{BackendId, Extraction};
    use crate::parser::{AnalyzerBackend, BackendError, ParserBackendRegistry};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct Counting(Arc<AtomicUsize>);

    impl AnalyzerBackend for Counting {
        fn id(&self) -> BackendId {
            BackendId::Heuristic
        }

        fn name(&self) -> String {
            "counting".to_string()
        }

        fn analyze(&self, source: &str) -> Result<Extraction, BackendError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            let mut ex = Extraction::default();
            for (i, line) in source.lines().enumerate() {
                if let Some(name) = line.strip_prefix("def ") {
                    ex.push(Element::new(ElementKind::Function, name.trim(), i + 1, i + 1));
                }
            }
            Ok(ex)
        }
    }

    fn counting_cache(dir: &Path) -> (ProjectCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ParserBackendRegistry::new();
        registry.register_backend("python", Arc::new(Counting(calls.clone())));
        let analyzer = Arc::new(LanguageAnalyzer::new(Arc::new(registry)));
        let cache = ProjectCache::open(dir, "0123456789abcdef", "demo", analyzer).unwrap();
        (cache, calls)
    }

    #[test]
    fn test_project_dir_name() {
        assert_eq!(project_dir_name("My App", "0123456789"), "My_App_01234567");
        assert_eq!(project_dir_name("", "ab"), "project_ab");
        assert_eq!(project_dir_name("../etc", "x/y"), "___etc_x_y");
    }

    #[test]
    fn test_second_lookup_is_a_hit() {
        let dir = TempDir::new().unwrap();
        let (cache, calls) = counting_cache(dir.path());

        let first = cache.get_or_analyze("a.py", "def one\n");
        let second = cache.get_or_analyze("a.py", "def one\n");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert!(cache.is_cached_and_valid("a.py", "def one\n"));
        assert!(!cache.is_cached_and_valid("a.py", "def two\n"));
    }

    #[test]
    fn test_disk_tier_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let first = {
            let (cache, _) = counting_cache(dir.path());
            cache.get_or_analyze("a.py", "def one\n")
        };

        let (cache, calls) = counting_cache(dir.path());
        let again = cache.get_or_analyze("a.py", "def one\n");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(*first, *again);
    }

    #[test]
    fn test_invalidate_keeps_record_until_cleanup() {
        let dir = TempDir::new().unwrap();
        let (cache, calls) = counting_cache(dir.path());
        cache.get_or_analyze("a.py", "def one\n");

        assert!(cache.invalidate("a.py"));
        assert!(!cache.invalidate("a.py"));
        assert!(cache.get("a.py").is_none());
        assert_eq!(cache.store.record_keys().unwrap().len(), 1);

        cache.get_or_analyze("a.py", "def one\n");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        cache.invalidate("a.py");
        assert_eq!(cache.cleanup(Duration::from_secs(3600)), 0);
        assert!(cache.store.record_keys().unwrap().is_empty());
    }

    #[test]
    fn test_index_written_once_on_flush() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = counting_cache(dir.path());
        cache.get_or_analyze("a.py", "def one\n");
        cache.get_or_analyze("b.py", "def two\n");

        assert!(cache.store.load_index().unwrap().is_empty());
        assert_eq!(cache.store.record_keys().unwrap().len(), 2);

        cache.flush().unwrap();
        assert_eq!(cache.store.load_index().unwrap().len(), 2);
    }

    #[test]
    fn test_drop_persists_pending_index() {
        let dir = TempDir::new().unwrap();
        {
            let (cache, _) = counting_cache(dir.path());
            cache.get_or_analyze("a.py", "def one\n");
        }

        let (cache, calls) = counting_cache(dir.path());
        assert_eq!(cache.paths(), vec!["a.py"]);
        cache.get_or_analyze("a.py", "def one\n");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_cleanup_never_sweeps_a_concurrent_fill() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = counting_cache(dir.path());

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..50 {
                    cache.get_or_analyze(&format!("f{}.py", i), &format!("def f{}\n", i));
                }
            });
            scope.spawn(|| {
                for _ in 0..50 {
                    cache.cleanup(Duration::from_secs(3600));
                }
            });
        });

        assert_eq!(cache.len(), 50);
        for path in cache.paths() {
            let record = cache.store.load_record(&storage_key(&path)).unwrap();
            assert!(record.is_some(), "record for {} was swept", path);
        }
    }

    #[test]
    fn test_find_in_file_filters_by_name() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = counting_cache(dir.path());
        cache.get_or_analyze("a.py", "def load_user\ndef save_user\ndef ping\n");

        let all = cache.find_in_file("a.py", None);
        assert_eq!(all.len(), 3);

        let users: Vec<_> = cache
            .find_in_file("a.py", Some("USER"))
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(users, vec!["load_user", "save_user"]);
        assert!(cache.find_in_file("missing.py", None).is_empty());
    }

    #[test]
    fn test_summary_counts() {
        let dir = TempDir::new().unwrap();
        let (cache, _) = counting_cache(dir.path());
        cache.get_or_analyze("a.py", "def one\ndef two\n");
        cache.get_or_analyze("b.py", "def three\n");

        let summary = cache.summary();
        assert_eq!(summary.total_files, 2);
        assert_eq!(summary.total_functions, 3);
        assert_eq!(summary.languages.get("python"), Some(&2));
        assert_eq!(summary.total_lines, 5);
        assert_eq!(summary.files[0].file_path, "a.py");
    }

    #[test]
    fn test_clear_empties_everything() {
        let dir = TempDir::new().unwrap();
        let (cache, calls) = counting_cache(dir.path());
        cache.get_or_analyze("a.py", "def one\n");

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.store.record_keys().unwrap().is_empty());

        cache.get_or_analyze("a.py", "def one\n");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
