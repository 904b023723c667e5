//! One [`ProjectCache`] per project id.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{
    project_dir_name, CacheError, CacheStore, JsonStore, ProjectCache, ProjectMeta, ProjectSummary,
};
use crate::analysis::LanguageAnalyzer;

#[derive(Debug, Clone, Serialize)]
pub struct GlobalSummary {
    pub total_projects: usize,
    pub projects: Vec<ProjectSummary>,
}

/// Owns the project caches of a process.
///
/// Two caches for the same id would keep diverging in-memory views, so all
/// access goes through [`GlobalCacheRegistry::get_or_create`].
pub struct GlobalCacheRegistry {
    base_dir: PathBuf,
    analyzer: Arc<LanguageAnalyzer>,
    projects: RwLock<HashMap<String, Arc<ProjectCache>>>,
}

impl GlobalCacheRegistry {
    pub fn new<P: AsRef<Path>>(base_dir: P, analyzer: Arc<LanguageAnalyzer>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            analyzer,
            projects: RwLock::new(HashMap::new()),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The analyzer every project cache of this registry uses.
    pub fn analyzer(&self) -> &Arc<LanguageAnalyzer> {
        &self.analyzer
    }

    /// The cache for `project_id`, opened on first use.
    ///
    /// `project_name` only matters the first time; it names the directory.
    pub fn get_or_create(
        &self,
        project_id: &str,
        project_name: &str,
    ) -> Result<Arc<ProjectCache>, CacheError> {
        if let Some(cache) = self.projects.read().get(project_id) {
            return Ok(cache.clone());
        }

        let mut projects = self.projects.write();
        if let Some(cache) = projects.get(project_id) {
            return Ok(cache.clone());
        }

        // A directory without a recorded id was opened under its own name.
        let dir_name = project_dir_name(project_name, project_id);
        if projects
            .get(&dir_name)
            .is_some_and(|cache| cache.project_id() == dir_name)
        {
            if let Some(cache) = projects.remove(&dir_name) {
                let meta = ProjectMeta {
                    project_id: project_id.to_string(),
                    project_name: project_name.to_string(),
                };
                if let Err(e) = cache.store.save_meta(&meta) {
                    warn!(project = project_id, error = %e, "failed to record project identity");
                }
                debug!(project = project_id, dir = %dir_name, "adopted project cache");
                projects.insert(project_id.to_string(), cache.clone());
                return Ok(cache);
            }
        }

        let cache = Arc::new(ProjectCache::open(
            &self.base_dir,
            project_id,
            project_name,
            self.analyzer.clone(),
        )?);
        debug!(project = project_id, "created project cache");
        projects.insert(project_id.to_string(), cache.clone());
        Ok(cache)
    }

    /// Open every project directory under the base directory that is not
    /// open yet. Projects are keyed by the id recorded in their directory,
    /// or by the directory name when none was recorded. Returns how many
    /// were opened.
    pub fn open_all(&self) -> Result<usize, CacheError> {
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(CacheError::Io {
                    path: self.base_dir.clone(),
                    source: e,
                })
            }
        };

        let open_dirs: Vec<String> = self
            .caches()
            .iter()
            .map(|c| project_dir_name(c.project_name(), c.project_id()))
            .collect();

        let mut opened = 0;
        let mut projects = self.projects.write();
        for entry in entries.flatten() {
            if !entry.path().is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if open_dirs.contains(&dir_name) {
                continue;
            }

            let store = JsonStore::open(entry.path())?;
            let (id, name) = match store.load_meta() {
                Ok(Some(meta)) => (meta.project_id, meta.project_name),
                Ok(None) => legacy_identity(&dir_name),
                Err(e) => {
                    warn!(dir = %dir_name, error = %e, "unreadable project identity");
                    legacy_identity(&dir_name)
                }
            };
            if projects.contains_key(&id) {
                continue;
            }
            let cache = ProjectCache::with_store(&id, &name, Box::new(store), self.analyzer.clone());
            projects.insert(id, Arc::new(cache));
            opened += 1;
        }
        debug!(opened, "opened project caches from disk");
        Ok(opened)
    }

    /// An already opened cache.
    pub fn get(&self, project_id: &str) -> Option<Arc<ProjectCache>> {
        self.projects.read().get(project_id).cloned()
    }

    /// Open project ids, sorted.
    pub fn project_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.projects.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clear a project's cache and forget it. Returns whether it was open.
    pub fn clear_project(&self, project_id: &str) -> bool {
        let removed = self.projects.write().remove(project_id);
        match removed {
            Some(cache) => {
                cache.clear();
                true
            }
            None => false,
        }
    }

    /// Run [`ProjectCache::cleanup`] on every open project.
    pub fn cleanup_all(&self, max_age: Duration) -> usize {
        let removed: usize = self
            .caches()
            .iter()
            .map(|cache| cache.cleanup(max_age))
            .sum();
        info!(removed, "cleaned up all project caches");
        removed
    }

    pub fn summary(&self) -> GlobalSummary {
        let projects: Vec<ProjectSummary> = self.caches().iter().map(|c| c.summary()).collect();
        GlobalSummary {
            total_projects: projects.len(),
            projects,
        }
    }

    /// Persist every open project's index.
    pub fn flush(&self) -> Result<(), CacheError> {
        for cache in self.caches() {
            cache.flush()?;
        }
        Ok(())
    }

    fn caches(&self) -> Vec<Arc<ProjectCache>> {
        let projects = self.projects.read();
        let mut caches: Vec<Arc<ProjectCache>> = projects.values().cloned().collect();
        caches.sort_by(|a, b| a.project_id().cmp(b.project_id()));
        caches
    }
}

/// `(id, name)` for a directory that never recorded its identity.
fn legacy_identity(dir_name: &str) -> (String, String) {
    let name = dir_name
        .rsplit_once('_')
        .map(|(name, _)| name)
        .unwrap_or(dir_name);
    (dir_name.to_string(), name.to_string())
}
