//! Persistence behind the project cache.
//!
//! [`JsonStore`] keeps one small index document per project plus one JSON
//! document per analyzed file, so a crash while writing one record cannot
//! damage the index or any other record. Every write goes to a temporary
//! file that is then renamed over the target.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::index::CacheIndex;
use crate::analysis::FileAnalysis;

const INDEX_FILE: &str = "ast_index.json";
const META_FILE: &str = "project.json";
const RECORDS_DIR: &str = "files";

/// Storage-level failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize cache data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("corrupt cache file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl CacheError {
    fn io(path: &Path, source: io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Identity of the project a store belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub project_id: String,
    pub project_name: String,
}

/// Where a project's index and per-file records live.
pub trait CacheStore: Send + Sync {
    /// The recorded project identity, `None` if none was written.
    fn load_meta(&self) -> Result<Option<ProjectMeta>, CacheError>;

    fn save_meta(&self, meta: &ProjectMeta) -> Result<(), CacheError>;

    /// The stored index, or an empty one if none was written yet.
    fn load_index(&self) -> Result<CacheIndex, CacheError>;

    fn save_index(&self, index: &CacheIndex) -> Result<(), CacheError>;

    /// The record stored under `key`, `None` if there is none.
    fn load_record(&self, key: &str) -> Result<Option<FileAnalysis>, CacheError>;

    fn save_record(&self, key: &str, analysis: &FileAnalysis) -> Result<(), CacheError>;

    /// Remove the record under `key`. Missing records are not an error.
    fn remove_record(&self, key: &str) -> Result<(), CacheError>;

    /// Keys of every stored record.
    fn record_keys(&self) -> Result<Vec<String>, CacheError>;

    /// Delete the index and every record. The project identity stays.
    fn clear(&self) -> Result<(), CacheError>;
}

/// JSON documents under one project directory.
pub struct JsonStore {
    root: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl JsonStore {
    /// Use `root` as the project directory, creating it if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, CacheError> {
        let store = Self {
            root: root.as_ref().to_path_buf(),
        };
        store.create_dirs()?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    fn records_dir(&self) -> PathBuf {
        self.root.join(RECORDS_DIR)
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.records_dir().join(format!("{}.json", key))
    }

    fn create_dirs(&self) -> Result<(), CacheError> {
        let records = self.records_dir();
        fs::create_dir_all(&records).map_err(|e| CacheError::io(&records, e))
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(path, e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| CacheError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// Write `bytes` to a unique temporary sibling of `path`, then rename it
/// over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    fs::write(&tmp, bytes).map_err(|e| CacheError::io(&tmp, e))?;
    if let Err(e) = replace_file(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::io(path, e));
    }
    Ok(())
}

fn replace_file(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            fs::remove_file(dst)?;
        }
    }
    fs::rename(src, dst)
}

impl CacheStore for JsonStore {
    fn load_meta(&self) -> Result<Option<ProjectMeta>, CacheError> {
        Self::read_json(&self.meta_path())
    }

    fn save_meta(&self, meta: &ProjectMeta) -> Result<(), CacheError> {
        self.create_dirs()?;
        let json = serde_json::to_vec_pretty(meta)?;
        write_atomic(&self.meta_path(), &json)
    }

    fn load_index(&self) -> Result<CacheIndex, CacheError> {
        Ok(Self::read_json(&self.index_path())?.unwrap_or_default())
    }

    fn save_index(&self, index: &CacheIndex) -> Result<(), CacheError> {
        self.create_dirs()?;
        let json = serde_json::to_vec_pretty(index)?;
        write_atomic(&self.index_path(), &json)
    }

    fn load_record(&self, key: &str) -> Result<Option<FileAnalysis>, CacheError> {
        Self::read_json(&self.record_path(key))
    }

    fn save_record(&self, key: &str, analysis: &FileAnalysis) -> Result<(), CacheError> {
        self.create_dirs()?;
        let json = serde_json::to_vec_pretty(analysis)?;
        write_atomic(&self.record_path(key), &json)
    }

    fn remove_record(&self, key: &str) -> Result<(), CacheError> {
        let path = self.record_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    fn record_keys(&self) -> Result<Vec<String>, CacheError> {
        let dir = self.records_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(&dir, e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(key) = name.strip_suffix(".json") {
                if !key.starts_with('.') {
                    keys.push(key.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn clear(&self) -> Result<(), CacheError> {
        let records = self.records_dir();
        match fs::remove_dir_all(&records) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&records, e)),
        }
        let index = self.index_path();
        match fs::remove_file(&index) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(&index, e)),
        }
        self.create_dirs()
    }
}
