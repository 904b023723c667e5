//! Per-project index mapping file paths to their validity token and record.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Filesystem-safe record name for `file_path`.
///
/// A pure function of the path, so it can always be recomputed.
pub fn storage_key(file_path: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(file_path.as_bytes()));
    digest[..32].to_string()
}

/// Pointer from one file path to its stored analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndexEntry {
    pub file_path: String,
    pub content_hash: String,
    pub last_analyzed: DateTime<Utc>,
    pub storage_key: String,
    pub language: String,
}

/// All index entries of one project, one per distinct path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheIndex {
    entries: BTreeMap<String, CacheIndexEntry>,
}

impl CacheIndex {
    pub fn get(&self, file_path: &str) -> Option<&CacheIndexEntry> {
        self.entries.get(file_path)
    }

    /// Insert or replace the entry for `entry.file_path`.
    pub fn insert(&mut self, entry: CacheIndexEntry) -> Option<CacheIndexEntry> {
        self.entries.insert(entry.file_path.clone(), entry)
    }

    pub fn remove(&mut self, file_path: &str) -> Option<CacheIndexEntry> {
        self.entries.remove(file_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indexed paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheIndexEntry> {
        self.entries.values()
    }

    pub fn storage_keys(&self) -> HashSet<&str> {
        self.entries.values().map(|e| e.storage_key.as_str()).collect()
    }

    /// Paths analyzed at or before `cutoff`.
    pub fn stale_paths(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| e.last_analyzed <= cutoff)
            .map(|e| e.file_path.clone())
            .collect()
    }
}
