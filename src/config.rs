//! Configuration file schema for astcache.
//!
//! Every field is optional; an absent file means all defaults.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{LanguageAnalyzer, DEFAULT_VARIABLE_CAP};
use crate::parser::ParserBackendRegistry;

/// Config file names searched for in the working directory.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["astcache.yaml", ".astcache.yaml"];

const DEFAULT_MAX_AGE_DAYS: u64 = 7;
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Base directory holding one subdirectory per project
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Default age limit for cleanup, in days (default: 7)
    #[serde(default)]
    pub max_age_days: Option<u64>,
    /// Maximum variables kept per analyzed file (default: 20)
    #[serde(default)]
    pub variable_cap: Option<usize>,
    /// Languages that must not use a tree-sitter grammar
    #[serde(default)]
    pub disabled_grammars: Vec<String>,
    /// Glob patterns skipped while indexing a directory (e.g., "**/vendor/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Whether indexing descends into dot-directories (default: false)
    #[serde(default)]
    pub include_hidden: Option<bool>,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        // An empty document deserializes to unit, not to a map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// First default config file present in `dir`.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.as_ref().join(name))
            .find(|path| path.is_file())
    }

    /// Load `explicit` if given, else a discovered file in the working
    /// directory, else defaults. The loaded config is validated.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover("."),
        };
        let config = match &path {
            Some(p) => Self::parse_file(p)
                .map_err(|e| anyhow::anyhow!("error parsing {}: {}", p.display(), e))?,
            None => Self::default(),
        };
        validate(&config)?;
        Ok((config, path))
    }

    /// Returns the cache base directory.
    ///
    /// Defaults to the platform cache directory, or `./.astcache` when the
    /// platform has none.
    pub fn get_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", "astcache")
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".astcache"))
    }

    pub fn get_max_age_days(&self) -> u64 {
        self.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS)
    }

    pub fn get_variable_cap(&self) -> usize {
        self.variable_cap.unwrap_or(DEFAULT_VARIABLE_CAP)
    }

    pub fn should_include_hidden(&self) -> bool {
        self.include_hidden.unwrap_or(false)
    }

    /// Compiled `excluded_paths`. Fails on a malformed pattern.
    pub fn exclusions(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|e| {
                anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e)
            })?;
            builder.add(glob);
        }
        Ok(builder.build()?)
    }

    /// Analyzer honoring `disabled_grammars` and `variable_cap`.
    pub fn build_analyzer(&self) -> LanguageAnalyzer {
        let registry = ParserBackendRegistry::new()
            .with_disabled_grammars(self.disabled_grammars.iter().map(String::as_str));
        LanguageAnalyzer::new(Arc::new(registry)).with_variable_cap(self.get_variable_cap())
    }
}

/// Convert a day count to a cleanup age.
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n.saturating_mul(SECONDS_PER_DAY))
}

/// Validate a config for correctness.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    if config.variable_cap == Some(0) {
        anyhow::bail!("variable_cap must be at least 1");
    }

    // Validate excluded_paths glob patterns compile
    config.exclusions()?;

    Ok(())
}
