//! Per-plugin facts cache.

use super::{ExtractError, Facts};
use std::path::{Path, PathBuf};
use tracing::debug;

const FACTS_FILE: &str = "plugin-metadata.json";

/// Persists facts at `<cache>/<plugin>/plugin-metadata.json`.
#[derive(Debug, Clone)]
pub struct FactsCache {
    root: PathBuf,
}

impl FactsCache {
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Location of the cached facts of `plugin`.
    #[must_use]
    pub fn path(&self, plugin: &str) -> PathBuf {
        self.root.join(plugin).join(FACTS_FILE)
    }

    /// Loads cached facts; `None` when nothing was cached yet.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the cached file exists but is unreadable.
    pub fn get(&self, plugin: &str) -> Result<Option<Facts>, ExtractError> {
        let path = self.path(plugin);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| ExtractError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let facts = serde_json::from_str(&contents).map_err(|e| ExtractError::Json {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!(plugin, path = %path.display(), "Loaded cached facts");
        Ok(Some(facts))
    }

    /// Stores facts, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Io`] when the file cannot be written.
    pub fn put(&self, plugin: &str, facts: &Facts) -> Result<PathBuf, ExtractError> {
        let path = self.path(plugin);
        let io_error = |e| ExtractError::Io {
            path: path.display().to_string(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(facts).map_err(|e| ExtractError::Json {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(&path, json).map_err(io_error)?;
        Ok(path)
    }
}
