//! Modernization record: the persisted outcome of one unit.
//!
//! A record is written to the plugin cache for every unit that got as far as
//! collecting facts, then copied into the metadata repository checkout under a
//! timestamped name so successive runs never overwrite each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORD_FILE: &str = "modernization-metadata.json";
const RECORD_DIR: &str = "modernization-metadata";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

/// Errors that can occur while persisting records.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize record '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Required fields are missing.
    #[error("Plugin {plugin} has invalid modernization metadata (missing {})", missing.join(", "))]
    Invalid {
        plugin: String,
        missing: Vec<&'static str>,
    },
}

/// Outcome of the migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    Success,
    Fail,
}

/// Fact sheet of one unit's run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModernizationRecord {
    pub plugin_name: Option<String>,
    pub plugin_repository: Option<String>,
    pub plugin_version: Option<String>,
    /// `jenkins.baseline` property before the migration.
    pub jenkins_baseline: Option<String>,
    /// Effective baseline after the migration.
    pub target_baseline: Option<String>,
    /// Effective baseline before the migration.
    pub effective_baseline: Option<String>,
    pub jenkins_version: Option<String>,
    pub migration_name: Option<String>,
    pub migration_description: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub migration_id: Option<String>,
    pub migration_status: MigrationStatus,
    pub pull_request_url: Option<String>,
    pub pull_request_status: Option<String>,
    pub dry_run: bool,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
    pub timestamp: DateTime<Utc>,
}

impl ModernizationRecord {
    /// An empty record for `plugin`, stamped now.
    #[must_use]
    pub fn new(plugin: &str) -> Self {
        Self {
            plugin_name: Some(plugin.to_string()),
            plugin_repository: None,
            plugin_version: None,
            jenkins_baseline: None,
            target_baseline: None,
            effective_baseline: None,
            jenkins_version: None,
            migration_name: None,
            migration_description: None,
            tags: BTreeSet::new(),
            migration_id: None,
            migration_status: MigrationStatus::Fail,
            pull_request_url: None,
            pull_request_status: None,
            dry_run: false,
            additions: 0,
            deletions: 0,
            changed_files: 0,
            timestamp: Utc::now(),
        }
    }

    /// Sets the pull request URL; a present URL marks the pull request as open.
    pub fn set_pull_request(&mut self, url: Option<&str>) {
        let url = url.filter(|u| !u.is_empty());
        self.pull_request_url = url.map(str::to_string);
        self.pull_request_status = url.map(|_| "open".to_string());
    }

    /// Names of required fields that are not set.
    #[must_use]
    pub fn validate(&self) -> Vec<&'static str> {
        let required = [
            ("pluginName", &self.plugin_name),
            ("pluginRepository", &self.plugin_repository),
            ("pluginVersion", &self.plugin_version),
            ("jenkinsVersion", &self.jenkins_version),
            ("targetBaseline", &self.target_baseline),
            ("migrationName", &self.migration_name),
            ("migrationDescription", &self.migration_description),
            ("migrationId", &self.migration_id),
        ];
        required
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect()
    }

    /// # Errors
    ///
    /// Returns [`RecordError::Invalid`] listing the missing fields.
    pub fn ensure_valid(&self) -> Result<(), RecordError> {
        let missing = self.validate();
        if missing.is_empty() {
            return Ok(());
        }
        Err(RecordError::Invalid {
            plugin: self.plugin_name.clone().unwrap_or_default(),
            missing,
        })
    }

    /// File name used in the metadata repository.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{}.json", self.timestamp.format(TIMESTAMP_FORMAT))
    }
}

/// Writes records to the cache and the metadata checkout.
#[derive(Debug, Clone)]
pub struct RecordStore {
    cache_root: PathBuf,
}

impl RecordStore {
    #[must_use]
    pub fn new(cache_root: &Path) -> Self {
        Self {
            cache_root: cache_root.to_path_buf(),
        }
    }

    /// Path of the cached record of `plugin`.
    #[must_use]
    pub fn cache_path(&self, plugin: &str) -> PathBuf {
        self.cache_root.join(plugin).join(RECORD_FILE)
    }

    /// Writes the record to `<cache>/<plugin>/modernization-metadata.json`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the file cannot be written.
    pub fn save(&self, plugin: &str, record: &ModernizationRecord) -> Result<PathBuf, RecordError> {
        let path = self.cache_path(plugin);
        write_json(&path, record)?;
        info!(plugin, path = %path.display(), "Saved modernization metadata");
        Ok(path)
    }

    /// Reads the cached record of `plugin`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the file exists but cannot be read.
    pub fn load(&self, plugin: &str) -> Result<Option<ModernizationRecord>, RecordError> {
        let path = self.cache_path(plugin);
        if !path.is_file() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| RecordError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| RecordError::Json {
                path: path.display().to_string(),
                source: e,
            })
    }

    /// Copies the record into `<checkout>/<plugin>/modernization-metadata/<timestamp>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] when the file cannot be written.
    pub fn copy_to_checkout(
        &self,
        plugin: &str,
        record: &ModernizationRecord,
        checkout: &Path,
    ) -> Result<PathBuf, RecordError> {
        let path = checkout
            .join(plugin)
            .join(RECORD_DIR)
            .join(record.file_name());
        write_json(&path, record)?;
        debug!(plugin, path = %path.display(), "Copied modernization metadata to metadata repository");
        Ok(path)
    }
}

fn write_json(path: &Path, record: &ModernizationRecord) -> Result<(), RecordError> {
    let io_error = |e| RecordError::Io {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let json = serde_json::to_string_pretty(record).map_err(|e| RecordError::Json {
        path: path.display().to_string(),
        source: e,
    })?;
    std::fs::write(path, json).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn complete() -> ModernizationRecord {
        let mut record = ModernizationRecord::new("git");
        record.plugin_repository = Some("https://github.com/jenkinsci/git-plugin.git".to_string());
        record.plugin_version = Some("5.7.0".to_string());
        record.jenkins_version = Some("2.479.3".to_string());
        record.target_baseline = Some("2.479".to_string());
        record.migration_name = Some("Setup Renovate".to_string());
        record.migration_description = Some("Setup Renovate for the plugin".to_string());
        record.migration_id = Some("io.jenkins.tools.pluginmodernizer.SetupRenovate".to_string());
        record.timestamp = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        record
    }

    #[test]
    fn complete_record_is_valid() {
        assert!(complete().validate().is_empty());
        assert!(complete().ensure_valid().is_ok());
    }

    #[test]
    fn reports_missing_fields() {
        let mut record = complete();
        record.plugin_version = None;
        record.migration_id = Some("  ".to_string());

        assert_eq!(record.validate(), vec!["pluginVersion", "migrationId"]);
        let err = record.ensure_valid().unwrap_err();
        assert!(err.to_string().contains("missing pluginVersion, migrationId"));
    }

    #[test]
    fn pull_request_status_follows_url() {
        let mut record = complete();
        record.set_pull_request(Some("https://github.com/jenkinsci/git-plugin/pull/3"));
        assert_eq!(record.pull_request_status.as_deref(), Some("open"));

        record.set_pull_request(Some(""));
        assert_eq!(record.pull_request_status, None);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(complete()).unwrap();
        assert_eq!(json["pluginName"], "git");
        assert_eq!(json["migrationStatus"], "fail");
        assert_eq!(json["changedFiles"], 0);
        assert!(json.get("dryRun").is_some());
    }

    #[test]
    fn saves_and_copies() {
        let cache = TempDir::new().unwrap();
        let checkout = TempDir::new().unwrap();
        let store = RecordStore::new(cache.path());
        let record = complete();

        let saved = store.save("git", &record).unwrap();
        assert_eq!(saved, cache.path().join("git").join(RECORD_FILE));
        assert_eq!(store.load("git").unwrap(), Some(record.clone()));

        let copied = store
            .copy_to_checkout("git", &record, checkout.path())
            .unwrap();
        assert_eq!(
            copied,
            checkout
                .path()
                .join("git/modernization-metadata/2026-03-04T05-06-07.json")
        );
        assert!(copied.is_file());
    }
}
