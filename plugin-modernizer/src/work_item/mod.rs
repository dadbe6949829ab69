//! Unit-of-work state for one plugin repository.
//!
//! A [`WorkItem`] is created for every plugin of a run before any I/O happens
//! and is threaded by mutable reference through the driver and synchronizer.
//! Progress flags are the only way steps talk to each other.

mod error;
mod progress;

pub use error::{Describe, UnitError};
pub use progress::ProgressFlags;

use crate::config::Settings;
use crate::facts::{Facts, PreconditionError};
use crate::record::ModernizationRecord;
use crate::runtime::Jdk;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// State of one plugin being modernized.
#[derive(Debug, Clone)]
pub struct WorkItem {
    name: String,
    local: bool,
    checkout: PathBuf,
    build_subdir: Option<PathBuf>,
    cache_dir: PathBuf,
    metadata_checkout: PathBuf,

    repository_name: Option<String>,
    archived: Option<bool>,
    runtime: Jdk,
    facts: Option<Facts>,
    record: Option<ModernizationRecord>,
    record_location: Option<PathBuf>,

    platform_baseline: Option<String>,
    platform_version: Option<String>,
    effective_baseline: Option<String>,
    pull_request_url: Option<String>,

    primary: ProgressFlags,
    metadata: ProgressFlags,

    errors: Vec<UnitError>,
    warnings: Vec<String>,
    modified_files: BTreeSet<String>,
    tags: BTreeSet<String>,
}

impl WorkItem {
    /// A plugin fetched from the hosting service into the cache.
    #[must_use]
    pub fn hosted(name: &str, settings: &Settings) -> Self {
        Self::build(name, false, settings.plugin_checkout(name), settings)
    }

    /// A plugin operating on an existing directory.
    #[must_use]
    pub fn local(name: &str, path: &Path, settings: &Settings) -> Self {
        Self::build(name, true, path.to_path_buf(), settings)
    }

    fn build(name: &str, local: bool, checkout: PathBuf, settings: &Settings) -> Self {
        Self {
            name: name.to_string(),
            local,
            checkout,
            build_subdir: None,
            cache_dir: settings.plugin_cache_dir(name),
            metadata_checkout: settings.metadata_checkout(),
            repository_name: None,
            archived: None,
            runtime: Jdk::TRANSFORMATION,
            facts: None,
            record: None,
            record_location: None,
            platform_baseline: None,
            platform_version: None,
            effective_baseline: None,
            pull_request_url: None,
            primary: ProgressFlags::default(),
            metadata: ProgressFlags::default(),
            errors: Vec::new(),
            warnings: Vec::new(),
            modified_files: BTreeSet::new(),
            tags: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Root of the git checkout.
    #[must_use]
    pub fn checkout_path(&self) -> &Path {
        &self.checkout
    }

    /// Directory holding the buildable module (the checkout root unless nested).
    #[must_use]
    pub fn build_path(&self) -> PathBuf {
        match &self.build_subdir {
            Some(subdir) => self.checkout.join(subdir),
            None => self.checkout.clone(),
        }
    }

    #[must_use]
    pub fn build_subdir(&self) -> Option<&Path> {
        self.build_subdir.as_deref()
    }

    pub fn set_build_subdir(&mut self, subdir: PathBuf) {
        self.build_subdir = Some(subdir);
    }

    /// Per-plugin cache directory (facts, records).
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn metadata_checkout(&self) -> &Path {
        &self.metadata_checkout
    }

    /// Repository name under the source organization, once resolved.
    #[must_use]
    pub fn repository_name(&self) -> Option<&str> {
        self.repository_name.as_deref()
    }

    pub fn set_repository_name(&mut self, name: impl Into<String>) {
        self.repository_name = Some(name.into());
    }

    /// Cached archived flag of the source repository.
    #[must_use]
    pub fn archived(&self) -> Option<bool> {
        self.archived
    }

    pub fn set_archived(&mut self, archived: bool) {
        self.archived = Some(archived);
    }

    #[must_use]
    pub fn runtime(&self) -> Jdk {
        self.runtime
    }

    pub fn set_runtime(&mut self, runtime: Jdk) {
        self.runtime = runtime;
    }

    #[must_use]
    pub fn facts(&self) -> Option<&Facts> {
        self.facts.as_ref()
    }

    pub fn facts_mut(&mut self) -> Option<&mut Facts> {
        self.facts.as_mut()
    }

    pub fn set_facts(&mut self, facts: Facts) {
        self.facts = Some(facts);
    }

    #[must_use]
    pub fn has_facts(&self) -> bool {
        self.facts.is_some()
    }

    #[must_use]
    pub fn has_precondition_errors(&self) -> bool {
        self.facts.as_ref().is_some_and(|f| !f.errors.is_empty())
    }

    #[must_use]
    pub fn precondition_errors(&self) -> Vec<PreconditionError> {
        self.facts
            .as_ref()
            .map(|f| f.errors.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn remove_precondition_error(&mut self, error: PreconditionError) {
        if let Some(facts) = self.facts.as_mut() {
            facts.errors.remove(&error);
        }
    }

    #[must_use]
    pub fn record(&self) -> Option<&ModernizationRecord> {
        self.record.as_ref()
    }

    /// Where the record was written locally.
    #[must_use]
    pub fn record_location(&self) -> Option<&Path> {
        self.record_location.as_deref()
    }

    pub fn set_record(&mut self, record: ModernizationRecord, location: PathBuf) {
        self.record = Some(record);
        self.record_location = Some(location);
    }

    #[must_use]
    pub fn platform_baseline(&self) -> Option<&str> {
        self.platform_baseline.as_deref()
    }

    #[must_use]
    pub fn platform_version(&self) -> Option<&str> {
        self.platform_version.as_deref()
    }

    #[must_use]
    pub fn effective_baseline(&self) -> Option<&str> {
        self.effective_baseline.as_deref()
    }

    pub fn set_baselines(
        &mut self,
        platform_baseline: Option<String>,
        platform_version: Option<String>,
        effective_baseline: Option<String>,
    ) {
        self.platform_baseline = platform_baseline;
        self.platform_version = platform_version;
        self.effective_baseline = effective_baseline;
    }

    #[must_use]
    pub fn pull_request_url(&self) -> Option<&str> {
        self.pull_request_url.as_deref()
    }

    pub fn set_pull_request_url(&mut self, url: impl Into<String>) {
        self.pull_request_url = Some(url.into());
    }

    #[must_use]
    pub fn primary_progress(&self) -> &ProgressFlags {
        &self.primary
    }

    pub fn primary_progress_mut(&mut self) -> &mut ProgressFlags {
        &mut self.primary
    }

    #[must_use]
    pub fn metadata_progress(&self) -> &ProgressFlags {
        &self.metadata
    }

    pub fn metadata_progress_mut(&mut self) -> &mut ProgressFlags {
        &mut self.metadata
    }

    /// Appends an error. Never aborts processing by itself.
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.record_error(UnitError::new(message));
    }

    pub fn add_error_with_cause(
        &mut self,
        message: impl Into<String>,
        cause: &dyn std::error::Error,
    ) {
        self.record_error(UnitError::with_cause(message, cause));
    }

    pub fn record_error(&mut self, err: UnitError) {
        error!(plugin = %self.name, error = %err.describe(), "Plugin error");
        self.errors.push(err);
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn errors(&self) -> &[UnitError] {
        &self.errors
    }

    /// Fails with the most recent error, if any.
    ///
    /// # Errors
    ///
    /// Returns a clone of the last recorded [`UnitError`].
    pub fn raise_last_error(&self) -> Result<(), UnitError> {
        match self.errors.last() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        warn!(plugin = %self.name, warning = %warning, "Plugin warning");
        self.warnings.push(warning);
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_modified_files<I, S>(&mut self, files: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modified_files.extend(files.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn modified_files(&self) -> &BTreeSet<String> {
        &self.modified_files
    }

    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }
}
