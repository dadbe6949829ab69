//! Per-unit driver.
//!
//! [`Orchestrator::process`] takes one plugin from catalog validation to a
//! published pull request. Failures are recorded on the [`WorkItem`] and stop
//! the pipeline; the modernization record is then built and published for the
//! metadata repository regardless, unless the unit was skipped before anything
//! was touched.

use crate::build::{BuildTool, Goal, Transformer};
use crate::catalog::PluginCatalog;
use crate::config::{Recipe, Settings};
use crate::facts::pom::{self, PomDescriptor};
use crate::facts::{FactExtractor, Facts, FactsCache};
use crate::git::DiffStats;
use crate::record::{MigrationStatus, ModernizationRecord, RecordError, RecordStore};
use crate::repo_kind::RepoKind;
use crate::runtime::{self, Jdk};
use crate::sync::{HostSync, SyncError};
use crate::work_item::{UnitError, WorkItem};
use std::collections::BTreeSet;
use tracing::{debug, info, info_span, warn, Instrument};

const OPT_OUT_LIST_URL: &str =
    "https://github.com/jenkins-infra/metadata-plugin-modernizer/blob/main/opt-out-plugins.json";

/// External capabilities the driver invokes.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub catalog: &'a dyn PluginCatalog,
    pub build: &'a dyn BuildTool,
    pub transformer: &'a dyn Transformer,
    pub extractor: &'a dyn FactExtractor,
}

/// How far a unit got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not in the catalog; nothing was touched.
    Skipped,
    /// Went through the pipeline, successfully or not.
    Processed,
}

/// Errors raised while publishing the modernization record.
#[derive(Debug, thiserror::Error)]
enum PublishError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Drives units through the modernization pipeline.
pub struct Orchestrator<'a> {
    sync: HostSync<'a>,
    tools: Collaborators<'a>,
    recipe: &'a Recipe,
    facts: FactsCache,
    records: RecordStore,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub fn new(sync: HostSync<'a>, tools: Collaborators<'a>) -> Self {
        let cache = &sync.settings().cache_path;
        let facts = FactsCache::new(cache);
        let records = RecordStore::new(cache);
        let recipe = sync.text().recipe;
        Self {
            sync,
            tools,
            recipe,
            facts,
            records,
        }
    }

    fn settings(&self) -> &Settings {
        self.sync.settings()
    }

    /// Facts cache used for this run.
    #[must_use]
    pub fn facts_cache(&self) -> &FactsCache {
        &self.facts
    }

    /// Processes one unit. Never fails; errors end up on `item`.
    pub async fn process(&self, item: &mut WorkItem) -> Disposition {
        let span = info_span!("process", plugin = %item.name());
        async {
            info!(recipe = %self.recipe.id, "Processing plugin");
            let disposition = match self.modernize(item).await {
                Ok(disposition) => disposition,
                Err(err) => {
                    debug!(error = %err.describe(), "Stopped processing");
                    Disposition::Processed
                }
            };
            if disposition == Disposition::Processed && !self.settings().skip_metadata {
                self.publish_record(item).await;
            }
            disposition
        }
        .instrument(span)
        .await
    }

    async fn modernize(&self, item: &mut WorkItem) -> Result<Disposition, UnitError> {
        let settings = self.settings();
        let catalog = self.tools.catalog;
        let name = item.name().to_string();

        if !item.is_local() {
            if !catalog.exists(&name) {
                info!("Plugin not found in update center. Skipping");
                return Ok(Disposition::Skipped);
            }
            match catalog.repository_name(&name) {
                Some(repository) => item.set_repository_name(repository),
                None => {
                    item.add_error(format!(
                        "Unable to resolve the source repository of plugin {name}"
                    ));
                    item.raise_last_error()?;
                }
            }
        }

        if catalog.is_deprecated(&name) && !settings.allow_deprecated {
            item.add_error(
                "Plugin is deprecated. Modernization is blocked by default for deprecated plugins.\n\
                 If you are a maintainer or understand the risks, you can bypass this restriction by adding:\n  \
                 --allow-deprecated-plugins",
            );
            item.raise_last_error()?;
        }

        let archived = self.sync.is_archived(item).await;
        if record(item, "Failed to check if the repository is archived", archived)? {
            item.add_error("Plugin is archived");
            item.raise_last_error()?;
        }

        if settings.remove_forks {
            let result = self.sync.delete_fork(item).await;
            record(item, "Failed to delete fork", result)?;
        }
        let result = self.sync.fetch(item, RepoKind::Primary).await;
        record(item, "Failed to fetch plugin repository", result)?;

        adjust_for_multi_module(item);

        let cached = self.facts.get(&name);
        match record(item, "Failed to read cached facts", cached)? {
            Some(facts) if facts.errors.is_empty() => item.set_facts(facts),
            Some(_) => debug!("Ignoring cached facts with precondition errors"),
            None => {}
        }
        if item.has_facts()
            && !settings.metadata_only
            && !settings.skip_verification
        {
            self.compile_cached(item).await?;
        }

        let result = self.sync.checkout_branch(item, RepoKind::Primary).await;
        record(item, "Failed to checkout branch", result)?;
        item.set_runtime(Jdk::TRANSFORMATION);

        if !item.has_facts() || settings.metadata_only {
            self.collect_facts(item, true).await?;
        }

        self.remediate_preconditions(item).await?;

        if item.has_errors() || item.has_precondition_errors() {
            info!(
                errors = item.errors().len(),
                preconditions = item.precondition_errors().len(),
                "Skipping plugin due to metadata or precondition errors"
            );
            return Ok(Disposition::Processed);
        }

        if item.facts().is_some_and(Facts::only_implicit_runtime) {
            self.resolve_implicit_runtime(item).await?;
        }

        let platform_version = item.facts().and_then(|f| f.jenkins_version.clone());
        let platform_baseline = item
            .facts()
            .and_then(Facts::platform_baseline)
            .map(str::to_string);
        let effective = platform_version
            .as_deref()
            .map(runtime::effective_baseline);
        item.set_baselines(platform_baseline, platform_version, effective);

        if settings.metadata_only {
            info!("Metadata collected");
            return Ok(Disposition::Processed);
        }

        self.transform(item).await?;

        if !settings.skip_verification {
            self.verify(item).await?;
        }

        self.finalize(item).await?;
        Ok(Disposition::Processed)
    }

    /// Initial smoke compile when facts came from the cache.
    async fn compile_cached(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        let (jdks, version) = declared_runtimes(item);
        let jdk = runtime::resolve_minimum(&jdks, &version);
        item.set_runtime(jdk);
        info!(jdk = jdk.major(), "Compiling plugin");

        let path = item.build_path();
        let result = self.tools.build.run(&path, jdk, Goal::Clean).await;
        record(item, "Failed to clean plugin", result)?;
        let result = self.tools.build.run(&path, jdk, Goal::Compile).await;
        record(item, "Failed to compile plugin", result)?;
        Ok(())
    }

    /// Collects facts, retrying once after a quick build on the oldest runtime.
    async fn collect_facts(&self, item: &mut WorkItem, retry: bool) -> Result<(), UnitError> {
        let path = item.build_path();
        let mut collected = self.tools.extractor.collect(&path, item.runtime()).await;

        if retry {
            if let Err(err) = &collected {
                warn!(error = %err, "Failed to collect metadata. Retrying after a quick build");
                let jdk = Jdk::min();
                item.set_runtime(jdk);
                let result = self.tools.build.run(&path, jdk, Goal::QuickBuild).await;
                record(item, "Failed to build plugin with the quick-build profile", result)?;
                item.set_runtime(Jdk::TRANSFORMATION);
                collected = self.tools.extractor.collect(&path, item.runtime()).await;
            }
        }

        let facts = record(item, "Failed to collect plugin metadata", collected)?;
        let cached = self.facts.put(item.name(), &facts);
        record(item, "Failed to cache plugin metadata", cached)?;
        item.set_facts(facts);
        Ok(())
    }

    async fn remediate_preconditions(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        let path = item.build_path();
        let mut remediated = false;
        for error in item.precondition_errors() {
            if error.remediate(&path) {
                info!(precondition = ?error, "Remediated precondition");
                item.remove_precondition_error(error);
                remediated = true;
            } else {
                warn!(precondition = ?error, message = error.message(), "Unable to remediate precondition");
            }
        }

        if remediated {
            self.collect_facts(item, false).await?;
        }
        Ok(())
    }

    /// Derives the runtime from the pom when the collected one is only implicit.
    async fn resolve_implicit_runtime(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        let settings = self.settings();
        let path = item.build_path();
        let version = PomDescriptor::read(&path)
            .ok()
            .and_then(|pom| pom.jenkins_version());
        let Some(version) = version else {
            item.add_error(format!(
                "Unable to determine the Jenkins version from {}",
                path.join(pom::POM_FILE).display()
            ));
            return item.raise_last_error();
        };

        let jdk = Jdk::supporting(&version)
            .first()
            .copied()
            .unwrap_or_else(Jdk::min);
        info!(jenkins_version = %version, jdk = jdk.major(), "Using runtime derived from pom");
        let apply = |facts: &mut Facts| {
            facts.jdks = BTreeSet::from([jdk]);
            if facts.jenkins_version.is_none() {
                facts.jenkins_version = Some(version.clone());
            }
        };
        if let Some(facts) = item.facts_mut() {
            apply(facts);
        }
        self.store_facts(item)?;

        if jdk <= Jdk::IMPLICIT {
            item.set_runtime(jdk);
            if let Err(err) = self.tools.build.run(&path, jdk, Goal::QuickBuild).await {
                item.add_error_with_cause(
                    "Failed to build plugin with the quick-build profile",
                    &err,
                );
                if !settings.skip_verification {
                    return item.raise_last_error();
                }
                // Nothing before this point left errors behind (checked in `modernize`).
                item.clear_errors();
                item.add_warning(format!("Quick build with JDK {} failed", jdk.major()));
            }
            self.collect_facts(item, false).await?;
            if item.facts().is_some_and(Facts::only_implicit_runtime) {
                if let Some(facts) = item.facts_mut() {
                    apply(facts);
                }
                self.store_facts(item)?;
            }
        }

        if settings.metadata_only {
            let result = self.sync.fetch(item, RepoKind::Primary).await;
            record(item, "Failed to fetch plugin repository", result)?;
        }
        Ok(())
    }

    fn store_facts(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        let Some(facts) = item.facts() else {
            return Ok(());
        };
        let result = self.facts.put(item.name(), facts);
        record(item, "Failed to cache plugin metadata", result).map(|_| ())
    }

    async fn transform(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        item.set_runtime(Jdk::TRANSFORMATION);
        let path = item.build_path();
        let result = self
            .tools
            .transformer
            .apply(&path, self.recipe, item.runtime())
            .await;
        let changed = record(item, "Failed to apply recipe", result)?;
        info!(changed = changed.len(), "Transformation finished");
        item.add_tags(self.recipe.tags.iter().cloned());
        Ok(())
    }

    /// Verifies the tree, walking forward from the minimum runtime until a build passes.
    async fn verify(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        let (jdks, version) = declared_runtimes(item);
        let start = runtime::resolve_minimum(&jdks, &version);
        let walk = runtime::walk_forward(start, &version);
        if walk.exhausted {
            let platform = if version.is_empty() {
                "an unknown Jenkins version".to_string()
            } else {
                format!("Jenkins {version}")
            };
            item.add_warning(format!(
                "No runtime marked as supported for {platform}; verifying with JDK {}",
                walk.runtime.major()
            ));
        }

        let path = item.build_path();
        let formatter = item.facts().is_some_and(Facts::formatter_enabled);
        let candidates = runtime::verification_candidates(walk, &version);
        let mut failures = Vec::new();
        for jdk in &candidates {
            item.set_runtime(*jdk);
            info!(jdk = jdk.major(), "Verifying plugin");
            match self.verify_with(&path, *jdk, formatter).await {
                Ok(()) => {
                    info!(jdk = jdk.major(), "Verification passed");
                    return Ok(());
                }
                Err(err) => {
                    warn!(jdk = jdk.major(), error = %err, "Verification failed");
                    failures.push(err);
                }
            }
        }

        let tried: Vec<String> = candidates.iter().map(|jdk| jdk.major().to_string()).collect();
        let message = format!("Verification failed with JDK {}", tried.join(", "));
        match failures.pop() {
            Some(err) => item.add_error_with_cause(message, &err),
            None => item.add_error(message),
        }
        item.raise_last_error()
    }

    async fn verify_with(
        &self,
        path: &std::path::Path,
        jdk: Jdk,
        formatter: bool,
    ) -> Result<(), crate::build::BuildError> {
        let build = self.tools.build;
        build.run(path, jdk, Goal::Clean).await?;
        if formatter {
            build.run(path, jdk, Goal::Format).await?;
        }
        build.run(path, jdk, Goal::Verify).await
    }

    /// Re-collects facts, commits and publishes the primary repository.
    async fn finalize(&self, item: &mut WorkItem) -> Result<(), UnitError> {
        let settings = self.settings();
        let build = self.tools.build;
        let path = item.build_path();

        item.set_runtime(Jdk::TRANSFORMATION);
        let result = build.run(&path, item.runtime(), Goal::Clean).await;
        record(item, "Failed to clean plugin", result)?;
        self.collect_facts(item, false).await?;
        if !settings.dry_run {
            let result = build.run(&path, item.runtime(), Goal::Clean).await;
            record(item, "Failed to clean plugin", result)?;
        }

        let result = self.sync.commit(item, RepoKind::Primary).await;
        record(item, "Failed to commit changes", result)?;

        if item.is_local() {
            info!(files = item.modified_files().len(), "Local plugin. Not publishing");
            return Ok(());
        }

        let name = item.name().to_string();
        if item.modified_files().is_empty() {
            info!("No changes were made");
        } else if self.tools.catalog.is_opted_out(&name) && !settings.override_opt_out {
            info!(
                "Plugin {name} has opted out for receiving PRs. See {OPT_OUT_LIST_URL}, \
                 Use the --override-opt-out-plugins to override the default behaviour"
            );
        } else {
            self.publish(item, RepoKind::Primary).await?;
        }

        if settings.remove_forks {
            let result = self.sync.delete_fork(item).await;
            record(item, "Failed to delete fork", result)?;
        }
        Ok(())
    }

    async fn publish(&self, item: &mut WorkItem, kind: RepoKind) -> Result<(), UnitError> {
        let result = self.sync.fork(item, kind).await;
        record(item, "Failed to fork repository", result)?;
        let result = self.sync.sync(item, kind).await;
        record(item, "Failed to sync fork", result)?;
        let result = self.sync.push(item, kind).await;
        record(item, "Failed to push changes", result)?;
        let result = self.sync.open_pull_request(item, kind).await;
        record(item, "Failed to open pull request", result)?;
        Ok(())
    }

    /// Builds, stores and publishes the modernization record.
    ///
    /// A failure here is recorded on the unit and never propagates.
    async fn publish_record(&self, item: &mut WorkItem) {
        if let Err(err) = self.try_publish_record(item).await {
            item.add_error_with_cause(
                format!(
                    "Failed to collect modernization metadata for plugin {}",
                    item.name()
                ),
                &err,
            );
        }
    }

    async fn try_publish_record(&self, item: &mut WorkItem) -> Result<(), PublishError> {
        if !item.has_facts() {
            debug!("No facts collected. Not writing modernization metadata");
            return Ok(());
        }

        let diff = self.sync.diff_stats(item).await?;
        let record = self.build_record(item, diff);
        let location = self.records.save(item.name(), &record)?;
        item.set_record(record.clone(), location);

        if item.is_local() {
            warn!("Local plugin. Modernization metadata is not validated nor published");
            return Ok(());
        }
        record.ensure_valid()?;

        let kind = RepoKind::Metadata;
        self.sync.fetch(item, kind).await?;
        self.sync.fork(item, kind).await?;
        self.sync.sync(item, kind).await?;
        self.sync.checkout_branch(item, kind).await?;
        self.records
            .copy_to_checkout(item.name(), &record, item.metadata_checkout())?;
        self.sync.commit(item, kind).await?;
        self.sync.push(item, kind).await?;
        self.sync.open_pull_request(item, kind).await?;
        Ok(())
    }

    fn build_record(&self, item: &WorkItem, diff: DiffStats) -> ModernizationRecord {
        let settings = self.settings();
        let name = item.name();
        let mut record = ModernizationRecord::new(name);

        record.plugin_repository = item.repository_name().map(|repository| {
            format!(
                "https://github.com/{}/{repository}.git",
                settings.source_organization
            )
        });
        record.plugin_version = self.tools.catalog.version(name);
        record.jenkins_baseline = item.platform_baseline().map(str::to_string);
        record.effective_baseline = item.effective_baseline().map(str::to_string);
        record.jenkins_version = item.platform_version().map(str::to_string);
        record.target_baseline = item
            .facts()
            .and_then(|facts| facts.jenkins_version.as_deref())
            .map(runtime::effective_baseline)
            .or_else(|| record.effective_baseline.clone());
        record.migration_name = Some(self.recipe.name.clone());
        record.migration_description = Some(self.recipe.description.clone());
        record.migration_id = Some(self.recipe.id.clone());
        record.tags = self.recipe.tags.clone();
        record.migration_status = if item.has_errors() || item.has_precondition_errors() {
            MigrationStatus::Fail
        } else {
            MigrationStatus::Success
        };
        record.set_pull_request(item.pull_request_url());
        record.dry_run = settings.dry_run;
        record.additions = diff.additions;
        record.deletions = diff.deletions;
        record.changed_files = diff.changed_files;
        record
    }
}

/// Records a failed step on the unit and turns it into a stop signal.
fn record<T, E>(item: &mut WorkItem, message: &str, result: Result<T, E>) -> Result<T, UnitError>
where
    E: std::error::Error,
{
    result.map_err(|err| {
        let unit_error = UnitError::with_cause(message, &err);
        item.record_error(unit_error.clone());
        unit_error
    })
}

/// Declared runtimes and platform version of the collected facts.
fn declared_runtimes(item: &WorkItem) -> (BTreeSet<Jdk>, String) {
    item.facts()
        .map(|facts| {
            (
                facts.jdks.clone(),
                facts.jenkins_version.clone().unwrap_or_default(),
            )
        })
        .unwrap_or_default()
}

/// Points the build at the plugin module when the checkout root only aggregates.
fn adjust_for_multi_module(item: &mut WorkItem) {
    if item.build_subdir().is_some() {
        return;
    }
    let root = item.checkout_path().to_path_buf();
    let Ok(descriptor) = PomDescriptor::read(&root) else {
        return;
    };
    if !descriptor.is_aggregator() {
        return;
    }
    match pom::find_plugin_module(&root) {
        Some(module) => {
            info!(module = %module.display(), "Multi-module project. Building plugin module");
            item.set_build_subdir(module);
        }
        None => debug!("Aggregator without a plugin module"),
    }
}
