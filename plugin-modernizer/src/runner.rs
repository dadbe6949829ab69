//! Builds the clients once and runs every requested plugin.

mod error;

pub use error::RunnerError;

use crate::build::{MavenInvoker, RewriteTransformer};
use crate::catalog::UpdateCenter;
use crate::config::{Credentials, GitAuth, Recipe, Settings};
use crate::facts::pom::{self, PomDescriptor};
use crate::facts::MavenFactExtractor;
use crate::git::GitCli;
use crate::hosting::{GitHubHost, HostingApi, Identity};
use crate::orchestrator::{Collaborators, Orchestrator};
use crate::repo_kind::RecipeText;
use crate::summary::{RunSummary, UnitReport};
use crate::sync::HostSync;
use crate::templates::TemplateRenderer;
use crate::work_item::WorkItem;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// A plugin requested on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginTarget {
    /// A plugin of the update center, fetched into the cache.
    Name(String),
    /// An existing checkout on disk.
    Path(PathBuf),
}

impl fmt::Display for PluginTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => f.write_str(name),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl PluginTarget {
    /// Creates the unit for this target.
    ///
    /// A path target is named after the `artifactId` of its plugin module.
    ///
    /// # Errors
    ///
    /// Returns a message when no plugin name can be derived from the path.
    pub fn work_item(&self, settings: &Settings) -> Result<WorkItem, String> {
        match self {
            Self::Name(name) => Ok(WorkItem::hosted(name, settings)),
            Self::Path(path) => {
                let name = local_plugin_name(path).ok_or_else(|| {
                    format!("Unable to determine plugin name from {}", path.display())
                })?;
                Ok(WorkItem::local(&name, path, settings))
            }
        }
    }
}

fn local_plugin_name(path: &Path) -> Option<String> {
    let root = PomDescriptor::read(path).ok()?;
    if !root.is_aggregator() {
        return root.artifact_id();
    }
    let module = pom::find_plugin_module(path)?;
    PomDescriptor::read(&path.join(module)).ok()?.artifact_id()
}

/// Owns the clients of one run.
pub struct Runner {
    settings: Settings,
    credentials: Credentials,
    recipe: Recipe,
    host: GitHubHost,
    identity: Identity,
    owner: String,
    git: GitCli,
    build: MavenInvoker,
    catalog: UpdateCenter,
    renderer: TemplateRenderer,
    transformer: RewriteTransformer,
    extractor: MavenFactExtractor,
}

impl Runner {
    /// Connects to GitHub, checks Maven and loads the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError`] when a token or owner is missing, or a client
    /// cannot be initialized.
    pub async fn new(
        settings: Settings,
        recipe: Recipe,
        credentials: Credentials,
    ) -> Result<Self, RunnerError> {
        let token = credentials.require_token()?;
        let host = GitHubHost::connect(&settings.github_api_url, token).await?;
        let identity = host.current_identity().await?;
        let owner = match &settings.github_owner {
            Some(owner) => owner.clone(),
            None if !identity.login.is_empty() => identity.login.clone(),
            None => return Err(crate::config::ConfigError::MissingOwner.into()),
        };

        let ssh_key = match credentials.git_auth() {
            GitAuth::SshKey(key) => Some(key.clone()),
            GitAuth::Token => None,
        };
        let git = GitCli::new(ssh_key);
        let build = MavenInvoker::new(&settings);
        let version = build.validate().await?;
        info!(maven = %version, "Using Maven");

        let catalog = UpdateCenter::load(&settings).await?;

        Ok(Self {
            transformer: RewriteTransformer::new(build.clone(), git.clone()),
            extractor: MavenFactExtractor::new(build.clone()),
            settings,
            credentials,
            recipe,
            host,
            identity,
            owner,
            git,
            build,
            catalog,
            renderer: TemplateRenderer::new(),
        })
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Processes every target, one after another.
    pub async fn run(&self, targets: &[PluginTarget]) -> RunSummary {
        let mut summary = RunSummary::new(self.settings.dry_run, self.settings.metadata_only);
        if targets.is_empty() {
            warn!("No plugins to process");
            return summary;
        }

        let text = RecipeText {
            recipe: &self.recipe,
            renderer: &self.renderer,
        };
        let sync = HostSync::new(
            &self.host,
            &self.git,
            &self.settings,
            &self.credentials,
            self.owner.clone(),
            self.identity.clone(),
            text,
        );
        let orchestrator = Orchestrator::new(
            sync,
            Collaborators {
                catalog: &self.catalog,
                build: &self.build,
                transformer: &self.transformer,
                extractor: &self.extractor,
            },
        );

        info!(
            count = targets.len(),
            recipe = %self.recipe.id,
            owner = %self.owner,
            dry_run = self.settings.dry_run,
            metadata_only = self.settings.metadata_only,
            "Starting run"
        );
        for target in targets {
            let report = match target.work_item(&self.settings) {
                Ok(mut item) => {
                    let disposition = orchestrator.process(&mut item).await;
                    UnitReport::from_item(
                        &item,
                        disposition,
                        &self.settings,
                        orchestrator.facts_cache(),
                    )
                }
                Err(message) => {
                    error!(target = %target, error = %message, "Invalid plugin target");
                    UnitReport::failed(&target.to_string(), message)
                }
            };
            summary.record(report);
        }
        summary
    }
}

/// Removes the cache directory.
///
/// # Errors
///
/// Returns [`RunnerError::Cache`] when the directory exists but cannot be removed.
pub fn clean_cache(settings: &Settings) -> Result<(), RunnerError> {
    let path = &settings.cache_path;
    if !path.exists() {
        info!(path = %path.display(), "Cache is already empty");
        return Ok(());
    }
    std::fs::remove_dir_all(path).map_err(|e| RunnerError::Cache {
        path: path.display().to_string(),
        source: e,
    })?;
    info!(path = %path.display(), "Removed cache");
    Ok(())
}
