//! Recipe application.

use super::{rewrite_flags, rewrite_goal, BuildError, BuildTool, MavenInvoker};
use crate::config::Recipe;
use crate::git::{GitCli, GitError, VersionControl};
use crate::runtime::Jdk;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Errors from applying a recipe.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The working tree could not be inspected afterwards.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Applies a recipe to a checkout.
#[async_trait]
pub trait Transformer: Send + Sync {
    /// Runs `recipe` under `runtime` and returns the paths it changed.
    async fn apply(
        &self,
        checkout: &Path,
        recipe: &Recipe,
        runtime: Jdk,
    ) -> Result<Vec<String>, TransformError>;
}

/// Runs recipes through the rewrite Maven plugin.
#[derive(Debug, Clone)]
pub struct RewriteTransformer<B = MavenInvoker, G = GitCli> {
    build: B,
    git: G,
}

impl<B: BuildTool, G: VersionControl> RewriteTransformer<B, G> {
    #[must_use]
    pub fn new(build: B, git: G) -> Self {
        Self { build, git }
    }
}

#[async_trait]
impl<B: BuildTool, G: VersionControl> Transformer for RewriteTransformer<B, G> {
    async fn apply(
        &self,
        checkout: &Path,
        recipe: &Recipe,
        runtime: Jdk,
    ) -> Result<Vec<String>, TransformError> {
        info!(recipe = %recipe.id, jdk = runtime.major(), "Applying recipe");
        self.build
            .invoke(checkout, runtime, &rewrite_goal(), &rewrite_flags(&recipe.id))
            .await?;

        let changed = self.git.status(checkout).await?.paths();
        info!(changed = changed.len(), "Recipe applied");
        Ok(changed.into_iter().collect())
    }
}
