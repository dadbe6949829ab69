//! Build tool and transformation engine seams.

mod error;
mod maven;
mod transform;

pub use error::BuildError;
pub use maven::MavenInvoker;
pub use transform::{RewriteTransformer, TransformError, Transformer};

use crate::runtime::Jdk;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;

/// OpenRewrite Maven plugin used for both transformation and fact collection.
pub const REWRITE_PLUGIN: &str = "org.openrewrite.maven:rewrite-maven-plugin:6.18.0";

/// Artifact providing the modernization recipes.
pub const RECIPE_ARTIFACT: &str = "io.jenkins.plugin-modernizer:plugin-modernizer-core:RELEASE";

/// Recipe that writes `target/plugin-metadata.json`.
pub const FETCH_METADATA_RECIPE: &str =
    "io.jenkins.tools.pluginmodernizer.core.recipes.FetchMetadata";

/// Well-known build invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Clean,
    Compile,
    Verify,
    /// `verify` without tests or enforcer, to produce classes on stale plugins.
    QuickBuild,
    /// Spotless formatting.
    Format,
}

impl Goal {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Compile => "compile",
            Self::Verify | Self::QuickBuild => "verify",
            Self::Format => "spotless:apply",
        }
    }

    #[must_use]
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            Self::Clean | Self::Verify | Self::Format => &[],
            Self::Compile => &["-Dhpi.validate.skip=true", "-Dmaven.antrun.skip=true"],
            Self::QuickBuild => &[
                "-DskipTests",
                "-Pquick-build",
                "-Denforcer.skip=true",
                "-Dhpi.validate.skip=true",
                "-Dmaven.antrun.skip=true",
            ],
        }
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QuickBuild => f.write_str("quick build"),
            other => f.write_str(other.name()),
        }
    }
}

/// Runs build goals in a checkout.
#[async_trait]
pub trait BuildTool: Send + Sync {
    /// Runs `goal` with extra `flags` under the given JDK.
    async fn invoke(
        &self,
        checkout: &Path,
        runtime: Jdk,
        goal: &str,
        flags: &[String],
    ) -> Result<(), BuildError>;

    /// Runs one of the well-known goals.
    async fn run(&self, checkout: &Path, runtime: Jdk, goal: Goal) -> Result<(), BuildError> {
        let flags: Vec<String> = goal.flags().iter().map(|f| (*f).to_string()).collect();
        self.invoke(checkout, runtime, goal.name(), &flags).await
    }
}

/// Flags activating a rewrite recipe.
#[must_use]
pub fn rewrite_flags(recipe_id: &str) -> Vec<String> {
    vec![
        format!("-Drewrite.activeRecipes={recipe_id}"),
        format!("-Drewrite.recipeArtifactCoordinates={RECIPE_ARTIFACT}"),
        "-Drewrite.exportDatatables=true".to_string(),
    ]
}

/// Goal running the rewrite plugin.
#[must_use]
pub fn rewrite_goal() -> String {
    format!("{REWRITE_PLUGIN}:run")
}
