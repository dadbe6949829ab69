//! Fact collection through the rewrite metadata recipe.

use super::{ExtractError, FactExtractor, Facts, PreconditionError};
use crate::build::{rewrite_flags, rewrite_goal, BuildTool, MavenInvoker, FETCH_METADATA_RECIPE};
use crate::runtime::Jdk;
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

/// Report written by the metadata recipe, relative to the checkout.
pub const METADATA_REPORT: &str = "target/plugin-metadata.json";

/// Runs the metadata recipe and reads its report.
///
/// Checkouts with precondition errors are not built; their facts only carry
/// the errors so the driver can decide what to do.
#[derive(Debug, Clone)]
pub struct MavenFactExtractor<B = MavenInvoker> {
    build: B,
}

impl<B: BuildTool> MavenFactExtractor<B> {
    #[must_use]
    pub fn new(build: B) -> Self {
        Self { build }
    }
}

#[async_trait]
impl<B: BuildTool> FactExtractor for MavenFactExtractor<B> {
    async fn collect(&self, checkout: &Path, runtime: Jdk) -> Result<Facts, ExtractError> {
        let errors = PreconditionError::detect(checkout);
        if !errors.is_empty() {
            debug!(?errors, "Skipping metadata build");
            return Ok(Facts {
                errors,
                ..Facts::default()
            });
        }

        info!(jdk = runtime.major(), "Collecting plugin metadata");
        self.build
            .invoke(
                checkout,
                runtime,
                &rewrite_goal(),
                &rewrite_flags(FETCH_METADATA_RECIPE),
            )
            .await?;

        let report = checkout.join(METADATA_REPORT);
        if !report.is_file() {
            return Err(ExtractError::MissingOutput {
                path: report.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(&report).map_err(|e| ExtractError::Io {
            path: report.display().to_string(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| ExtractError::Json {
            path: report.display().to_string(),
            source: e,
        })
    }
}
