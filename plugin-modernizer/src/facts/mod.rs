//! Facts about a plugin checkout and how they are collected.
//!
//! Facts drive runtime selection and tell the driver whether a plugin can be
//! transformed at all. Structural problems are reported as
//! [`PreconditionError`]s, some of which can be fixed in place.

mod cache;
mod error;
mod maven;
pub mod pom;

pub use cache::FactsCache;
pub use error::ExtractError;
pub use maven::MavenFactExtractor;

use crate::runtime::Jdk;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// What is known about a plugin after extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facts {
    #[serde(default)]
    pub plugin_name: Option<String>,

    /// JDKs the plugin declares it builds with.
    #[serde(default)]
    pub jdks: BTreeSet<Jdk>,

    /// Core version the plugin depends on.
    #[serde(default)]
    pub jenkins_version: Option<String>,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    #[serde(default)]
    pub errors: BTreeSet<PreconditionError>,
}

impl Facts {
    /// Whether the formatter goal should run before verification.
    #[must_use]
    pub fn formatter_enabled(&self) -> bool {
        self.properties
            .get("spotless.check.skip")
            .is_some_and(|v| v == "false")
    }

    /// True when the declared JDKs could not be parsed and only the implicit one is known.
    #[must_use]
    pub fn only_implicit_runtime(&self) -> bool {
        self.jdks.iter().all(|jdk| *jdk == Jdk::IMPLICIT)
    }

    #[must_use]
    pub fn platform_baseline(&self) -> Option<&str> {
        self.properties.get("jenkins.baseline").map(String::as_str)
    }
}

/// Collects facts from a checkout.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Collects facts, running the build tool under `runtime` when needed.
    async fn collect(&self, checkout: &Path, runtime: Jdk) -> Result<Facts, ExtractError>;
}

/// Structural reasons a plugin cannot be transformed yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreconditionError {
    /// No `pom.xml` at the build root.
    NoPom,
    /// Repositories declared over plain HTTP, rejected by Maven 3.8.1+.
    MavenRepositoriesHttp,
    /// `<parent>` without `<relativePath>`, making Maven look for the parent on disk.
    MissingRelativePath,
}

static HTTP_REPOSITORY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:pluginRepository|repository)>\s*(?:<[^>]+>[^<]*</[^>]+>\s*)*?<url>\s*http://").ok());

static JENKINS_HTTP_URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"<url>(\s*)http://repo\.jenkins-ci\.org").ok());

static PARENT_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)<parent>.*?</parent>").ok());

impl PreconditionError {
    #[must_use]
    pub fn all() -> [PreconditionError; 3] {
        [
            Self::NoPom,
            Self::MavenRepositoriesHttp,
            Self::MissingRelativePath,
        ]
    }

    /// Human readable reason.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::NoPom => "No pom file found",
            Self::MavenRepositoriesHttp => {
                "Found non-https repository URL in pom file preventing maven older than 3.8.1"
            }
            Self::MissingRelativePath => {
                "Missing relative path in pom file preventing parent download"
            }
        }
    }

    /// Whether this problem is present in the given descriptor text (`None` = no pom).
    #[must_use]
    pub fn is_present(&self, pom: Option<&str>) -> bool {
        match (self, pom) {
            (Self::NoPom, pom) => pom.is_none(),
            (_, None) => false,
            (Self::MavenRepositoriesHttp, Some(text)) => HTTP_REPOSITORY
                .as_ref()
                .is_some_and(|re| re.is_match(text)),
            (Self::MissingRelativePath, Some(text)) => PARENT_BLOCK
                .as_ref()
                .and_then(|re| re.find(text))
                .is_some_and(|parent| !parent.as_str().contains("<relativePath")),
        }
    }

    /// All problems present in a checkout.
    #[must_use]
    pub fn detect(checkout: &Path) -> BTreeSet<PreconditionError> {
        let pom = std::fs::read_to_string(checkout.join(pom::POM_FILE)).ok();
        Self::all()
            .into_iter()
            .filter(|error| error.is_present(pom.as_deref()))
            .collect()
    }

    /// Tries to fix the problem in place. Returns true when it is gone afterwards.
    #[must_use]
    pub fn remediate(&self, checkout: &Path) -> bool {
        let path = checkout.join(pom::POM_FILE);
        let Ok(text) = std::fs::read_to_string(&path) else {
            return false;
        };

        let fixed = match self {
            Self::NoPom => return false,
            Self::MavenRepositoriesHttp => JENKINS_HTTP_URL
                .as_ref()
                .map(|re| re.replace_all(&text, "<url>${1}https://repo.jenkins-ci.org").into_owned()),
            Self::MissingRelativePath => Some(text.replacen("</parent>", "  <relativePath />\n  </parent>", 1)),
        };

        let Some(fixed) = fixed else {
            return false;
        };
        if fixed == text || self.is_present(Some(&fixed)) {
            debug!(error = ?self, "Remediation did not resolve precondition");
            return false;
        }
        std::fs::write(&path, fixed).is_ok()
    }
}
