//! Canonical plugin catalog.
//!
//! The update center lists every published plugin with its source repository
//! and deprecation status. A separate document lists plugins whose maintainers
//! opted out of receiving automated pull requests.

use crate::config::Settings;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const USER_AGENT: &str = concat!("plugin-modernizer/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;
const UPDATE_CENTER_FILE: &str = "update-center.json";
const OPT_OUT_FILE: &str = "opt-out-plugins.json";

/// Errors that can occur while loading the catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to create HTTP client")]
    ClientInit(#[source] reqwest::Error),

    #[error("failed to fetch {operation} from {url}")]
    Request {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    ApiStatus {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {document}: {source}")]
    Json {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Read access to the plugin catalog.
pub trait PluginCatalog: Send + Sync {
    /// Whether the plugin is published at all.
    fn exists(&self, plugin: &str) -> bool;

    /// Repository name under the source organization.
    fn repository_name(&self, plugin: &str) -> Option<String>;

    /// Latest published version.
    fn version(&self, plugin: &str) -> Option<String>;

    fn is_deprecated(&self, plugin: &str) -> bool;

    /// Whether the maintainers opted out of automated pull requests.
    fn is_opted_out(&self, plugin: &str) -> bool;
}

#[derive(Debug, Default, Deserialize)]
struct UpdateCenterDocument {
    #[serde(default)]
    plugins: BTreeMap<String, PluginEntry>,
    #[serde(default)]
    deprecations: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct PluginEntry {
    #[serde(default)]
    scm: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OptOutDocument {
    #[serde(default)]
    opted_out_plugins: BTreeSet<String>,
}

/// Catalog backed by the update-center and opt-out documents.
#[derive(Debug, Clone, Default)]
pub struct UpdateCenter {
    plugins: BTreeMap<String, PluginEntry>,
    deprecated: BTreeSet<String>,
    opted_out: BTreeSet<String>,
}

impl UpdateCenter {
    /// Downloads both documents, falling back to the cached copies.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when a document can neither be downloaded nor
    /// read from the cache.
    pub async fn load(settings: &Settings) -> Result<Self, CatalogError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(CatalogError::ClientInit)?;

        let update_center = fetch_cached(
            &client,
            "update center",
            &settings.update_center_url,
            &settings.cache_path.join(UPDATE_CENTER_FILE),
        )
        .await?;
        let opt_out = fetch_cached(
            &client,
            "opt-out list",
            &settings.opt_out_plugins_url,
            &settings.cache_path.join(OPT_OUT_FILE),
        )
        .await?;

        let catalog = Self::from_documents(&update_center, &opt_out)?;
        info!(
            plugins = catalog.plugins.len(),
            deprecated = catalog.deprecated.len(),
            opted_out = catalog.opted_out.len(),
            "Loaded plugin catalog"
        );
        Ok(catalog)
    }

    /// Parses the two documents.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Json`] when either document is malformed.
    pub fn from_documents(update_center: &str, opt_out: &str) -> Result<Self, CatalogError> {
        let uc: UpdateCenterDocument =
            serde_json::from_str(update_center).map_err(|e| CatalogError::Json {
                document: "update center",
                source: e,
            })?;
        let opt_out: OptOutDocument =
            serde_json::from_str(opt_out).map_err(|e| CatalogError::Json {
                document: "opt-out list",
                source: e,
            })?;

        Ok(Self {
            plugins: uc.plugins,
            deprecated: uc.deprecations.into_keys().collect(),
            opted_out: opt_out.opted_out_plugins,
        })
    }
}

impl PluginCatalog for UpdateCenter {
    fn exists(&self, plugin: &str) -> bool {
        self.plugins.contains_key(plugin)
    }

    fn repository_name(&self, plugin: &str) -> Option<String> {
        let scm = self.plugins.get(plugin)?.scm.as_deref()?;
        repository_from_scm(scm)
    }

    fn version(&self, plugin: &str) -> Option<String> {
        self.plugins.get(plugin)?.version.clone()
    }

    fn is_deprecated(&self, plugin: &str) -> bool {
        self.deprecated.contains(plugin)
    }

    fn is_opted_out(&self, plugin: &str) -> bool {
        self.opted_out.contains(plugin)
    }
}

/// Last path segment of an SCM URL, without `.git`.
fn repository_from_scm(scm: &str) -> Option<String> {
    let segment = scm.trim_end_matches('/').rsplit('/').next()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    (!name.is_empty()).then(|| name.to_string())
}

async fn fetch_cached(
    client: &reqwest::Client,
    operation: &'static str,
    url: &str,
    cache: &Path,
) -> Result<String, CatalogError> {
    match download(client, operation, url).await {
        Ok(body) => {
            write_cache(cache, &body)?;
            debug!(url, path = %cache.display(), "Cached {operation}");
            Ok(body)
        }
        Err(err) if cache.is_file() => {
            warn!(url, error = %err, "Download failed, using cached {operation}");
            std::fs::read_to_string(cache).map_err(|e| CatalogError::Io {
                path: cache.display().to_string(),
                source: e,
            })
        }
        Err(err) => Err(err),
    }
}

async fn download(
    client: &reqwest::Client,
    operation: &'static str,
    url: &str,
) -> Result<String, CatalogError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| CatalogError::Request {
            operation,
            url: url.to_string(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(CatalogError::ApiStatus {
            status: response.status(),
            url: url.to_string(),
        });
    }

    response.text().await.map_err(|source| CatalogError::Request {
        operation,
        url: url.to_string(),
        source,
    })
}

fn write_cache(path: &Path, body: &str) -> Result<(), CatalogError> {
    let io_error = |e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    std::fs::write(path, body).map_err(io_error)
}

/// Cache files written by [`UpdateCenter::load`].
#[must_use]
pub fn cache_files(settings: &Settings) -> [PathBuf; 2] {
    [
        settings.cache_path.join(UPDATE_CENTER_FILE),
        settings.cache_path.join(OPT_OUT_FILE),
    ]
}
