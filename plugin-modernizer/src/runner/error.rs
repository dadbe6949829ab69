//! Runner error types.

/// Errors that abort a run before any plugin is processed.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration, credential and recipe errors.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// GitHub API client initialization errors.
    #[error(transparent)]
    Hosting(#[from] crate::hosting::HostingError),

    /// The build tool is not usable.
    #[error(transparent)]
    Build(#[from] crate::build::BuildError),

    /// The plugin catalog could not be loaded.
    #[error(transparent)]
    Catalog(#[from] crate::catalog::CatalogError),

    /// The cache directory could not be removed.
    #[error("Failed to remove cache '{path}': {source}")]
    Cache {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
