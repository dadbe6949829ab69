//! Configuration error types.

use thiserror::Error;

/// Errors that abort a run before any plugin is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a file.
    #[error("Failed to read file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML content.
    #[error("Failed to parse '{path}': {source}")]
    TomlError {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// Validation error in a configuration or recipe file.
    #[error("Validation error in '{path}': {message}")]
    ValidationError { path: String, message: String },

    /// Missing required file.
    #[error("Missing required file: {path}")]
    MissingFile { path: String },

    /// No API token in the environment.
    #[error("Please set GH_TOKEN or GITHUB_TOKEN environment variable")]
    MissingToken,

    /// The fork owner could not be determined.
    #[error("GitHub owner is not set. Set GH_OWNER or GITHUB_OWNER, or pass --github-owner")]
    MissingOwner,

    /// The requested recipe is not in the catalogue.
    #[error("Unknown recipe '{0}'. Use the `recipes` command to list available recipes")]
    UnknownRecipe(String),
}
