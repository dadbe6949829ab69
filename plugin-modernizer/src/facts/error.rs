//! Fact extraction error types.

use crate::build::BuildError;

/// Errors that can occur while collecting or caching facts.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    /// The build tool failed to run the collection goal.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The collection goal succeeded but produced no report.
    #[error("Metadata report not found at '{path}'")]
    MissingOutput { path: String },

    /// Failed to read or write a facts file.
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A facts file is not valid JSON.
    #[error("Failed to parse facts in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
