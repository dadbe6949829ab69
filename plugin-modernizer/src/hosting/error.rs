//! Hosting API error types.

/// Errors that can occur while talking to the hosting service.
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// GitHub API error.
    #[error("GitHub API error: {0}")]
    GitHubError(#[from] octocrab::Error),

    /// The API answered with something we cannot use.
    #[error("Unexpected response from {route}: {message}")]
    UnexpectedResponse { route: String, message: String },
}
