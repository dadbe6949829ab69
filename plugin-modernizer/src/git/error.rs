//! Git error types.

/// Errors that can occur while running git.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// git could not be started.
    #[error("Failed to execute git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote rejected our credentials.
    #[error("Authentication failed for git {command}: {stderr}")]
    Authentication { command: String, stderr: String },

    /// git exited with an error.
    #[error("git {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// git output could not be understood.
    #[error("Unexpected output from git {command}: {message}")]
    UnexpectedOutput { command: String, message: String },
}

impl GitError {
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
