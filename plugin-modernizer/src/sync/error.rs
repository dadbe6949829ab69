//! Synchronization error types.

use crate::git::GitError;
use crate::hosting::HostingError;
use crate::templates::TemplateError;

/// Errors raised by a synchronization step.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The source repository does not exist on the hosting service.
    #[error("Repository {repo} not found")]
    RepositoryNotFound { repo: String },

    /// The plugin's repository name was never resolved.
    #[error("Repository name of plugin {plugin} is not resolved")]
    MissingRepositoryName { plugin: String },

    /// An existing fork belongs to another upstream.
    #[error(
        "Repository {fork} is not forked from {expected} but from {actual}. Please remove forks if changing the source repo"
    )]
    ForeignFork {
        fork: String,
        expected: String,
        actual: String,
    },

    /// The checkout has no remote default branch to reset to.
    #[error(
        "Unable to find branch {branch} in repository. Probably the default branch was renamed. You can remove the local repository at {path} and try again."
    )]
    MissingDefaultBranch { branch: String, path: String },

    /// The remote reported an error while accepting the push.
    #[error("Unexpected push error: {messages}")]
    PushRejected { messages: String },

    #[error("Failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
