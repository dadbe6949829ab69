//! API and git credentials.

use super::ConfigError;
use std::fmt;
use std::path::{Path, PathBuf};

/// How git talks to the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitAuth {
    /// HTTPS with the API token embedded in the remote URL.
    Token,
    /// SSH with a private key; commits are signed with the same key.
    SshKey(PathBuf),
}

/// Credentials resolved once at startup.
#[derive(Clone)]
pub struct Credentials {
    token: Option<String>,
    git_auth: GitAuth,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("git_auth", &self.git_auth)
            .finish()
    }
}

impl Credentials {
    /// Creates credentials from an explicit token.
    ///
    /// Key-based git transport is selected when `ssh_key` exists on disk.
    #[must_use]
    pub fn new(token: Option<String>, ssh_key: &Path) -> Self {
        let token = token.filter(|t| !t.trim().is_empty());
        let git_auth = if ssh_key.is_file() {
            GitAuth::SshKey(ssh_key.to_path_buf())
        } else {
            GitAuth::Token
        };
        Self { token, git_auth }
    }

    /// Reads the token from `GH_TOKEN`, then `GITHUB_TOKEN`.
    #[must_use]
    pub fn from_env(ssh_key: &Path) -> Self {
        let token = ["GH_TOKEN", "GITHUB_TOKEN"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty());
        Self::new(token, ssh_key)
    }

    /// Returns the API token if one is configured.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Returns the API token.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingToken`] when no token is configured.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token().ok_or(ConfigError::MissingToken)
    }

    /// Returns the git transport mode.
    #[must_use]
    pub fn git_auth(&self) -> &GitAuth {
        &self.git_auth
    }
}
