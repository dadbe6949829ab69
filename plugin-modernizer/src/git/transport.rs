//! Remote URLs per credential mode.

use crate::config::{Credentials, GitAuth};
use crate::hosting::RemoteRepository;
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// How git reaches the hosting service.
#[derive(Clone, PartialEq, Eq)]
pub enum Transport {
    /// HTTPS, authenticated with the API token when one is present.
    Https { token: Option<String> },
    /// SSH with a private key.
    Ssh { private_key: PathBuf },
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Https { token } => f
                .debug_struct("Https")
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::Ssh { private_key } => f
                .debug_struct("Ssh")
                .field("private_key", private_key)
                .finish(),
        }
    }
}

impl Transport {
    /// Primary transport for the configured credentials.
    #[must_use]
    pub fn from_credentials(credentials: &Credentials) -> Self {
        match credentials.git_auth() {
            GitAuth::SshKey(key) => Self::Ssh {
                private_key: key.clone(),
            },
            GitAuth::Token => Self::https(credentials),
        }
    }

    #[must_use]
    pub fn https(credentials: &Credentials) -> Self {
        Self::Https {
            token: credentials.token().map(str::to_string),
        }
    }

    /// Transport to retry with after an authentication failure.
    #[must_use]
    pub fn fallback(&self, credentials: &Credentials) -> Option<Transport> {
        match self {
            Self::Ssh { .. } => Some(Self::https(credentials)),
            Self::Https { .. } => None,
        }
    }

    /// Key used to sign commits, when key-based auth is active.
    #[must_use]
    pub fn signing_key(&self) -> Option<&Path> {
        match self {
            Self::Ssh { private_key } => Some(private_key),
            Self::Https { .. } => None,
        }
    }

    /// URL git should use for `repo`.
    #[must_use]
    pub fn remote_url(&self, repo: &RemoteRepository) -> String {
        match self {
            Self::Ssh { .. } => repo.ssh_url.clone(),
            Self::Https { token: None } => repo.clone_url.clone(),
            Self::Https { token: Some(token) } => match Url::parse(&repo.clone_url) {
                Ok(mut url) => {
                    if url.set_username("x-access-token").is_err()
                        || url.set_password(Some(token)).is_err()
                    {
                        return repo.clone_url.clone();
                    }
                    url.to_string()
                }
                Err(_) => repo.clone_url.clone(),
            },
        }
    }
}
