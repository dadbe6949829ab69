//! Hosting value types.

use std::fmt;

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoCoordinates {
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Parses `owner/name`.
    #[must_use]
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.split_once('/')?;
        (!owner.is_empty() && !name.is_empty() && !name.contains('/'))
            .then(|| Self::new(owner, name))
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Case-insensitive comparison, as the hosting service treats names.
    #[must_use]
    pub fn same_as(&self, other: &RepoCoordinates) -> bool {
        self.owner.eq_ignore_ascii_case(&other.owner) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository as reported by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub coordinates: RepoCoordinates,
    pub default_branch: String,
    pub archived: bool,
    /// Whether this repository is itself a fork.
    pub fork: bool,
    /// Repository this one was forked from.
    pub parent: Option<RepoCoordinates>,
    pub clone_url: String,
    pub ssh_url: String,
    pub html_url: String,
}

/// An open pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    /// Branch name of the head.
    pub head_ref: String,
    /// Repository the head branch lives in.
    pub head_repository: Option<RepoCoordinates>,
}

/// Parameters of a pull request to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    /// `owner:branch`.
    pub head: String,
    pub base: String,
    pub body: String,
    pub draft: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    User,
    Bot,
    /// The built-in GitHub Actions bot.
    Actions,
}

/// The authenticated account, used as commit author.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub login: String,
    pub id: u64,
    pub name: Option<String>,
    pub kind: IdentityKind,
}

pub const ACTIONS_LOGIN: &str = "github-actions[bot]";
pub const ACTIONS_ID: u64 = 41_898_282;

impl Identity {
    /// Identity used when running inside GitHub Actions.
    #[must_use]
    pub fn github_actions() -> Self {
        Self {
            login: ACTIONS_LOGIN.to_string(),
            id: ACTIONS_ID,
            name: Some(ACTIONS_LOGIN.to_string()),
            kind: IdentityKind::Actions,
        }
    }

    /// Display name for commits; the login when no name is set.
    #[must_use]
    pub fn author_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.login)
    }

    /// No-reply address attributing commits to this account.
    #[must_use]
    pub fn commit_email(&self) -> String {
        match self.kind {
            IdentityKind::User => format!("{}@users.noreply.github.com", self.login),
            IdentityKind::Bot | IdentityKind::Actions => {
                format!("{}+{}@users.noreply.github.com", self.id, self.login)
            }
        }
    }
}
