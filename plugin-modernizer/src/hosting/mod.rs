//! Hosting service seam.
//!
//! [`HostingApi`] lists the operations the synchronizer needs from the
//! hosting service. [`GitHubHost`] implements them over octocrab.

mod error;
mod github;
mod types;

pub use error::HostingError;
pub use github::GitHubHost;
pub use types::{
    Identity, IdentityKind, NewPullRequest, PullRequest, RemoteRepository, RepoCoordinates,
};

use async_trait::async_trait;

/// Operations against the hosting service.
#[async_trait]
pub trait HostingApi: Send + Sync {
    /// The authenticated account.
    async fn current_identity(&self) -> Result<Identity, HostingError>;

    /// Whether `owner` is an organization rather than a user.
    async fn is_organization(&self, owner: &str) -> Result<bool, HostingError>;

    /// Fetches a repository; `None` when it does not exist.
    async fn get_repository(
        &self,
        repo: &RepoCoordinates,
    ) -> Result<Option<RemoteRepository>, HostingError>;

    /// Forks `source` (default branch only) into `organization`, or the caller's account.
    async fn create_fork(
        &self,
        source: &RepoCoordinates,
        organization: Option<&str>,
    ) -> Result<RemoteRepository, HostingError>;

    /// Brings `branch` of a fork up to date with its upstream.
    async fn sync_fork(&self, fork: &RepoCoordinates, branch: &str) -> Result<(), HostingError>;

    async fn delete_repository(&self, repo: &RepoCoordinates) -> Result<(), HostingError>;

    /// Open pull requests, optionally filtered by `owner:branch` head and base branch.
    async fn list_open_pull_requests(
        &self,
        repo: &RepoCoordinates,
        head: Option<&str>,
        base: Option<&str>,
    ) -> Result<Vec<PullRequest>, HostingError>;

    async fn create_pull_request(
        &self,
        repo: &RepoCoordinates,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError>;

    async fn close_pull_request(
        &self,
        repo: &RepoCoordinates,
        number: u64,
    ) -> Result<(), HostingError>;

    async fn reopen_pull_request(
        &self,
        repo: &RepoCoordinates,
        number: u64,
    ) -> Result<(), HostingError>;

    async fn add_labels(
        &self,
        repo: &RepoCoordinates,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostingError>;
}
