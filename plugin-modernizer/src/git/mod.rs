//! Version-control seam.
//!
//! [`VersionControl`] is what the synchronizer needs from git; [`GitCli`]
//! implements it by shelling out to the `git` executable.

mod cli;
mod error;
mod transport;

pub use cli::GitCli;
pub use error::GitError;
pub use transport::Transport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Author and committer of generated commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

/// Paths reported by `git status`, relative to the repository root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    pub added: BTreeSet<String>,
    pub modified: BTreeSet<String>,
    pub removed: BTreeSet<String>,
    pub untracked: BTreeSet<String>,
}

impl WorkingTreeStatus {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.added.is_empty()
            && self.modified.is_empty()
            && self.removed.is_empty()
            && self.untracked.is_empty()
    }

    /// Every changed path, sorted.
    #[must_use]
    pub fn paths(&self) -> BTreeSet<String> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .chain(&self.untracked)
            .cloned()
            .collect()
    }

    /// Parses `git status --porcelain=v1` output.
    #[must_use]
    pub fn parse_porcelain(output: &str) -> Self {
        let mut status = Self::default();
        for line in output.lines() {
            if line.len() < 4 {
                continue;
            }
            let (code, rest) = line.split_at(2);
            let path = rest.trim_start();
            let path = match path.split_once(" -> ") {
                Some((_, renamed)) => renamed,
                None => path,
            };
            let path = path.trim_matches('"').to_string();

            let mut chars = code.chars();
            let index = chars.next().unwrap_or(' ');
            let worktree = chars.next().unwrap_or(' ');
            match (index, worktree) {
                ('?', '?') => status.untracked.insert(path),
                ('D', _) | (_, 'D') => status.removed.insert(path),
                ('A', _) | ('R', _) | ('C', _) => status.added.insert(path),
                _ => status.modified.insert(path),
            };
        }
        status
    }
}

/// Line counts of a diff.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    pub additions: u64,
    pub deletions: u64,
    pub changed_files: u64,
}

impl DiffStats {
    /// Parses `git diff --numstat` output. Binary files count as changed with no lines.
    #[must_use]
    pub fn parse_numstat(output: &str) -> Self {
        let mut stats = Self::default();
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            let mut fields = line.split('\t');
            let additions = fields.next().and_then(|v| v.parse::<u64>().ok());
            let deletions = fields.next().and_then(|v| v.parse::<u64>().ok());
            stats.additions += additions.unwrap_or(0);
            stats.deletions += deletions.unwrap_or(0);
            stats.changed_files += 1;
        }
        stats
    }
}

/// Git operations used by the synchronizer.
#[async_trait]
pub trait VersionControl: Send + Sync {
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), GitError>;

    async fn set_remote_url(&self, repo: &Path, remote: &str, url: &str) -> Result<(), GitError>;

    async fn fetch(&self, repo: &Path, remote: &str) -> Result<(), GitError>;

    /// Hard-resets the current branch to `target`.
    async fn reset_hard(&self, repo: &Path, target: &str) -> Result<(), GitError>;

    /// Removes untracked files and directories.
    async fn clean(&self, repo: &Path) -> Result<(), GitError>;

    async fn checkout(&self, repo: &Path, branch: &str) -> Result<(), GitError>;

    /// Checks out `branch`, creating or resetting it at `start_point`.
    async fn reset_branch(&self, repo: &Path, branch: &str, start_point: &str)
        -> Result<(), GitError>;

    async fn branch_exists(&self, repo: &Path, branch: &str) -> Result<bool, GitError>;

    /// Creates `branch` at the current commit and checks it out.
    async fn create_branch(&self, repo: &Path, branch: &str) -> Result<(), GitError>;

    async fn status(&self, repo: &Path) -> Result<WorkingTreeStatus, GitError>;

    /// Stages additions, modifications and deletions.
    async fn stage_all(&self, repo: &Path) -> Result<(), GitError>;

    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        author: &Signature,
        signing_key: Option<&Path>,
    ) -> Result<(), GitError>;

    /// Force-pushes `branch` and returns the remote's messages.
    async fn push(&self, repo: &Path, remote: &str, branch: &str) -> Result<String, GitError>;

    /// Diff statistics of `base..HEAD`, or of the working tree against the index.
    async fn diff_stats(&self, repo: &Path, base: Option<&str>) -> Result<DiffStats, GitError>;
}

/// Lines of `git push --porcelain` output reporting a failure.
///
/// Porcelain ref lines flagged `!` were rejected; `error:` lines (possibly
/// relayed as `remote: error:`) come from the server side. Everything else,
/// including the `To <url>` line and accepted refs, is ignored.
#[must_use]
pub fn push_failures(output: &str) -> Vec<&str> {
    output
        .lines()
        .map(str::trim_end)
        .filter(|line| {
            let message = line.strip_prefix("remote:").map_or(*line, str::trim_start);
            line.starts_with("!\t") || message.starts_with("error:") || message.starts_with("fatal:")
        })
        .collect()
}
