//! Per-repository progress flags.

/// Progress of one repository kind through the publication protocol.
///
/// Setters are idempotent; calling `with_commits` twice leaves the flag set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressFlags {
    commits: bool,
    changes_pushed: bool,
    pull_request: bool,
}

impl ProgressFlags {
    #[must_use]
    pub fn has_commits(&self) -> bool {
        self.commits
    }

    #[must_use]
    pub fn has_changes_pushed(&self) -> bool {
        self.changes_pushed
    }

    #[must_use]
    pub fn has_pull_request(&self) -> bool {
        self.pull_request
    }

    pub fn with_commits(&mut self) {
        self.commits = true;
    }

    pub fn without_commits(&mut self) {
        self.commits = false;
    }

    pub fn with_changes_pushed(&mut self) {
        self.changes_pushed = true;
    }

    pub fn without_changes_pushed(&mut self) {
        self.changes_pushed = false;
    }

    pub fn with_pull_request(&mut self) {
        self.pull_request = true;
    }
}
