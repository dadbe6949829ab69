//! Fork, fetch, commit, push and pull request protocol.
//!
//! [`HostSync`] drives one repository kind of one unit through
//! fork → sync → fetch → branch → commit → push → pull request. Each step
//! checks the run mode first: dry-run and metadata-only runs never touch the
//! hosting service for writes, local units are never fetched or committed.
//! Steps only communicate through the unit's [`ProgressFlags`].
//!
//! [`ProgressFlags`]: crate::work_item::ProgressFlags

mod error;

pub use error::SyncError;

use crate::config::{Credentials, DuplicatePrStrategy, Settings};
use crate::git::{self, DiffStats, GitError, Signature, Transport, VersionControl};
use crate::hosting::{HostingApi, Identity, NewPullRequest, RemoteRepository, RepoCoordinates};
use crate::repo_kind::{RecipeText, RepoKind};
use crate::work_item::WorkItem;
use std::path::Path;
use tracing::{debug, info, info_span, warn, Instrument};

/// Branch name used by early versions of the tool; its pull requests are closed.
pub const LEGACY_BRANCH: &str = "plugin-modernizer-tool";

/// Tags that may become pull request labels.
pub const ALLOWED_LABELS: [&str; 3] = ["chore", "dependencies", "developer"];

const ORIGIN: &str = "origin";

/// Synchronizes local checkouts with the hosting service.
pub struct HostSync<'a> {
    host: &'a dyn HostingApi,
    git: &'a dyn VersionControl,
    settings: &'a Settings,
    credentials: &'a Credentials,
    transport: Transport,
    owner: String,
    identity: Identity,
    text: RecipeText<'a>,
}

impl<'a> HostSync<'a> {
    /// `owner` is the account or organization receiving forks.
    #[must_use]
    pub fn new(
        host: &'a dyn HostingApi,
        git: &'a dyn VersionControl,
        settings: &'a Settings,
        credentials: &'a Credentials,
        owner: impl Into<String>,
        identity: Identity,
        text: RecipeText<'a>,
    ) -> Self {
        Self {
            host,
            git,
            settings,
            credentials,
            transport: Transport::from_credentials(credentials),
            owner: owner.into(),
            identity,
            text,
        }
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        self.settings
    }

    #[must_use]
    pub fn text(&self) -> RecipeText<'a> {
        self.text
    }

    /// Source repository of `kind`.
    ///
    /// # Errors
    ///
    /// Fails when the name is unresolved, the repository is missing or the API fails.
    pub async fn remote_repository(
        &self,
        item: &WorkItem,
        kind: RepoKind,
    ) -> Result<RemoteRepository, SyncError> {
        let coordinates = self.source_coordinates(item, kind)?;
        self.host
            .get_repository(&coordinates)
            .await?
            .ok_or_else(|| SyncError::RepositoryNotFound {
                repo: coordinates.full_name(),
            })
    }

    fn source_coordinates(
        &self,
        item: &WorkItem,
        kind: RepoKind,
    ) -> Result<RepoCoordinates, SyncError> {
        kind.behavior()
            .remote(item, self.settings)
            .ok_or_else(|| SyncError::MissingRepositoryName {
                plugin: item.name().to_string(),
            })
    }

    /// Where the fork of `kind` lives (or would live).
    ///
    /// # Errors
    ///
    /// Fails when the repository name is not resolved yet.
    pub fn fork_coordinates(
        &self,
        item: &WorkItem,
        kind: RepoKind,
    ) -> Result<RepoCoordinates, SyncError> {
        let source = self.source_coordinates(item, kind)?;
        Ok(RepoCoordinates::new(&self.owner, source.name))
    }

    /// # Errors
    ///
    /// Fails when the hosting service cannot be queried.
    pub async fn is_forked(&self, item: &WorkItem, kind: RepoKind) -> Result<bool, SyncError> {
        if item.is_local() {
            return Ok(false);
        }
        let fork = self.fork_coordinates(item, kind)?;
        Ok(self.host.get_repository(&fork).await?.is_some())
    }

    /// Whether the plugin repository is archived. Cached on the unit.
    ///
    /// # Errors
    ///
    /// Fails when the repository cannot be read.
    pub async fn is_archived(&self, item: &mut WorkItem) -> Result<bool, SyncError> {
        if item.is_local() {
            return Ok(false);
        }
        if let Some(archived) = item.archived() {
            return Ok(archived);
        }
        let archived = self
            .remote_repository(item, RepoKind::Primary)
            .await?
            .archived;
        item.set_archived(archived);
        Ok(archived)
    }

    /// Forks the source repository of `kind` and points `origin` at the fork.
    ///
    /// An existing fork is reused after checking it was forked from the source.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ForeignFork`] for a fork of another upstream.
    pub async fn fork(&self, item: &mut WorkItem, kind: RepoKind) -> Result<(), SyncError> {
        let label = kind.behavior().label();
        if self.settings.dry_run {
            info!(plugin = item.name(), kind = label, "Skipping fork in dry-run mode");
            return Ok(());
        }
        if self.settings.metadata_only {
            info!(plugin = item.name(), kind = label, "Skipping fork in fetch-metadata-only mode");
            return Ok(());
        }
        if self.is_archived(item).await? {
            info!(plugin = item.name(), kind = label, "Plugin is archived. Not forking");
            return Ok(());
        }

        let source = self.remote_repository(item, kind).await?;
        let fork_coordinates = self.fork_coordinates(item, kind)?;
        info!(plugin = item.name(), kind = label, repo = %source.coordinates, "Forking repository");

        let fork = match self.host.get_repository(&fork_coordinates).await? {
            Some(existing) => {
                debug!(fork = %existing.coordinates, "Repository already forked");
                check_parent(&existing, &source)?;
                existing
            }
            None => {
                let organization = self
                    .host
                    .is_organization(&self.owner)
                    .await?
                    .then_some(self.owner.as_str());
                let fork = self
                    .host
                    .create_fork(&source.coordinates, organization)
                    .await?;
                info!(fork = %fork.coordinates, "Created fork");
                if !self.settings.fork_settle_delay.is_zero() {
                    tokio::time::sleep(self.settings.fork_settle_delay).await;
                }
                fork
            }
        };

        let path = kind.behavior().local_path(item);
        self.git
            .set_remote_url(&path, ORIGIN, &self.transport.remote_url(&fork))
            .await?;
        debug!(fork = %fork.html_url, "Changed remote URL to forked repository");
        Ok(())
    }

    /// Refreshes the fork's default branch from upstream.
    ///
    /// # Errors
    ///
    /// Fails when the hosting service rejects the sync.
    pub async fn sync(&self, item: &WorkItem, kind: RepoKind) -> Result<(), SyncError> {
        let label = kind.behavior().label();
        if item.is_local() || self.settings.dry_run || self.settings.metadata_only {
            debug!(plugin = item.name(), kind = label, "Not syncing fork");
            return Ok(());
        }
        let fork_coordinates = self.fork_coordinates(item, kind)?;
        let Some(fork) = self.host.get_repository(&fork_coordinates).await? else {
            info!(plugin = item.name(), kind = label, "Repository is not forked. Not syncing");
            return Ok(());
        };
        self.host
            .sync_fork(&fork.coordinates, &fork.default_branch)
            .await?;
        info!(plugin = item.name(), kind = label, fork = %fork.coordinates, "Synced fork");
        Ok(())
    }

    /// Deletes the plugin fork when nothing depends on it anymore.
    ///
    /// Refuses for local units, dry runs, missing forks, repositories that are
    /// not forks, repositories of the source organization and forks with open
    /// pull requests.
    ///
    /// # Errors
    ///
    /// Fails when the hosting service cannot be queried or refuses the deletion.
    pub async fn delete_fork(&self, item: &mut WorkItem) -> Result<(), SyncError> {
        if item.is_local() || self.settings.dry_run || self.settings.metadata_only {
            debug!(plugin = item.name(), "Not deleting fork");
            return Ok(());
        }
        let fork_coordinates = self.fork_coordinates(item, RepoKind::Primary)?;
        let Some(fork) = self.host.get_repository(&fork_coordinates).await? else {
            info!(plugin = item.name(), "Plugin is not forked. Not attempting delete");
            return Ok(());
        };
        if !fork.fork {
            warn!(repo = %fork.html_url, "Repository is not a fork. Not attempting delete");
            return Ok(());
        }
        if fork
            .coordinates
            .owner
            .eq_ignore_ascii_case(&self.settings.source_organization)
        {
            warn!(repo = %fork.html_url, "Not attempting to delete fork from source organization");
            return Ok(());
        }
        if self.has_open_pull_request_from(item, &fork.coordinates).await? {
            warn!(plugin = item.name(), "Fork has open pull requests. Not deleting");
            return Ok(());
        }

        info!(plugin = item.name(), fork = %fork.coordinates, "Deleting fork");
        self.host.delete_repository(&fork.coordinates).await?;
        let progress = item.primary_progress_mut();
        progress.without_commits();
        progress.without_changes_pushed();
        Ok(())
    }

    async fn has_open_pull_request_from(
        &self,
        item: &WorkItem,
        fork: &RepoCoordinates,
    ) -> Result<bool, SyncError> {
        let source = self.source_coordinates(item, RepoKind::Primary)?;
        let pulls = self
            .host
            .list_open_pull_requests(&source, None, None)
            .await?;
        Ok(pulls.iter().any(|pr| {
            debug!(pull_request = %pr.html_url, "Checking pull request");
            pr.head_repository
                .as_ref()
                .is_some_and(|head| head.same_as(fork))
        }))
    }

    /// Brings the local checkout to the tip of the source default branch.
    ///
    /// Always reads from the source repository, never the fork. An existing
    /// checkout is reset and cleaned, discarding any local drift.
    ///
    /// # Errors
    ///
    /// Fails on git errors, after the fallback transport for clones.
    pub async fn fetch(&self, item: &WorkItem, kind: RepoKind) -> Result<(), SyncError> {
        let behavior = kind.behavior();
        let label = behavior.label();
        if item.is_local() {
            info!(plugin = item.name(), kind = label, "Plugin is local. Not fetching");
            return Ok(());
        }

        let repository = self.remote_repository(item, kind).await?;
        let path = behavior.local_path(item);
        let name = behavior.display_name(item, self.settings);
        let span = info_span!("fetch", kind = label, repo = %repository.coordinates);

        async {
            info!(name = %name, path = %path.display(), "Fetching repository");
            if path.is_dir() {
                self.refresh(&path, &repository).await
            } else {
                self.clone_into(&path, &repository).await
            }
        }
        .instrument(span)
        .await
    }

    async fn refresh(&self, path: &Path, repository: &RemoteRepository) -> Result<(), SyncError> {
        let branch = &repository.default_branch;
        let upstream = format!("{ORIGIN}/{branch}");

        self.git
            .set_remote_url(path, ORIGIN, &self.transport.remote_url(repository))
            .await?;
        self.git.fetch(path, ORIGIN).await?;
        self.git
            .reset_hard(path, &upstream)
            .await
            .map_err(|e| missing_branch(e, branch, path))?;
        self.git.clean(path).await?;
        self.git.reset_branch(path, branch, &upstream).await?;
        info!(branch = %branch, "Fetched repository");
        Ok(())
    }

    async fn clone_into(&self, path: &Path, repository: &RemoteRepository) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let url = self.transport.remote_url(repository);
        match self.git.clone_repository(&url, path).await {
            Ok(()) => {}
            Err(e) if e.is_authentication() => {
                let Some(fallback) = self.transport.fallback(self.credentials) else {
                    return Err(e.into());
                };
                warn!(error = %e, "Authentication failed. Retrying with HTTPS");
                self.git
                    .clone_repository(&fallback.remote_url(repository), path)
                    .await?;
            }
            Err(e) => return Err(e.into()),
        }
        debug!(path = %path.display(), "Cloned repository");
        Ok(())
    }

    /// Checks out the working branch of `kind`, resetting an existing one to the default branch.
    ///
    /// # Errors
    ///
    /// Fails on rendering or git errors.
    pub async fn checkout_branch(&self, item: &WorkItem, kind: RepoKind) -> Result<(), SyncError> {
        let behavior = kind.behavior();
        if item.is_local() {
            info!(plugin = item.name(), kind = behavior.label(), "Plugin is local. Not checking out branch");
            return Ok(());
        }
        let branch = behavior.branch_name(item, self.text)?;
        let path = behavior.local_path(item);

        if self.git.branch_exists(&path, &branch).await? {
            let repository = self.remote_repository(item, kind).await?;
            debug!(branch = %branch, "Branch already exists. Resetting it");
            self.git.checkout(&path, &branch).await?;
            self.git
                .reset_hard(&path, &repository.default_branch)
                .await?;
        } else {
            self.git.create_branch(&path, &branch).await?;
        }
        debug!(branch = %branch, kind = behavior.label(), "Checked out branch");
        Ok(())
    }

    /// Commits every pending change of `kind`.
    ///
    /// Local units and dry runs only record the changed paths of the plugin
    /// checkout on the unit. A clean tree is not an error.
    ///
    /// # Errors
    ///
    /// Fails on rendering or git errors.
    pub async fn commit(&self, item: &mut WorkItem, kind: RepoKind) -> Result<(), SyncError> {
        let behavior = kind.behavior();
        let label = behavior.label();
        let path = behavior.local_path(item);

        if (item.is_local() || self.settings.dry_run) && kind == RepoKind::Primary {
            let status = self.git.status(&path).await?;
            debug!(files = ?status.paths(), "Collected working tree changes");
            item.add_modified_files(status.paths());
        }
        if item.is_local() {
            info!(plugin = item.name(), kind = label, "Plugin is local. Not committing changes");
            return Ok(());
        }
        if self.settings.dry_run {
            info!(plugin = item.name(), kind = label, "Skipping commit in dry-run mode");
            return Ok(());
        }
        if self.is_archived(item).await? {
            info!(plugin = item.name(), kind = label, "Plugin is archived. Not committing changes");
            return Ok(());
        }

        let message = behavior.commit_message(item, self.text)?;
        let status = self.git.status(&path).await?;
        if status.is_clean() {
            debug!(plugin = item.name(), kind = label, "No changes to commit");
            return Ok(());
        }

        self.git.stage_all(&path).await?;
        if kind == RepoKind::Primary {
            item.add_modified_files(status.paths());
        }
        let author = Signature {
            name: self.identity.author_name().to_string(),
            email: self.identity.commit_email(),
        };
        self.git
            .commit(&path, &message, &author, self.transport.signing_key())
            .await?;
        behavior.progress_mut(item).with_commits();
        debug!(plugin = item.name(), kind = label, "Changes committed");
        Ok(())
    }

    /// Force-pushes the working branch of `kind` to the fork.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PushRejected`] when the remote reports an error.
    pub async fn push(&self, item: &mut WorkItem, kind: RepoKind) -> Result<(), SyncError> {
        let behavior = kind.behavior();
        let label = behavior.label();
        if self.settings.dry_run || self.settings.metadata_only {
            info!(plugin = item.name(), kind = label, "Skipping push");
            return Ok(());
        }
        if !behavior.progress(item).has_commits() {
            info!(plugin = item.name(), kind = label, "No commits to push");
            return Ok(());
        }
        if self.is_archived(item).await? {
            info!(plugin = item.name(), kind = label, "Plugin is archived. Not pushing changes");
            return Ok(());
        }

        let branch = behavior.branch_name(item, self.text)?;
        let path = behavior.local_path(item);
        let span = info_span!("push", kind = label, branch = %branch);
        let messages = async { self.git.push(&path, ORIGIN, &branch).await }
            .instrument(span)
            .await?;
        debug!(messages = %messages.trim(), "Push result");
        let failures = git::push_failures(&messages);
        if !failures.is_empty() {
            return Err(SyncError::PushRejected {
                messages: failures.join("\n"),
            });
        }

        let progress = behavior.progress_mut(item);
        progress.without_commits();
        progress.with_changes_pushed();
        info!(plugin = item.name(), kind = label, "Pushed changes to forked repository");
        Ok(())
    }

    /// Opens a pull request for the pushed branch of `kind`.
    ///
    /// An open pull request with the same head and base is handled according to
    /// the configured [`DuplicatePrStrategy`].
    ///
    /// # Errors
    ///
    /// Fails when rendering fails or the pull request cannot be created.
    pub async fn open_pull_request(
        &self,
        item: &mut WorkItem,
        kind: RepoKind,
    ) -> Result<(), SyncError> {
        let behavior = kind.behavior();
        let label = behavior.label();

        let title = behavior.pr_title(item, self.text)?;
        let body = behavior.pr_body(item, self.text)?;
        debug!(title = %title, draft = self.settings.draft, "Pull request");
        debug!(body = %body, "Pull request body");

        if self.settings.dry_run || self.settings.metadata_only {
            info!(plugin = item.name(), kind = label, "Skipping pull request");
            return Ok(());
        }
        if !behavior.progress(item).has_changes_pushed() {
            info!(plugin = item.name(), kind = label, "No changes pushed. Not opening pull request");
            return Ok(());
        }
        if self.is_archived(item).await? {
            info!(plugin = item.name(), kind = label, "Plugin is archived. Not opening pull request");
            return Ok(());
        }

        let repository = self.remote_repository(item, kind).await?;
        let branch = behavior.branch_name(item, self.text)?;
        let head = format!("{}:{branch}", self.owner);
        let base = repository.default_branch.clone();

        let existing = match self
            .host
            .list_open_pull_requests(&repository.coordinates, Some(&head), Some(&base))
            .await
        {
            Ok(pulls) => pulls.into_iter().next(),
            Err(e) => {
                warn!(error = %e, "Failed to find existing pull request");
                None
            }
        };

        let mut replaced = None;
        if let Some(existing) = existing {
            match self.settings.duplicate_pr_strategy {
                DuplicatePrStrategy::Skip => {
                    info!(pull_request = %existing.html_url, "Duplicate pull request detected. Skipping creation");
                    return Ok(());
                }
                DuplicatePrStrategy::Replace => {
                    info!(pull_request = %existing.html_url, "Duplicate pull request detected. Closing and creating new");
                    match self
                        .host
                        .close_pull_request(&repository.coordinates, existing.number)
                        .await
                    {
                        Ok(()) => replaced = Some(existing),
                        Err(e) => {
                            warn!(pull_request = %existing.html_url, error = %e, "Failed to close existing pull request");
                        }
                    }
                }
                DuplicatePrStrategy::Ignore => {
                    info!(pull_request = %existing.html_url, "Duplicate pull request detected. Creating new one");
                }
            }
        }

        let request = NewPullRequest {
            title,
            head,
            base,
            body,
            draft: self.settings.draft,
        };
        let pull_request = match self
            .host
            .create_pull_request(&repository.coordinates, &request)
            .await
        {
            Ok(pr) => pr,
            Err(e) => {
                if let Some(previous) = replaced {
                    if let Err(reopen) = self
                        .host
                        .reopen_pull_request(&repository.coordinates, previous.number)
                        .await
                    {
                        warn!(pull_request = %previous.html_url, error = %reopen, "Failed to reopen replaced pull request");
                    }
                }
                return Err(e.into());
            }
        };

        info!(pull_request = %pull_request.html_url, kind = label, "Pull request created");
        behavior.progress_mut(item).with_pull_request();
        if kind == RepoKind::Primary {
            item.set_pull_request_url(pull_request.html_url.clone());
            self.close_legacy_pull_requests(&repository.coordinates)
                .await;

            let labels: Vec<String> = item
                .tags()
                .iter()
                .filter(|tag| ALLOWED_LABELS.contains(&tag.as_str()))
                .cloned()
                .collect();
            if !labels.is_empty() {
                if let Err(e) = self
                    .host
                    .add_labels(&repository.coordinates, pull_request.number, &labels)
                    .await
                {
                    debug!(error = %e, "Failed to add labels to pull request. Probably missing permission");
                }
            }
            item.clear_tags();
        }
        Ok(())
    }

    async fn close_legacy_pull_requests(&self, repo: &RepoCoordinates) {
        let pulls = match self.host.list_open_pull_requests(repo, None, None).await {
            Ok(pulls) => pulls,
            Err(e) => {
                warn!(error = %e, "Failed to check if legacy pull request exists");
                return;
            }
        };
        for pr in pulls.iter().filter(|pr| pr.head_ref == LEGACY_BRANCH) {
            match self.host.close_pull_request(repo, pr.number).await {
                Ok(()) => info!(pull_request = %pr.html_url, "Closed legacy pull request"),
                Err(e) => debug!(error = %e, "Failed to close legacy pull request"),
            }
        }
    }

    /// Diff statistics of the plugin checkout.
    ///
    /// Dry runs and local units compare the working tree with the index,
    /// otherwise the default branch is compared with `HEAD`.
    ///
    /// # Errors
    ///
    /// Fails on git or hosting errors.
    pub async fn diff_stats(&self, item: &WorkItem) -> Result<DiffStats, SyncError> {
        let path = RepoKind::Primary.behavior().local_path(item);
        if self.settings.dry_run || item.is_local() {
            return Ok(self.git.diff_stats(&path, None).await?);
        }
        let repository = self.remote_repository(item, RepoKind::Primary).await?;
        Ok(self
            .git
            .diff_stats(&path, Some(&repository.default_branch))
            .await?)
    }
}

fn check_parent(fork: &RemoteRepository, source: &RemoteRepository) -> Result<(), SyncError> {
    match &fork.parent {
        Some(parent) if parent.same_as(&source.coordinates) => Ok(()),
        parent => Err(SyncError::ForeignFork {
            fork: fork.coordinates.full_name(),
            expected: source.coordinates.full_name(),
            actual: parent
                .as_ref()
                .map_or_else(|| "nothing".to_string(), RepoCoordinates::full_name),
        }),
    }
}

fn missing_branch(error: GitError, branch: &str, path: &Path) -> SyncError {
    match &error {
        GitError::CommandFailed { stderr, .. }
            if stderr.contains("unknown revision") || stderr.contains("ambiguous argument") =>
        {
            SyncError::MissingDefaultBranch {
                branch: branch.to_string(),
                path: path.display().to_string(),
            }
        }
        _ => error.into(),
    }
}
