#![allow(dead_code)]

use async_trait::async_trait;
use plugin_modernizer::build::TransformError;
use plugin_modernizer::git::{DiffStats, Signature, WorkingTreeStatus};
use plugin_modernizer::hosting::{
    Identity, IdentityKind, NewPullRequest, PullRequest, RemoteRepository, RepoCoordinates,
};
use plugin_modernizer::{
    BuildError, BuildTool, Collaborators, Credentials, ExtractError, FactExtractor, Facts,
    GitError, HostSync, HostingApi, HostingError, Jdk, Orchestrator, PluginCatalog,
    PreconditionError, Recipe, RecipeBook, RecipeText, Settings, TemplateRenderer, Transformer,
    VersionControl, WorkItem,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

pub const LOGIN: &str = "octocat";
pub const PLUGIN: &str = "git";
pub const PLUGIN_REPOSITORY: &str = "git-plugin";
pub const SOURCE: &str = "jenkinsci/git-plugin";
pub const METADATA: &str = "jenkins-infra/metadata-plugin-modernizer";
pub const BRANCH: &str = "plugin-modernizer/SetupRenovate";

pub const CLEAN_POM: &str = r#"<project>
  <parent>
    <groupId>org.jenkins-ci.plugins</groupId>
    <artifactId>plugin</artifactId>
    <version>4.88</version>
    <relativePath />
  </parent>
  <artifactId>git</artifactId>
  <packaging>hpi</packaging>
</project>
"#;

pub const POM_WITHOUT_RELATIVE_PATH: &str = r#"<project>
  <parent>
    <groupId>org.jenkins-ci.plugins</groupId>
    <artifactId>plugin</artifactId>
    <version>4.88</version>
  </parent>
  <artifactId>git</artifactId>
  <packaging>hpi</packaging>
</project>
"#;

/// A repository as the fake hosting service reports it.
pub fn repository(owner: &str, name: &str) -> RemoteRepository {
    RemoteRepository {
        coordinates: RepoCoordinates::new(owner, name),
        default_branch: "main".to_string(),
        archived: false,
        fork: false,
        parent: None,
        clone_url: format!("https://github.com/{owner}/{name}.git"),
        ssh_url: format!("git@github.com:{owner}/{name}.git"),
        html_url: format!("https://github.com/{owner}/{name}"),
    }
}

/// A fork of `parent` owned by `owner`.
pub fn fork_of(owner: &str, parent: &str) -> RemoteRepository {
    let parent = RepoCoordinates::parse(parent).expect("valid parent");
    let mut fork = repository(owner, &parent.name);
    fork.fork = true;
    fork.parent = Some(parent);
    fork
}

struct FakePull {
    repo: String,
    head: String,
    base: String,
    open: bool,
    pull: PullRequest,
}

#[derive(Default)]
struct HostState {
    repositories: BTreeMap<String, RemoteRepository>,
    organizations: BTreeSet<String>,
    pulls: Vec<FakePull>,
    calls: Vec<String>,
    fail_pull_request_creation: bool,
}

/// In-memory hosting service recording every call.
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

const WRITES: [&str; 7] = [
    "create_fork",
    "sync_fork",
    "delete_repository",
    "create_pull_request",
    "close_pull_request",
    "reopen_pull_request",
    "add_labels",
];

impl FakeHost {
    pub fn add_repository(&self, repository: RemoteRepository) {
        let mut state = self.state.lock().unwrap();
        state
            .repositories
            .insert(repository.coordinates.full_name(), repository);
    }

    pub fn remove_repository(&self, full_name: &str) {
        self.state.lock().unwrap().repositories.remove(full_name);
    }

    pub fn add_organization(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .organizations
            .insert(name.to_string());
    }

    pub fn fail_pull_request_creation(&self) {
        self.state.lock().unwrap().fail_pull_request_creation = true;
    }

    /// Adds an open pull request on `repo` from `head_owner:branch`.
    pub fn add_open_pull_request(&self, repo: &str, head_owner: &str, branch: &str) -> u64 {
        let mut state = self.state.lock().unwrap();
        let coordinates = RepoCoordinates::parse(repo).expect("valid repository");
        let number = state.pulls.len() as u64 + 1;
        state.pulls.push(FakePull {
            repo: repo.to_string(),
            head: format!("{head_owner}:{branch}"),
            base: "main".to_string(),
            open: true,
            pull: PullRequest {
                number,
                html_url: format!("https://github.com/{repo}/pull/{number}"),
                head_ref: branch.to_string(),
                head_repository: Some(RepoCoordinates::new(head_owner, coordinates.name)),
            },
        });
        number
    }

    pub fn is_open(&self, repo: &str, number: u64) -> bool {
        self.state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .any(|p| p.repo == repo && p.pull.number == number && p.open)
    }

    pub fn exists(&self, full_name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .repositories
            .contains_key(full_name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls of `operation`.
    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.split(' ').next() == Some(operation))
            .count()
    }

    /// Number of calls of `operation` on `repo`.
    pub fn count_on(&self, operation: &str, repo: &str) -> usize {
        let expected = format!("{operation} {repo}");
        self.calls()
            .iter()
            .filter(|call| call.starts_with(&expected))
            .count()
    }

    /// Calls that change state on the hosting service.
    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| WRITES.iter().any(|w| call.split(' ').next() == Some(*w)))
            .collect()
    }

    fn log(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn unexpected(route: &str, message: &str) -> HostingError {
    HostingError::UnexpectedResponse {
        route: route.to_string(),
        message: message.to_string(),
    }
}

#[async_trait]
impl HostingApi for FakeHost {
    async fn current_identity(&self) -> Result<Identity, HostingError> {
        self.log("current_identity".to_string());
        Ok(identity())
    }

    async fn is_organization(&self, owner: &str) -> Result<bool, HostingError> {
        self.log(format!("is_organization {owner}"));
        Ok(self.state.lock().unwrap().organizations.contains(owner))
    }

    async fn get_repository(
        &self,
        repo: &RepoCoordinates,
    ) -> Result<Option<RemoteRepository>, HostingError> {
        self.log(format!("get_repository {repo}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .repositories
            .get(&repo.full_name())
            .cloned())
    }

    async fn create_fork(
        &self,
        source: &RepoCoordinates,
        organization: Option<&str>,
    ) -> Result<RemoteRepository, HostingError> {
        self.log(format!(
            "create_fork {source} {}",
            organization.unwrap_or("-")
        ));
        let owner = organization.unwrap_or(LOGIN);
        let fork = fork_of(owner, &source.full_name());
        self.add_repository(fork.clone());
        Ok(fork)
    }

    async fn sync_fork(&self, fork: &RepoCoordinates, branch: &str) -> Result<(), HostingError> {
        self.log(format!("sync_fork {fork} {branch}"));
        Ok(())
    }

    async fn delete_repository(&self, repo: &RepoCoordinates) -> Result<(), HostingError> {
        self.log(format!("delete_repository {repo}"));
        self.remove_repository(&repo.full_name());
        Ok(())
    }

    async fn list_open_pull_requests(
        &self,
        repo: &RepoCoordinates,
        head: Option<&str>,
        base: Option<&str>,
    ) -> Result<Vec<PullRequest>, HostingError> {
        self.log(format!("list_open_pull_requests {repo}"));
        let full_name = repo.full_name();
        Ok(self
            .state
            .lock()
            .unwrap()
            .pulls
            .iter()
            .filter(|p| p.repo == full_name && p.open)
            .filter(|p| head.is_none_or(|h| p.head == h))
            .filter(|p| base.is_none_or(|b| p.base == b))
            .map(|p| p.pull.clone())
            .collect())
    }

    async fn create_pull_request(
        &self,
        repo: &RepoCoordinates,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError> {
        self.log(format!("create_pull_request {repo}"));
        let mut state = self.state.lock().unwrap();
        if state.fail_pull_request_creation {
            return Err(unexpected("pulls", "validation failed"));
        }
        let (head_owner, branch) = request
            .head
            .split_once(':')
            .ok_or_else(|| unexpected("pulls", "head without owner"))?;
        let number = state.pulls.len() as u64 + 1;
        let pull = PullRequest {
            number,
            html_url: format!("https://github.com/{repo}/pull/{number}"),
            head_ref: branch.to_string(),
            head_repository: Some(RepoCoordinates::new(head_owner, repo.name.clone())),
        };
        state.pulls.push(FakePull {
            repo: repo.full_name(),
            head: request.head.clone(),
            base: request.base.clone(),
            open: true,
            pull: pull.clone(),
        });
        Ok(pull)
    }

    async fn close_pull_request(
        &self,
        repo: &RepoCoordinates,
        number: u64,
    ) -> Result<(), HostingError> {
        self.log(format!("close_pull_request {repo} {number}"));
        set_open(&self.state, repo, number, false);
        Ok(())
    }

    async fn reopen_pull_request(
        &self,
        repo: &RepoCoordinates,
        number: u64,
    ) -> Result<(), HostingError> {
        self.log(format!("reopen_pull_request {repo} {number}"));
        set_open(&self.state, repo, number, true);
        Ok(())
    }

    async fn add_labels(
        &self,
        repo: &RepoCoordinates,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostingError> {
        self.log(format!("add_labels {repo} {number} {}", labels.join(",")));
        Ok(())
    }
}

fn set_open(state: &Mutex<HostState>, repo: &RepoCoordinates, number: u64, open: bool) {
    let full_name = repo.full_name();
    let mut state = state.lock().unwrap();
    for pull in state
        .pulls
        .iter_mut()
        .filter(|p| p.repo == full_name && p.pull.number == number)
    {
        pull.open = open;
    }
}

struct GitState {
    calls: Vec<String>,
    files: Vec<(String, String)>,
    status: WorkingTreeStatus,
    branches: BTreeSet<String>,
    push_output: String,
    reject_ssh: bool,
    diff: DiffStats,
}

/// git stand-in; clones create the destination and write the configured files.
pub struct FakeGit {
    state: Mutex<GitState>,
}

impl Default for FakeGit {
    fn default() -> Self {
        Self {
            state: Mutex::new(GitState {
                calls: Vec::new(),
                files: vec![("pom.xml".to_string(), CLEAN_POM.to_string())],
                status: WorkingTreeStatus {
                    modified: BTreeSet::from(["pom.xml".to_string()]),
                    ..WorkingTreeStatus::default()
                },
                branches: BTreeSet::new(),
                push_output: String::new(),
                reject_ssh: false,
                diff: DiffStats {
                    additions: 3,
                    deletions: 1,
                    changed_files: 1,
                },
            }),
        }
    }
}

impl FakeGit {
    pub fn set_clone_file(&self, path: &str, contents: &str) {
        let mut state = self.state.lock().unwrap();
        state.files.retain(|(p, _)| p != path);
        state.files.push((path.to_string(), contents.to_string()));
    }

    pub fn set_status(&self, status: WorkingTreeStatus) {
        self.state.lock().unwrap().status = status;
    }

    pub fn set_push_output(&self, output: &str) {
        self.state.lock().unwrap().push_output = output.to_string();
    }

    /// Makes clones over SSH fail authentication.
    pub fn reject_ssh(&self) {
        self.state.lock().unwrap().reject_ssh = true;
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Operation names only, in call order.
    pub fn operations(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| call.split(' ').next())
            .map(str::to_string)
            .collect()
    }

    fn log(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl VersionControl for FakeGit {
    async fn clone_repository(&self, url: &str, destination: &Path) -> Result<(), GitError> {
        self.log(format!("clone {url}"));
        let state = self.state.lock().unwrap();
        if state.reject_ssh && url.starts_with("git@") {
            return Err(GitError::Authentication {
                command: "clone".to_string(),
                stderr: "Permission denied (publickey)".to_string(),
            });
        }
        let io = |e: std::io::Error| GitError::Spawn {
            command: "clone".to_string(),
            source: e,
        };
        std::fs::create_dir_all(destination).map_err(io)?;
        for (path, contents) in &state.files {
            std::fs::write(destination.join(path), contents).map_err(io)?;
        }
        Ok(())
    }

    async fn set_remote_url(&self, _repo: &Path, remote: &str, url: &str) -> Result<(), GitError> {
        self.log(format!("set-url {remote} {url}"));
        Ok(())
    }

    async fn fetch(&self, _repo: &Path, remote: &str) -> Result<(), GitError> {
        self.log(format!("fetch {remote}"));
        Ok(())
    }

    async fn reset_hard(&self, _repo: &Path, target: &str) -> Result<(), GitError> {
        self.log(format!("reset-hard {target}"));
        Ok(())
    }

    async fn clean(&self, _repo: &Path) -> Result<(), GitError> {
        self.log("clean".to_string());
        Ok(())
    }

    async fn checkout(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
        self.log(format!("checkout {branch}"));
        Ok(())
    }

    async fn reset_branch(
        &self,
        _repo: &Path,
        branch: &str,
        start_point: &str,
    ) -> Result<(), GitError> {
        self.log(format!("reset-branch {branch} {start_point}"));
        Ok(())
    }

    async fn branch_exists(&self, _repo: &Path, branch: &str) -> Result<bool, GitError> {
        self.log(format!("branch-exists {branch}"));
        Ok(self.state.lock().unwrap().branches.contains(branch))
    }

    async fn create_branch(&self, _repo: &Path, branch: &str) -> Result<(), GitError> {
        self.log(format!("create-branch {branch}"));
        self.state
            .lock()
            .unwrap()
            .branches
            .insert(branch.to_string());
        Ok(())
    }

    async fn status(&self, _repo: &Path) -> Result<WorkingTreeStatus, GitError> {
        self.log("status".to_string());
        Ok(self.state.lock().unwrap().status.clone())
    }

    async fn stage_all(&self, _repo: &Path) -> Result<(), GitError> {
        self.log("stage".to_string());
        Ok(())
    }

    async fn commit(
        &self,
        _repo: &Path,
        message: &str,
        _author: &Signature,
        _signing_key: Option<&Path>,
    ) -> Result<(), GitError> {
        self.log(format!("commit {message}"));
        Ok(())
    }

    async fn push(&self, _repo: &Path, remote: &str, branch: &str) -> Result<String, GitError> {
        self.log(format!("push {remote} {branch}"));
        Ok(self.state.lock().unwrap().push_output.clone())
    }

    async fn diff_stats(&self, _repo: &Path, base: Option<&str>) -> Result<DiffStats, GitError> {
        self.log(format!("diff {}", base.unwrap_or("-")));
        Ok(self.state.lock().unwrap().diff)
    }
}

/// Build tool recording `(goal, jdk)`; verification fails for the configured JDKs.
#[derive(Default)]
pub struct FakeBuild {
    invocations: Mutex<Vec<(String, u8)>>,
    failing_verify: Mutex<BTreeSet<u8>>,
    failing_goals: Mutex<BTreeSet<String>>,
}

impl FakeBuild {
    /// Makes every invocation of `goal` fail, whatever the runtime.
    pub fn fail_goal(&self, goal: &str) {
        self.failing_goals.lock().unwrap().insert(goal.to_string());
    }

    pub fn fail_verify(&self, jdk: Jdk) {
        self.failing_verify.lock().unwrap().insert(jdk.major());
    }

    pub fn invocations(&self) -> Vec<(String, u8)> {
        self.invocations.lock().unwrap().clone()
    }

    /// JDKs full verification ran with, in order.
    pub fn verified_with(&self) -> Vec<u8> {
        self.invocations()
            .into_iter()
            .filter(|(goal, _)| goal == "verify")
            .map(|(_, jdk)| jdk)
            .collect()
    }
}

#[async_trait]
impl BuildTool for FakeBuild {
    async fn invoke(
        &self,
        _checkout: &Path,
        runtime: Jdk,
        goal: &str,
        flags: &[String],
    ) -> Result<(), BuildError> {
        let goal = if flags.iter().any(|f| f == "-Pquick-build") {
            "quick-build".to_string()
        } else {
            goal.to_string()
        };
        self.invocations
            .lock()
            .unwrap()
            .push((goal.clone(), runtime.major()));
        let failing = self.failing_goals.lock().unwrap().contains(&goal)
            || (goal == "verify" && self.failing_verify.lock().unwrap().contains(&runtime.major()));
        if failing {
            return Err(BuildError::GoalFailed {
                goal,
                jdk: runtime.major(),
                code: Some(1),
                output: "BUILD FAILURE".to_string(),
            });
        }
        Ok(())
    }
}

/// Transformer reporting a fixed set of changed paths.
#[derive(Default)]
pub struct FakeTransformer {
    fail: Mutex<bool>,
    calls: Mutex<usize>,
}

impl FakeTransformer {
    pub fn fail(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Transformer for FakeTransformer {
    async fn apply(
        &self,
        _checkout: &Path,
        _recipe: &Recipe,
        runtime: Jdk,
    ) -> Result<Vec<String>, TransformError> {
        *self.calls.lock().unwrap() += 1;
        if *self.fail.lock().unwrap() {
            return Err(TransformError::Build(BuildError::GoalFailed {
                goal: "rewrite:run".to_string(),
                jdk: runtime.major(),
                code: Some(1),
                output: "recipe failed".to_string(),
            }));
        }
        Ok(vec!["pom.xml".to_string()])
    }
}

/// Extractor returning fixed facts plus the preconditions found in the checkout.
pub struct FakeExtractor {
    facts: Mutex<Facts>,
    calls: Mutex<usize>,
}

impl Default for FakeExtractor {
    fn default() -> Self {
        Self {
            facts: Mutex::new(Facts {
                plugin_name: Some(PLUGIN.to_string()),
                jdks: BTreeSet::from([Jdk::Java11, Jdk::Java17]),
                jenkins_version: Some("2.440.3".to_string()),
                ..Facts::default()
            }),
            calls: Mutex::new(0),
        }
    }
}

impl FakeExtractor {
    pub fn set_facts(&self, facts: Facts) {
        *self.facts.lock().unwrap() = facts;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FactExtractor for FakeExtractor {
    async fn collect(&self, checkout: &Path, _runtime: Jdk) -> Result<Facts, ExtractError> {
        *self.calls.lock().unwrap() += 1;
        let mut facts = self.facts.lock().unwrap().clone();
        facts.errors = PreconditionError::detect(checkout);
        Ok(facts)
    }
}

/// Catalog knowing the plugins it was given.
#[derive(Default)]
pub struct FakeCatalog {
    pub repositories: BTreeMap<String, String>,
    pub deprecated: BTreeSet<String>,
    pub opted_out: BTreeSet<String>,
}

impl PluginCatalog for FakeCatalog {
    fn exists(&self, plugin: &str) -> bool {
        self.repositories.contains_key(plugin)
    }

    fn repository_name(&self, plugin: &str) -> Option<String> {
        self.repositories.get(plugin).cloned()
    }

    fn version(&self, plugin: &str) -> Option<String> {
        self.exists(plugin).then(|| "5.7.0".to_string())
    }

    fn is_deprecated(&self, plugin: &str) -> bool {
        self.deprecated.contains(plugin)
    }

    fn is_opted_out(&self, plugin: &str) -> bool {
        self.opted_out.contains(plugin)
    }
}

pub fn identity() -> Identity {
    Identity {
        login: LOGIN.to_string(),
        id: 1,
        name: Some("Octo Cat".to_string()),
        kind: IdentityKind::User,
    }
}

/// Every collaborator of a run, backed by fakes and a temporary cache.
pub struct World {
    pub temp: TempDir,
    pub settings: Settings,
    pub credentials: Credentials,
    pub owner: String,
    pub recipe: Recipe,
    pub renderer: TemplateRenderer,
    pub host: FakeHost,
    pub git: FakeGit,
    pub build: FakeBuild,
    pub transformer: FakeTransformer,
    pub extractor: FakeExtractor,
    pub catalog: FakeCatalog,
}

impl World {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let settings = Settings {
            cache_path: temp.path().join("cache"),
            github_owner: Some(LOGIN.to_string()),
            fork_settle_delay: Duration::ZERO,
            ..Settings::default()
        };
        let credentials =
            Credentials::new(Some("token".to_string()), &temp.path().join("missing-key"));
        let recipe = RecipeBook::builtin()
            .unwrap()
            .find("SetupRenovate")
            .unwrap()
            .clone();

        let host = FakeHost::default();
        host.add_repository(repository("jenkinsci", PLUGIN_REPOSITORY));
        host.add_repository(repository("jenkins-infra", "metadata-plugin-modernizer"));

        let catalog = FakeCatalog {
            repositories: BTreeMap::from([(PLUGIN.to_string(), PLUGIN_REPOSITORY.to_string())]),
            ..FakeCatalog::default()
        };

        Self {
            temp,
            settings,
            credentials,
            owner: LOGIN.to_string(),
            recipe,
            renderer: TemplateRenderer::new(),
            host,
            git: FakeGit::default(),
            build: FakeBuild::default(),
            transformer: FakeTransformer::default(),
            extractor: FakeExtractor::default(),
            catalog,
        }
    }

    /// Uses a private key on disk, switching git to SSH.
    pub fn use_ssh_key(&mut self) {
        let key = self.temp.path().join("id_ed25519");
        std::fs::write(&key, "key").unwrap();
        self.credentials = Credentials::new(Some("token".to_string()), &key);
    }

    pub fn sync(&self) -> HostSync<'_> {
        HostSync::new(
            &self.host,
            &self.git,
            &self.settings,
            &self.credentials,
            self.owner.clone(),
            identity(),
            RecipeText {
                recipe: &self.recipe,
                renderer: &self.renderer,
            },
        )
    }

    pub fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(
            self.sync(),
            Collaborators {
                catalog: &self.catalog,
                build: &self.build,
                transformer: &self.transformer,
                extractor: &self.extractor,
            },
        )
    }

    /// The `git` plugin with its repository name resolved.
    pub fn hosted_item(&self) -> WorkItem {
        let mut item = WorkItem::hosted(PLUGIN, &self.settings);
        item.set_repository_name(PLUGIN_REPOSITORY);
        item
    }

    /// A local checkout of the `git` plugin containing `pom`.
    pub fn local_item(&self, pom: &str) -> WorkItem {
        let path = self.temp.path().join("local-git");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("pom.xml"), pom).unwrap();
        WorkItem::local(PLUGIN, &path, &self.settings)
    }
}
