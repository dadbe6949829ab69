//! GitHub implementation of [`HostingApi`].

use super::{
    HostingApi, HostingError, Identity, IdentityKind, NewPullRequest, PullRequest,
    RemoteRepository, RepoCoordinates,
};
use crate::rate_limit::ensure_core_rate_limit;
use async_trait::async_trait;
use octocrab::{Octocrab, Page};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    parent: Option<NamePayload>,
    #[serde(default)]
    clone_url: Option<String>,
    #[serde(default)]
    ssh_url: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamePayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct PullPayload {
    number: u64,
    html_url: String,
    head: HeadPayload,
}

#[derive(Debug, Deserialize)]
struct HeadPayload {
    #[serde(rename = "ref")]
    ref_name: String,
    #[serde(default)]
    repo: Option<NamePayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    login: String,
    id: u64,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Serialize)]
struct PullFilter<'a> {
    state: &'static str,
    per_page: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    head: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base: Option<&'a str>,
}

fn into_repository(payload: RepositoryPayload, route: &str) -> Result<RemoteRepository, HostingError> {
    let coordinates =
        RepoCoordinates::parse(&payload.full_name).ok_or_else(|| HostingError::UnexpectedResponse {
            route: route.to_string(),
            message: format!("invalid full_name '{}'", payload.full_name),
        })?;
    let html_url = payload
        .html_url
        .unwrap_or_else(|| format!("https://github.com/{coordinates}"));
    Ok(RemoteRepository {
        default_branch: payload.default_branch.unwrap_or_else(|| "main".to_string()),
        archived: payload.archived,
        fork: payload.fork,
        parent: payload
            .parent
            .and_then(|p| RepoCoordinates::parse(&p.full_name)),
        clone_url: payload
            .clone_url
            .unwrap_or_else(|| format!("{html_url}.git")),
        ssh_url: payload
            .ssh_url
            .unwrap_or_else(|| format!("git@github.com:{coordinates}.git")),
        html_url,
        coordinates,
    })
}

fn into_pull_request(payload: PullPayload) -> PullRequest {
    PullRequest {
        number: payload.number,
        html_url: payload.html_url,
        head_ref: payload.head.ref_name,
        head_repository: payload
            .head
            .repo
            .and_then(|r| RepoCoordinates::parse(&r.full_name)),
    }
}

fn into_identity(payload: UserPayload) -> Identity {
    let kind = if payload.kind.eq_ignore_ascii_case("bot") {
        IdentityKind::Bot
    } else {
        IdentityKind::User
    };
    Identity {
        login: payload.login,
        id: payload.id,
        name: payload.name,
        kind,
    }
}

fn is_not_found(error: &octocrab::Error) -> bool {
    matches!(error, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

/// GitHub over octocrab. The identity is resolved once when connecting.
pub struct GitHubHost {
    octocrab: Octocrab,
    identity: Identity,
}

impl GitHubHost {
    /// Builds the API client and resolves the authenticated identity.
    ///
    /// Inside GitHub Actions (`GITHUB_ACTIONS=true`) the built-in bot identity is
    /// used, since installation tokens cannot read `/user`.
    ///
    /// # Errors
    ///
    /// Returns [`HostingError`] if the client cannot be built or the token is rejected.
    pub async fn connect(api_url: &str, token: &str) -> Result<Self, HostingError> {
        let octocrab = Octocrab::builder()
            .base_uri(api_url)?
            .personal_token(token.to_string())
            .build()?;

        let in_actions = std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true");
        let identity = if in_actions {
            Identity::github_actions()
        } else {
            let user: UserPayload = octocrab.get("/user", None::<&()>).await?;
            into_identity(user)
        };
        info!(login = %identity.login, "Connected to GitHub");

        Ok(Self { octocrab, identity })
    }
}

#[async_trait]
impl HostingApi for GitHubHost {
    async fn current_identity(&self) -> Result<Identity, HostingError> {
        Ok(self.identity.clone())
    }

    async fn is_organization(&self, owner: &str) -> Result<bool, HostingError> {
        let route = format!("/orgs/{owner}");
        match self
            .octocrab
            .get::<serde_json::Value, _, _>(&route, None::<&()>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_repository(
        &self,
        repo: &RepoCoordinates,
    ) -> Result<Option<RemoteRepository>, HostingError> {
        let route = format!("/repos/{repo}");
        match self
            .octocrab
            .get::<RepositoryPayload, _, _>(&route, None::<&()>)
            .await
        {
            Ok(payload) => into_repository(payload, &route).map(Some),
            Err(e) if is_not_found(&e) => {
                debug!(repo = %repo, "Repository not found");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn create_fork(
        &self,
        source: &RepoCoordinates,
        organization: Option<&str>,
    ) -> Result<RemoteRepository, HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        let route = format!("/repos/{source}/forks");
        let mut body = json!({ "default_branch_only": true });
        if let Some(org) = organization {
            body["organization"] = json!(org);
        }
        let payload: RepositoryPayload = self.octocrab.post(&route, Some(&body)).await?;
        into_repository(payload, &route)
    }

    async fn sync_fork(&self, fork: &RepoCoordinates, branch: &str) -> Result<(), HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        let route = format!("/repos/{fork}/merge-upstream");
        let _: serde_json::Value = self
            .octocrab
            .post(&route, Some(&json!({ "branch": branch })))
            .await?;
        Ok(())
    }

    async fn delete_repository(&self, repo: &RepoCoordinates) -> Result<(), HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        self.octocrab.repos(&repo.owner, &repo.name).delete().await?;
        Ok(())
    }

    async fn list_open_pull_requests(
        &self,
        repo: &RepoCoordinates,
        head: Option<&str>,
        base: Option<&str>,
    ) -> Result<Vec<PullRequest>, HostingError> {
        let route = format!("/repos/{repo}/pulls");
        let filter = PullFilter {
            state: "open",
            per_page: 100,
            head,
            base,
        };
        let page: Page<PullPayload> = self.octocrab.get(&route, Some(&filter)).await?;
        let mut next = page.next;
        let mut pulls: Vec<PullRequest> = page.items.into_iter().map(into_pull_request).collect();

        while let Some(following) = self.octocrab.get_page::<PullPayload>(&next).await? {
            pulls.extend(following.items.into_iter().map(into_pull_request));
            next = following.next;
        }
        debug!(repo = %repo, count = pulls.len(), "Listed open pull requests");
        Ok(pulls)
    }

    async fn create_pull_request(
        &self,
        repo: &RepoCoordinates,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        let pr = self
            .octocrab
            .pulls(&repo.owner, &repo.name)
            .create(&request.title, &request.head, &request.base)
            .body(&request.body)
            .draft(request.draft)
            .send()
            .await?;

        let html_url = pr
            .html_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_else(|| format!("https://github.com/{repo}/pull/{}", pr.number));

        let (head_owner, head_ref) = request
            .head
            .split_once(':')
            .unwrap_or(("", request.head.as_str()));
        Ok(PullRequest {
            number: pr.number,
            html_url,
            head_ref: head_ref.to_string(),
            head_repository: (!head_owner.is_empty())
                .then(|| RepoCoordinates::new(head_owner, &repo.name)),
        })
    }

    async fn close_pull_request(
        &self,
        repo: &RepoCoordinates,
        number: u64,
    ) -> Result<(), HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        let route = format!("/repos/{repo}/pulls/{number}");
        let _: serde_json::Value = self
            .octocrab
            .patch(&route, Some(&json!({ "state": "closed" })))
            .await?;
        Ok(())
    }

    async fn reopen_pull_request(
        &self,
        repo: &RepoCoordinates,
        number: u64,
    ) -> Result<(), HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        let route = format!("/repos/{repo}/pulls/{number}");
        let _: serde_json::Value = self
            .octocrab
            .patch(&route, Some(&json!({ "state": "open" })))
            .await?;
        Ok(())
    }

    async fn add_labels(
        &self,
        repo: &RepoCoordinates,
        number: u64,
        labels: &[String],
    ) -> Result<(), HostingError> {
        ensure_core_rate_limit(&self.octocrab).await?;
        self.octocrab
            .issues(&repo.owner, &repo.name)
            .add_labels(number, labels)
            .await?;
        Ok(())
    }
}
