pub mod diff;
pub mod types;

pub use diff::PullFile;
pub use types::{PrId, PullRequest, RepoRef};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::GitHubConfig;

const USER_AGENT: &str = "ai-code-reviewer";
const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid PR id: {0} (expected owner/repo/number)")]
    InvalidId(String),
}

/// Read access to pull requests on the source-hosting platform.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// List the open pull requests of a repository.
    async fn list_open_pull_requests(&self, repo: &RepoRef) -> Result<Vec<PullRequest>, PrError>;

    /// List the changed files (with their patches) of one pull request.
    async fn fetch_pull_files(&self, id: &PrId) -> Result<Vec<PullFile>, PrError>;
}

/// GitHub REST API accessor. No retries and no pagination: only the first
/// page GitHub returns is seen.
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<SecretString>,
}

impl GitHubClient {
    pub fn new(config: &GitHubConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone().map(SecretString::new),
        }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT);
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    user: User,
    state: String,
    html_url: String,
}

impl PullResponse {
    fn into_pull_request(self, repo: &RepoRef) -> PullRequest {
        let id = PrId::new(&repo.owner, &repo.repo, self.number);
        PullRequest {
            id: id.to_string(),
            number: self.number,
            title: self.title,
            author: self.user.login,
            repo: repo.to_string(),
            status: self.state,
            url: self.html_url,
        }
    }
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    #[instrument(skip(self, repo), fields(repo = %repo))]
    async fn list_open_pull_requests(&self, repo: &RepoRef) -> Result<Vec<PullRequest>, PrError> {
        let url = format!("{}/repos/{}/{}/pulls", self.api_base, repo.owner, repo.repo);

        debug!("listing open pull requests");
        let pulls = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<PullResponse>>()
            .await?;
        debug!(count = pulls.len(), "received pull requests");

        Ok(pulls
            .into_iter()
            .map(|pull| pull.into_pull_request(repo))
            .collect())
    }

    #[instrument(skip(self, id), fields(pr = %id))]
    async fn fetch_pull_files(&self, id: &PrId) -> Result<Vec<PullFile>, PrError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files",
            self.api_base, id.owner, id.repo, id.number
        );

        debug!("fetching pull request files");
        let files = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<PullFile>>()
            .await?;
        debug!(files = files.len(), "received pull request files");

        Ok(files)
    }
}
