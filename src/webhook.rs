//! GitHub webhook receiver
//!
//! Pull request events upsert the PR record and refresh its cached diff.
//! Deliveries are not signature-checked.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::api::AppState;
use crate::pr::{diff, PrError, PrId, PullRequest};

const PULL_REQUEST_EVENT: &str = "pull_request";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Invalid pull_request payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Upstream(#[from] PrError),
}

/// The parts of GitHub's `pull_request` event the relay uses.
#[derive(Debug, Deserialize)]
pub struct PullRequestEvent {
    pub pull_request: PullRequestPayload,
    pub repository: Repository,
}

#[derive(Debug, Deserialize)]
pub struct PullRequestPayload {
    pub number: u64,
    pub title: String,
    pub user: User,
    pub state: String,
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: User,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub login: String,
}

impl PullRequestEvent {
    pub fn pr_id(&self) -> PrId {
        PrId::new(
            &self.repository.owner.login,
            &self.repository.name,
            self.pull_request.number,
        )
    }

    fn into_pull_request(self) -> PullRequest {
        let id = self.pr_id();
        PullRequest {
            id: id.to_string(),
            number: self.pull_request.number,
            title: self.pull_request.title,
            author: self.pull_request.user.login,
            repo: id.repo_ref().to_string(),
            status: self.pull_request.state,
            url: self.pull_request.html_url,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WebhookResponse {
    Ignored {
        event: Option<String>,
    },
    Received {
        /// Files listed upstream, including those without a patch
        files: usize,
        pr_id: String,
    },
    Error {
        message: String,
    },
}

/// Store the PR from a `pull_request` delivery and refresh its diff.
///
/// The PR upsert is kept even if the diff fetch fails afterwards.
#[instrument(skip(state, body))]
pub async fn receive_pull_request(
    state: &AppState,
    body: &[u8],
) -> Result<WebhookResponse, WebhookError> {
    let event: PullRequestEvent = serde_json::from_slice(body)?;
    let id = event.pr_id();
    info!(pr = %id, state = %event.pull_request.state, "pull request event received");

    state.store.upsert_pull_request(event.into_pull_request()).await;

    let files = state.github.fetch_pull_files(&id).await?;
    let combined = diff::combine_patches(&files);
    state.store.replace_diff(id.clone(), combined).await;
    info!(pr = %id, files = files.len(), "stored diff");

    Ok(WebhookResponse::Received {
        files: files.len(),
        pr_id: id.to_string(),
    })
}

/// GitHub webhook handler
pub async fn github_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<WebhookResponse>) {
    let event_type = headers
        .get("x-github-event")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if event_type.as_deref() != Some(PULL_REQUEST_EVENT) {
        info!(event_type = ?event_type, "ignoring webhook event");
        return (
            StatusCode::OK,
            Json(WebhookResponse::Ignored { event: event_type }),
        );
    }

    match receive_pull_request(&state, &body).await {
        Ok(response) => (StatusCode::OK, Json(response)),
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::Error {
                    message: e.to_string(),
                }),
            )
        }
    }
}
