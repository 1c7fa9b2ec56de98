//! HTTP API polled by the review frontend

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::pr::{PrId, PullRequest, PullRequestSource, RepoRef};
use crate::review::Reviewer;
use crate::store::{Metrics, Review, Store};
use crate::webhook::github_webhook_handler;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            "method_not_allowed" => StatusCode::METHOD_NOT_ALLOWED,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

impl ApiError {
    fn not_found(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "not_found".to_string(),
        }
    }

    fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "bad_request".to_string(),
        }
    }

    fn method_not_allowed() -> Self {
        Self {
            error: "Method not allowed".to_string(),
            code: "method_not_allowed".to_string(),
        }
    }

    fn upstream(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            code: "upstream_error".to_string(),
        }
    }
}

/// Application state, built once at startup and shared by every handler.
pub struct AppState {
    pub store: Store,
    pub github: Arc<dyn PullRequestSource>,
    pub reviewer: Arc<dyn Reviewer>,
    /// Repository polled by `GET /api/prs`
    pub default_repo: RepoRef,
}

impl AppState {
    pub fn new(
        github: Arc<dyn PullRequestSource>,
        reviewer: Arc<dyn Reviewer>,
        default_repo: RepoRef,
    ) -> Self {
        Self {
            store: Store::new(),
            github,
            reviewer,
            default_repo,
        }
    }
}

/// Create the full router: API, webhook receiver and health check.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/prs", get(list_pull_requests))
        .route("/api/prs/{*rest}", get(pull_request_action).post(pull_request_action))
        .route("/api/reviews", get(list_reviews))
        .route("/api/metrics", get(metrics))
        .route("/github/webhook", post(github_webhook_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, PartialEq)]
enum PrAction {
    Diff,
    Review,
}

/// Split `owner/repo/number/{diff|review}` into the PR id and the action.
///
/// The frontend sends the id percent-encoded as one segment; axum decodes it,
/// so both forms arrive here with plain slashes.
fn parse_pr_path(rest: &str) -> Result<(PrId, PrAction), ApiError> {
    let (id, action) = rest
        .rsplit_once('/')
        .ok_or_else(|| ApiError::not_found("Unknown pull request endpoint"))?;
    let action = match action {
        "diff" => PrAction::Diff,
        "review" => PrAction::Review,
        _ => return Err(ApiError::not_found("Unknown pull request endpoint")),
    };
    let id = id
        .parse::<PrId>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    Ok((id, action))
}

// ==================== Handlers ====================

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn list_pull_requests(State(state): State<Arc<AppState>>) -> Json<Vec<PullRequest>> {
    match state.github.list_open_pull_requests(&state.default_repo).await {
        Ok(fresh) => Json(state.store.merge_pull_requests(fresh).await),
        Err(e) => {
            warn!(repo = %state.default_repo, error = %e, "failed to poll pull requests, serving stored list");
            Json(state.store.pull_requests().await)
        }
    }
}

async fn pull_request_action(
    State(state): State<Arc<AppState>>,
    method: Method,
    Path(rest): Path<String>,
) -> Result<Response, ApiError> {
    let (id, action) = parse_pr_path(&rest)?;
    match action {
        PrAction::Diff if method == Method::POST => Err(ApiError::method_not_allowed()),
        PrAction::Diff => Ok(get_diff(&state, &id).await?.into_response()),
        PrAction::Review => Ok(trigger_review(&state, &id).await?.into_response()),
    }
}

async fn load_diff(state: &AppState, id: &PrId) -> Option<String> {
    match state.store.diff_or_fetch(id, state.github.as_ref()).await {
        Ok(diff) => Some(diff),
        Err(e) => {
            warn!(pr = %id, error = %e, "failed to fetch diff");
            None
        }
    }
}

async fn get_diff(state: &AppState, id: &PrId) -> Result<String, ApiError> {
    load_diff(state, id)
        .await
        .ok_or_else(|| ApiError::not_found("Unable to fetch diff"))
}

#[derive(Debug, Serialize)]
struct ReviewResponse {
    status: &'static str,
    review: String,
}

async fn trigger_review(state: &AppState, id: &PrId) -> Result<Json<ReviewResponse>, ApiError> {
    let diff = load_diff(state, id)
        .await
        .ok_or_else(|| ApiError::not_found("Could not load diff"))?;

    info!(pr = %id, diff_bytes = diff.len(), "running review");
    let text = state.reviewer.review_diff(&diff).await.map_err(|e| {
        error!(pr = %id, error = %e, "review failed");
        ApiError::upstream(format!("Review failed: {}", e))
    })?;
    debug!(pr = %id, review = %text, "review complete");

    let review = state.store.append_review(id, text).await;
    info!(pr = %id, review_id = review.id, "stored review");

    Ok(Json(ReviewResponse {
        status: "ok",
        review: review.review,
    }))
}

async fn list_reviews(State(state): State<Arc<AppState>>) -> Json<Vec<Review>> {
    Json(state.store.reviews().await)
}

async fn metrics(State(state): State<Arc<AppState>>) -> Json<Metrics> {
    Json(state.store.metrics().await)
}
