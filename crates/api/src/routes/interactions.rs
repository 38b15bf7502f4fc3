use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use catalog_core::content::ContentRef;
use catalog_core::interaction::{InteractionSnapshot, VoteAction, VoteKind, VoteRequest, Voter};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::{AuthUser, ClientContext};
use crate::state::AppState;

/// Like/dislike routes for anonymous visitors and signed-in users.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/interactions",
            get(visitor_snapshot).post(visitor_vote),
        )
        .route("/api/me/interactions", get(user_snapshot).post(user_vote))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBody {
    video_id: Option<String>,
    action: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotQuery {
    video_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    success: bool,
    action: VoteAction,
    previous_interaction: Option<VoteKind>,
}

async fn visitor_vote(
    State(state): State<AppState>,
    client: ClientContext,
    body: Result<Json<VoteBody>, JsonRejection>,
) -> ApiResult<Json<VoteResponse>> {
    cast(&state, client.voter(), body).await
}

async fn user_vote(
    State(state): State<AppState>,
    user: AuthUser,
    body: Result<Json<VoteBody>, JsonRejection>,
) -> ApiResult<Json<VoteResponse>> {
    cast(&state, user.voter()?, body).await
}

async fn visitor_snapshot(
    State(state): State<AppState>,
    client: ClientContext,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> ApiResult<Json<InteractionSnapshot>> {
    snapshot(&state, client.voter(), query).await
}

async fn user_snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> ApiResult<Json<InteractionSnapshot>> {
    snapshot(&state, user.voter()?, query).await
}

async fn cast(
    state: &AppState,
    voter: Voter,
    body: Result<Json<VoteBody>, JsonRejection>,
) -> ApiResult<Json<VoteResponse>> {
    let Json(body) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let video_id = body
        .video_id
        .ok_or_else(|| ApiError::BadRequest("videoId is required".to_string()))?;
    let request: VoteRequest = body
        .action
        .ok_or_else(|| ApiError::BadRequest("action is required".to_string()))?
        .parse()?;
    let content = ContentRef::video(&video_id).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let admission = state
        .vote_limiter()
        .admit(&format!("votes:{voter}"), state.clock().now());
    if !admission.is_admitted() {
        tracing::debug!(voter = %voter, "vote rate limited");
        return Err(ApiError::TooManyRequests {
            retry_after_secs: admission.retry_after_secs(),
        });
    }

    let outcome = state.ledger().apply(&content, &voter, request).await?;
    Ok(Json(VoteResponse {
        success: true,
        action: outcome.action,
        previous_interaction: outcome.previous,
    }))
}

async fn snapshot(
    state: &AppState,
    voter: Voter,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> ApiResult<Json<InteractionSnapshot>> {
    let Query(query) = query.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let video_id = query
        .video_id
        .ok_or_else(|| ApiError::BadRequest("videoId is required".to_string()))?;
    let content = ContentRef::video(&video_id).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    Ok(Json(state.ledger().snapshot(&content, &voter).await?))
}
