use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use catalog_core::content::{ContentRef, ContentType};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::extract::ClientContext;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/views", get(view_count).post(record_view))
}

#[derive(Debug, Deserialize)]
pub struct ViewTarget {
    #[serde(rename = "type")]
    content_type: Option<String>,
    id: Option<String>,
}

impl ViewTarget {
    fn content(self) -> ApiResult<ContentRef> {
        let content_type = self
            .content_type
            .ok_or_else(|| ApiError::BadRequest("type is required".to_string()))?
            .parse::<ContentType>()
            .map_err(|err| ApiError::BadRequest(err.to_string()))?;
        let id = self
            .id
            .ok_or_else(|| ApiError::BadRequest("id is required".to_string()))?;
        ContentRef::new(content_type, &id).map_err(|err| ApiError::BadRequest(err.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct RecordViewResponse {
    success: bool,
    counted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct ViewCountResponse {
    views: i64,
}

async fn record_view(
    State(state): State<AppState>,
    client: ClientContext,
    body: Result<Json<ViewTarget>, JsonRejection>,
) -> ApiResult<Json<RecordViewResponse>> {
    let Json(target) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let content = target.content()?;

    let outcome = state.views().record(&content, &client.ip).await;
    Ok(Json(RecordViewResponse {
        success: true,
        counted: outcome.counted,
        message: outcome.message,
        warning: outcome.warning,
    }))
}

async fn view_count(
    State(state): State<AppState>,
    query: Result<Query<ViewTarget>, QueryRejection>,
) -> ApiResult<Json<ViewCountResponse>> {
    let Query(target) = query.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    let content = target.content()?;
    let views = state.views().views(&content).await?;
    Ok(Json(ViewCountResponse { views }))
}
