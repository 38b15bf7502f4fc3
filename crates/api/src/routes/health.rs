use axum::{extract::State, routing::get, Json, Router};
use catalog_core::store::StoreHealth;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/ping", get(ping))
}

/// Full health check, including the store.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    state
        .store_health()
        .ping()
        .await
        .map_err(|e| ApiError::Internal(format!("store health check failed: {e}")))?;

    Ok(Json(json!({
        "status": "ok",
        "store": "connected",
        "subscribers": state.event_bus().subscriber_count(),
    })))
}

/// Lightweight ping, no store check.
async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::testing::TestApp;

    #[tokio::test]
    async fn health_reports_store_and_subscribers() {
        let app = TestApp::new();
        let _rx = app.state.event_bus().subscribe();

        let (status, body) = app.get("/health", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["subscribers"], 1);
    }

    #[tokio::test]
    async fn ping_is_static() {
        let app = TestApp::new();
        let (status, body) = app.get("/v1/ping", &[]).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }
}
