use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use catalog_core::billing::{verify_signature, TransitionOutcome, WebhookEvent, SIGNATURE_HEADER};
use serde_json::{json, Value};
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Billing provider webhooks. Only POST is routed, so other methods get 405.
pub fn routes(max_body_bytes: usize) -> Router<AppState> {
    Router::new().route(
        "/api/webhooks/lemon-squeezy",
        post(lemon_squeezy).layer(RequestBodyLimitLayer::new(max_body_bytes)),
    )
}

async fn lemon_squeezy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    // Nothing is parsed before the signature checks out.
    if let Err(err) = verify_signature(state.config().webhook_secret.as_bytes(), &body, signature) {
        tracing::warn!(error = %err, "rejected webhook signature");
        return Err(ApiError::Unauthorized);
    }

    let event = WebhookEvent::parse(&body).map_err(|err| {
        tracing::warn!(error = %err, "malformed webhook payload");
        ApiError::BadRequest(err.to_string())
    })?;
    let event_name = event.event_name().to_string();

    match state.billing().apply(event).await {
        Ok(TransitionOutcome::Applied { .. }) | Ok(TransitionOutcome::Ignored { .. }) => {
            Ok(Json(json!({ "success": true })))
        }
        Err(err) => {
            tracing::error!(event = %event_name, error = %err, "webhook processing failed");
            Err(err.into())
        }
    }
}
