use axum::{extract::State, routing::get, Json, Router};
use catalog_core::error::CoreError;
use catalog_core::store::BillingStore;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::extract::AuthUser;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/me/entitlement", get(entitlement))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementResponse {
    is_premium: bool,
    premium_expires_at: Option<DateTime<Utc>>,
    show_ads: bool,
}

/// Premium state as readers should honour it: a set flag whose expiry has
/// passed counts as free.
async fn entitlement(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<EntitlementResponse>> {
    let entitlement = state
        .billing_store()
        .find_entitlement(&user.user_id)
        .await
        .map_err(|err| ApiError::from(CoreError::from(err)))?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", user.user_id)))?;

    let is_premium = entitlement.is_active_at(state.clock().now());
    Ok(Json(EntitlementResponse {
        is_premium,
        premium_expires_at: entitlement.premium_expires_at,
        show_ads: !is_premium,
    }))
}
