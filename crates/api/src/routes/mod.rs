pub mod account;
pub mod health;
pub mod interactions;
pub mod views;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Assemble the full router with all route groups.
pub fn build_router(state: AppState) -> Router {
    let max_webhook_body = state.config().webhook_max_body_bytes;

    Router::new()
        .merge(health::routes())
        .merge(interactions::routes())
        .merge(views::routes())
        .merge(webhooks::routes(max_webhook_body))
        .merge(account::routes())
        .with_state(state)
}
