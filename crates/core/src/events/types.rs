use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentRef;
use crate::interaction::{VoteAction, VoteKind};

/// Events emitted after successful mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CatalogEvent {
    InteractionRecorded(InteractionEvent),
    ViewCounted(ViewEvent),
    EntitlementChanged(EntitlementEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub content: ContentRef,
    /// Voter key as stored, e.g. `visitor:ab12…` or `user:u1`.
    pub voter: String,
    pub action: VoteAction,
    pub kind: Option<VoteKind>,
    pub previous: Option<VoteKind>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewEvent {
    pub content: ContentRef,
    pub views: i64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementEvent {
    pub user_id: String,
    pub event_name: String,
    pub provider_subscription_id: String,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}
