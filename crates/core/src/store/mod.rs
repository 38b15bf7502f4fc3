//! Persistence ports.
//!
//! Counter changes are expressed as deltas so implementations can apply
//! them as relative updates (`likes = likes + ?`) without reading first.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::billing::types::{Subscription, UserEntitlement};
use crate::content::{ContentAggregate, ContentRef};
use crate::interaction::{Interaction, VoteKind, Voter};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Votes, views and the counters derived from them.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    async fn find_interaction(
        &self,
        content: &ContentRef,
        voter: &Voter,
    ) -> StoreResult<Option<Interaction>>;

    async fn insert_interaction(&self, interaction: &Interaction) -> StoreResult<()>;

    async fn update_interaction_kind(
        &self,
        content: &ContentRef,
        voter: &Voter,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn delete_interaction(&self, content: &ContentRef, voter: &Voter) -> StoreResult<()>;

    /// Add the deltas to the like/dislike counters, creating the aggregate
    /// row when missing.
    async fn adjust_votes(
        &self,
        content: &ContentRef,
        likes: i64,
        dislikes: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Increment views by one, creating the row when missing. Returns the
    /// new total.
    async fn increment_views(&self, content: &ContentRef, at: DateTime<Utc>) -> StoreResult<i64>;

    async fn aggregate(&self, content: &ContentRef) -> StoreResult<Option<ContentAggregate>>;
}

/// Subscriptions and the entitlement fields on users.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn find_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> StoreResult<Option<Subscription>>;

    async fn insert_subscription(&self, subscription: &Subscription) -> StoreResult<()>;

    async fn update_subscription(&self, subscription: &Subscription) -> StoreResult<()>;

    async fn find_entitlement(&self, user_id: &str) -> StoreResult<Option<UserEntitlement>>;

    /// Entitlement of `user_id`, registering the user with no premium
    /// history first if the id has never been seen.
    async fn ensure_user(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<UserEntitlement>;

    async fn save_entitlement(&self, entitlement: &UserEntitlement) -> StoreResult<()>;
}

/// Liveness check used by the health endpoint.
#[async_trait]
pub trait StoreHealth: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}
