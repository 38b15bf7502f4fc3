use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{BillingStore, EngagementStore, StoreHealth, StoreResult};
use crate::billing::types::{Subscription, UserEntitlement};
use crate::content::{ContentAggregate, ContentRef};
use crate::interaction::{Interaction, VoteKind, Voter};

type InteractionKey = (ContentRef, Voter);

#[derive(Default)]
struct Tables {
    interactions: HashMap<InteractionKey, Interaction>,
    aggregates: HashMap<ContentRef, ContentAggregate>,
    subscriptions: HashMap<String, Subscription>,
    users: HashMap<String, UserEntitlement>,
}

/// Process-local store. Backs tests and single-node development runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with no premium history.
    pub async fn insert_user(&self, user_id: &str) {
        self.tables
            .write()
            .await
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntitlement::free(user_id, Utc::now()));
    }

    pub async fn subscriptions_for_user(&self, user_id: &str) -> Vec<Subscription> {
        self.tables
            .read()
            .await
            .subscriptions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn interaction_count(&self, content: &ContentRef) -> usize {
        self.tables
            .read()
            .await
            .interactions
            .keys()
            .filter(|(c, _)| c == content)
            .count()
    }
}

fn empty_aggregate(content: &ContentRef, at: DateTime<Utc>) -> ContentAggregate {
    ContentAggregate {
        content: content.clone(),
        views: 0,
        likes: 0,
        dislikes: 0,
        updated_at: at,
    }
}

#[async_trait]
impl EngagementStore for MemoryStore {
    async fn find_interaction(
        &self,
        content: &ContentRef,
        voter: &Voter,
    ) -> StoreResult<Option<Interaction>> {
        let key = (content.clone(), voter.clone());
        Ok(self.tables.read().await.interactions.get(&key).cloned())
    }

    async fn insert_interaction(&self, interaction: &Interaction) -> StoreResult<()> {
        let key = (interaction.content.clone(), interaction.voter.clone());
        self.tables
            .write()
            .await
            .interactions
            .insert(key, interaction.clone());
        Ok(())
    }

    async fn update_interaction_kind(
        &self,
        content: &ContentRef,
        voter: &Voter,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let key = (content.clone(), voter.clone());
        if let Some(existing) = self.tables.write().await.interactions.get_mut(&key) {
            existing.kind = kind;
            existing.created_at = at;
        }
        Ok(())
    }

    async fn delete_interaction(&self, content: &ContentRef, voter: &Voter) -> StoreResult<()> {
        let key = (content.clone(), voter.clone());
        self.tables.write().await.interactions.remove(&key);
        Ok(())
    }

    async fn adjust_votes(
        &self,
        content: &ContentRef,
        likes: i64,
        dislikes: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let aggregate = tables
            .aggregates
            .entry(content.clone())
            .or_insert_with(|| empty_aggregate(content, at));
        aggregate.likes += likes;
        aggregate.dislikes += dislikes;
        aggregate.updated_at = at;
        Ok(())
    }

    async fn increment_views(&self, content: &ContentRef, at: DateTime<Utc>) -> StoreResult<i64> {
        let mut tables = self.tables.write().await;
        let aggregate = tables
            .aggregates
            .entry(content.clone())
            .or_insert_with(|| empty_aggregate(content, at));
        aggregate.views += 1;
        aggregate.updated_at = at;
        Ok(aggregate.views)
    }

    async fn aggregate(&self, content: &ContentRef) -> StoreResult<Option<ContentAggregate>> {
        Ok(self.tables.read().await.aggregates.get(content).cloned())
    }
}

#[async_trait]
impl BillingStore for MemoryStore {
    async fn find_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        Ok(self
            .tables
            .read()
            .await
            .subscriptions
            .get(provider_subscription_id)
            .cloned())
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        self.tables.write().await.subscriptions.insert(
            subscription.provider_subscription_id.clone(),
            subscription.clone(),
        );
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables
            .subscriptions
            .get_mut(&subscription.provider_subscription_id)
        {
            *existing = subscription.clone();
        }
        Ok(())
    }

    async fn find_entitlement(&self, user_id: &str) -> StoreResult<Option<UserEntitlement>> {
        Ok(self.tables.read().await.users.get(user_id).cloned())
    }

    async fn ensure_user(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<UserEntitlement> {
        Ok(self
            .tables
            .write()
            .await
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserEntitlement::free(user_id, at))
            .clone())
    }

    async fn save_entitlement(&self, entitlement: &UserEntitlement) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.users.get_mut(&entitlement.user_id) {
            *existing = entitlement.clone();
        }
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
