//! SQLite-backed stores.
//!
//! Counter changes are single upserts with relative updates, so concurrent
//! votes and views never lose increments. The interaction row itself is
//! still read and written in separate statements.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use super::{BillingStore, EngagementStore, StoreError, StoreHealth, StoreResult};
use crate::billing::types::{Subscription, SubscriptionStatus, UserEntitlement};
use crate::content::{ContentAggregate, ContentRef, ContentType};
use crate::interaction::{Interaction, VoteKind, Voter};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// A private in-memory database. One connection that never idles out,
    /// otherwise the database would vanish with it.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn content_from_row(row: &SqliteRow) -> StoreResult<ContentRef> {
    let content_type: String = row.try_get("content_type")?;
    let content_id: String = row.try_get("content_id")?;
    let content_type = ContentType::from_str(&content_type)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    ContentRef::new(content_type, &content_id).map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn interaction_from_row(row: &SqliteRow, content: &ContentRef, voter: &Voter) -> StoreResult<Interaction> {
    let kind: String = row.try_get("kind")?;
    let kind = VoteKind::from_str(&kind).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(Interaction {
        content: content.clone(),
        voter: voter.clone(),
        kind,
        created_at: row.try_get("created_at")?,
    })
}

fn subscription_from_row(row: &SqliteRow) -> StoreResult<Subscription> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    Ok(Subscription {
        id: Uuid::parse_str(&id).map_err(|e| StoreError::Corrupt(format!("subscription id: {e}")))?,
        user_id: row.try_get("user_id")?,
        provider_subscription_id: row.try_get("provider_subscription_id")?,
        provider_order_id: row.try_get("provider_order_id")?,
        provider_product_id: row.try_get("provider_product_id")?,
        provider_variant_id: row.try_get("provider_variant_id")?,
        provider_customer_id: row.try_get("provider_customer_id")?,
        status: SubscriptionStatus::parse(&status),
        current_period_end: row.try_get("current_period_end")?,
        cancelled_at: row.try_get("cancelled_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn entitlement_from_row(row: &SqliteRow) -> StoreResult<UserEntitlement> {
    Ok(UserEntitlement {
        user_id: row.try_get("id")?,
        is_premium: row.try_get("is_premium")?,
        premium_expires_at: row.try_get("premium_expires_at")?,
        provider_customer_id: row.try_get("provider_customer_id")?,
        provider_subscription_id: row.try_get("provider_subscription_id")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl EngagementStore for SqliteStore {
    async fn find_interaction(
        &self,
        content: &ContentRef,
        voter: &Voter,
    ) -> StoreResult<Option<Interaction>> {
        let row = sqlx::query(
            "SELECT kind, created_at FROM interactions \
             WHERE content_type = ? AND content_id = ? AND voter_kind = ? AND voter_id = ?",
        )
        .bind(content.content_type.as_str())
        .bind(&content.content_id)
        .bind(voter.kind())
        .bind(voter.id())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| interaction_from_row(&row, content, voter))
            .transpose()
    }

    async fn insert_interaction(&self, interaction: &Interaction) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO interactions (content_type, content_id, voter_kind, voter_id, kind, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(interaction.content.content_type.as_str())
        .bind(&interaction.content.content_id)
        .bind(interaction.voter.kind())
        .bind(interaction.voter.id())
        .bind(interaction.kind.as_str())
        .bind(interaction.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_interaction_kind(
        &self,
        content: &ContentRef,
        voter: &Voter,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "UPDATE interactions SET kind = ?, created_at = ? \
             WHERE content_type = ? AND content_id = ? AND voter_kind = ? AND voter_id = ?",
        )
        .bind(kind.as_str())
        .bind(at)
        .bind(content.content_type.as_str())
        .bind(&content.content_id)
        .bind(voter.kind())
        .bind(voter.id())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_interaction(&self, content: &ContentRef, voter: &Voter) -> StoreResult<()> {
        sqlx::query(
            "DELETE FROM interactions \
             WHERE content_type = ? AND content_id = ? AND voter_kind = ? AND voter_id = ?",
        )
        .bind(content.content_type.as_str())
        .bind(&content.content_id)
        .bind(voter.kind())
        .bind(voter.id())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn adjust_votes(
        &self,
        content: &ContentRef,
        likes: i64,
        dislikes: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO content_stats (content_type, content_id, views, likes, dislikes, updated_at) \
             VALUES (?, ?, 0, ?, ?, ?) \
             ON CONFLICT (content_type, content_id) DO UPDATE SET \
                likes = likes + excluded.likes, \
                dislikes = dislikes + excluded.dislikes, \
                updated_at = excluded.updated_at",
        )
        .bind(content.content_type.as_str())
        .bind(&content.content_id)
        .bind(likes)
        .bind(dislikes)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_views(&self, content: &ContentRef, at: DateTime<Utc>) -> StoreResult<i64> {
        let views: i64 = sqlx::query_scalar(
            "INSERT INTO content_stats (content_type, content_id, views, likes, dislikes, updated_at) \
             VALUES (?, ?, 1, 0, 0, ?) \
             ON CONFLICT (content_type, content_id) DO UPDATE SET \
                views = views + 1, \
                updated_at = excluded.updated_at \
             RETURNING views",
        )
        .bind(content.content_type.as_str())
        .bind(&content.content_id)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;
        Ok(views)
    }

    async fn aggregate(&self, content: &ContentRef) -> StoreResult<Option<ContentAggregate>> {
        let row = sqlx::query(
            "SELECT content_type, content_id, views, likes, dislikes, updated_at \
             FROM content_stats WHERE content_type = ? AND content_id = ?",
        )
        .bind(content.content_type.as_str())
        .bind(&content.content_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(ContentAggregate {
                content: content_from_row(&row)?,
                views: row.try_get("views")?,
                likes: row.try_get("likes")?,
                dislikes: row.try_get("dislikes")?,
                updated_at: row.try_get("updated_at")?,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl BillingStore for SqliteStore {
    async fn find_subscription(
        &self,
        provider_subscription_id: &str,
    ) -> StoreResult<Option<Subscription>> {
        let row = sqlx::query("SELECT * FROM subscriptions WHERE provider_subscription_id = ?")
            .bind(provider_subscription_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| subscription_from_row(&row)).transpose()
    }

    async fn insert_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO subscriptions (id, user_id, provider_subscription_id, provider_order_id, \
                provider_product_id, provider_variant_id, provider_customer_id, status, \
                current_period_end, cancelled_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(subscription.id.to_string())
        .bind(&subscription.user_id)
        .bind(&subscription.provider_subscription_id)
        .bind(&subscription.provider_order_id)
        .bind(&subscription.provider_product_id)
        .bind(&subscription.provider_variant_id)
        .bind(&subscription.provider_customer_id)
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end)
        .bind(subscription.cancelled_at)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_subscription(&self, subscription: &Subscription) -> StoreResult<()> {
        sqlx::query(
            "UPDATE subscriptions SET user_id = ?, provider_order_id = ?, provider_product_id = ?, \
                provider_variant_id = ?, provider_customer_id = ?, status = ?, \
                current_period_end = ?, cancelled_at = ?, updated_at = ? \
             WHERE provider_subscription_id = ?",
        )
        .bind(&subscription.user_id)
        .bind(&subscription.provider_order_id)
        .bind(&subscription.provider_product_id)
        .bind(&subscription.provider_variant_id)
        .bind(&subscription.provider_customer_id)
        .bind(subscription.status.as_str())
        .bind(subscription.current_period_end)
        .bind(subscription.cancelled_at)
        .bind(subscription.updated_at)
        .bind(&subscription.provider_subscription_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_entitlement(&self, user_id: &str) -> StoreResult<Option<UserEntitlement>> {
        let row = sqlx::query(
            "SELECT id, is_premium, premium_expires_at, provider_customer_id, \
                provider_subscription_id, updated_at \
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| entitlement_from_row(&row)).transpose()
    }

    async fn ensure_user(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<UserEntitlement> {
        sqlx::query(
            "INSERT INTO users (id, is_premium, created_at, updated_at) \
             VALUES (?, 0, ?, ?) ON CONFLICT (id) DO NOTHING",
        )
        .bind(user_id)
        .bind(at)
        .bind(at)
        .execute(&self.pool)
        .await?;
        self.find_entitlement(user_id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("user {user_id} vanished after insert")))
    }

    async fn save_entitlement(&self, entitlement: &UserEntitlement) -> StoreResult<()> {
        sqlx::query(
            "UPDATE users SET is_premium = ?, premium_expires_at = ?, provider_customer_id = ?, \
                provider_subscription_id = ?, updated_at = ? \
             WHERE id = ?",
        )
        .bind(entitlement.is_premium)
        .bind(entitlement.premium_expires_at)
        .bind(&entitlement.provider_customer_id)
        .bind(&entitlement.provider_subscription_id)
        .bind(entitlement.updated_at)
        .bind(&entitlement.user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl StoreHealth for SqliteStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve_visitor_id;
    use chrono::{Duration, TimeZone};

    async fn store() -> SqliteStore {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn views_upsert_and_increment() {
        let store = store().await;
        let content = ContentRef::video("v1").unwrap();
        let now = Utc::now();

        assert_eq!(store.increment_views(&content, now).await.unwrap(), 1);
        assert_eq!(store.increment_views(&content, now).await.unwrap(), 2);

        let agg = store.aggregate(&content).await.unwrap().unwrap();
        assert_eq!(agg.views, 2);
        assert_eq!(agg.content, content);

        let other = ContentRef::new(ContentType::Picture, "v1").unwrap();
        assert!(store.aggregate(&other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn vote_deltas_are_relative() {
        let store = store().await;
        let content = ContentRef::video("v1").unwrap();
        let now = Utc::now();

        store.adjust_votes(&content, 1, 0, now).await.unwrap();
        store.adjust_votes(&content, 1, 0, now).await.unwrap();
        store.adjust_votes(&content, -1, 1, now).await.unwrap();
        store.increment_views(&content, now).await.unwrap();

        let agg = store.aggregate(&content).await.unwrap().unwrap();
        assert_eq!((agg.views, agg.likes, agg.dislikes), (1, 1, 1));
    }

    #[tokio::test]
    async fn interaction_lifecycle() {
        let store = store().await;
        let content = ContentRef::video("v1").unwrap();
        let voter = Voter::Visitor(resolve_visitor_id("1.2.3.4", "ua"));
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();

        store
            .insert_interaction(&Interaction {
                content: content.clone(),
                voter: voter.clone(),
                kind: VoteKind::Like,
                created_at: t0,
            })
            .await
            .unwrap();

        let found = store.find_interaction(&content, &voter).await.unwrap().unwrap();
        assert_eq!(found.kind, VoteKind::Like);
        assert_eq!(found.created_at, t0);

        let t1 = t0 + Duration::minutes(5);
        store
            .update_interaction_kind(&content, &voter, VoteKind::Dislike, t1)
            .await
            .unwrap();
        let found = store.find_interaction(&content, &voter).await.unwrap().unwrap();
        assert_eq!((found.kind, found.created_at), (VoteKind::Dislike, t1));

        // Same id under a different voter kind is a different voter.
        let as_user = Voter::User(voter.id().to_string());
        assert!(store.find_interaction(&content, &as_user).await.unwrap().is_none());

        store.delete_interaction(&content, &voter).await.unwrap();
        assert!(store.find_interaction(&content, &voter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_interaction_insert_is_rejected() {
        let store = store().await;
        let interaction = Interaction {
            content: ContentRef::video("v1").unwrap(),
            voter: Voter::user("u1").unwrap(),
            kind: VoteKind::Like,
            created_at: Utc::now(),
        };
        store.insert_interaction(&interaction).await.unwrap();
        assert!(store.insert_interaction(&interaction).await.is_err());
    }

    #[tokio::test]
    async fn subscriptions_and_entitlements_round_trip() {
        let store = store().await;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        store.ensure_user("u1", now).await.unwrap();

        let mut subscription = Subscription {
            id: Uuid::now_v7(),
            user_id: "u1".to_string(),
            provider_subscription_id: "sub_1".to_string(),
            provider_order_id: Some("7".to_string()),
            provider_product_id: None,
            provider_variant_id: Some("9".to_string()),
            provider_customer_id: Some("42".to_string()),
            status: SubscriptionStatus::OnTrial,
            current_period_end: Some(now + Duration::days(14)),
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        store.insert_subscription(&subscription).await.unwrap();
        assert_eq!(
            store.find_subscription("sub_1").await.unwrap(),
            Some(subscription.clone())
        );

        subscription.status = SubscriptionStatus::Other("suspended".to_string());
        subscription.cancelled_at = Some(now);
        store.update_subscription(&subscription).await.unwrap();
        let stored = store.find_subscription("sub_1").await.unwrap().unwrap();
        assert_eq!(stored.status.as_str(), "suspended");
        assert_eq!(stored.cancelled_at, Some(now));

        let mut ent = store.find_entitlement("u1").await.unwrap().unwrap();
        assert!(!ent.is_premium);
        ent.is_premium = true;
        ent.premium_expires_at = Some(now + Duration::days(30));
        ent.provider_subscription_id = Some("sub_1".to_string());
        ent.updated_at = now;
        store.save_entitlement(&ent).await.unwrap();
        assert_eq!(store.find_entitlement("u1").await.unwrap(), Some(ent));
    }

    #[tokio::test]
    async fn ensure_user_registers_once() {
        let store = store().await;
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(store.find_entitlement("u1").await.unwrap().is_none());

        let fresh = store.ensure_user("u1", now).await.unwrap();
        assert!(!fresh.is_premium);
        assert_eq!(fresh.premium_expires_at, None);

        let mut ent = fresh.clone();
        ent.is_premium = true;
        ent.premium_expires_at = Some(now + Duration::days(30));
        store.save_entitlement(&ent).await.unwrap();

        let again = store.ensure_user("u1", now + Duration::days(1)).await.unwrap();
        assert_eq!(again, ent);
    }

    #[tokio::test]
    async fn subscription_requires_existing_user() {
        let store = store().await;
        let now = Utc::now();
        let orphan = Subscription {
            id: Uuid::now_v7(),
            user_id: "ghost".to_string(),
            provider_subscription_id: "sub_x".to_string(),
            provider_order_id: None,
            provider_product_id: None,
            provider_variant_id: None,
            provider_customer_id: None,
            status: SubscriptionStatus::Active,
            current_period_end: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(store.insert_subscription(&orphan).await.is_err());
    }

    #[tokio::test]
    async fn ping_succeeds() {
        store().await.ping().await.unwrap();
    }
}
