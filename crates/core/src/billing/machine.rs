use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Subscription, SubscriptionStatus, UserEntitlement};
use super::webhook::{
    SubscriptionCancelled, SubscriptionCreated, SubscriptionExpired, SubscriptionUpdated,
    WebhookEvent,
};
use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::events::types::EntitlementEvent;
use crate::events::{CatalogEvent, EventBus};
use crate::store::BillingStore;

/// What applying a webhook event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied {
        subscription: Subscription,
        entitlement: UserEntitlement,
    },
    /// Event type we do not act on.
    Ignored { event_name: String },
}

/// Mirrors provider subscription state into local rows and the user's
/// entitlement. The provider is authoritative; this never derives a state
/// on its own.
#[derive(Clone)]
pub struct SubscriptionMachine {
    store: Arc<dyn BillingStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SubscriptionMachine {
    pub fn new(store: Arc<dyn BillingStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    /// Apply one verified webhook event.
    pub async fn apply(&self, event: WebhookEvent) -> CoreResult<TransitionOutcome> {
        let now = self.clock.now();
        let event_name = event.event_name().to_string();

        let (subscription, entitlement) = match event {
            WebhookEvent::SubscriptionCreated(created) => self.created(created, now).await?,
            WebhookEvent::SubscriptionUpdated(updated) => self.updated(updated, now).await?,
            WebhookEvent::SubscriptionCancelled(cancelled) => {
                self.cancelled(cancelled, now).await?
            }
            WebhookEvent::SubscriptionExpired(expired) => self.expired(expired, now).await?,
            WebhookEvent::Other { event_name } => {
                tracing::info!(event = %event_name, "webhook event acknowledged without changes");
                return Ok(TransitionOutcome::Ignored { event_name });
            }
        };

        tracing::info!(
            event = %event_name,
            user_id = %entitlement.user_id,
            subscription_id = %subscription.provider_subscription_id,
            status = %subscription.status,
            is_premium = entitlement.is_premium,
            "subscription transition applied"
        );

        self.events
            .publish(CatalogEvent::EntitlementChanged(EntitlementEvent {
                user_id: entitlement.user_id.clone(),
                event_name,
                provider_subscription_id: subscription.provider_subscription_id.clone(),
                is_premium: entitlement.is_premium,
                premium_expires_at: entitlement.premium_expires_at,
                timestamp: now,
            }));

        Ok(TransitionOutcome::Applied {
            subscription,
            entitlement,
        })
    }

    async fn created(
        &self,
        event: SubscriptionCreated,
        now: DateTime<Utc>,
    ) -> CoreResult<(Subscription, UserEntitlement)> {
        let user_id = event.user_id.ok_or_else(|| {
            CoreError::MissingReference("meta.custom_data.user_id".to_string())
        })?;
        let existing = self
            .store
            .find_subscription(&event.provider_subscription_id)
            .await?;

        // A subscription keeps the owner it was created for.
        let owner = match &existing {
            Some(existing) if existing.user_id != user_id => {
                tracing::warn!(
                    subscription_id = %existing.provider_subscription_id,
                    owner = %existing.user_id,
                    claimed_by = %user_id,
                    "subscription_created names a different user, keeping the original owner"
                );
                existing.user_id.clone()
            }
            _ => user_id,
        };
        let mut entitlement = self.store.ensure_user(&owner, now).await?;

        let subscription = match existing {
            Some(mut existing) => {
                tracing::warn!(
                    subscription_id = %existing.provider_subscription_id,
                    "subscription_created for a known subscription, updating in place"
                );
                existing.status = event.status;
                existing.provider_order_id = event.provider_order_id.or(existing.provider_order_id);
                existing.provider_product_id =
                    event.provider_product_id.or(existing.provider_product_id);
                existing.provider_variant_id =
                    event.provider_variant_id.or(existing.provider_variant_id);
                existing.provider_customer_id =
                    event.provider_customer_id.clone().or(existing.provider_customer_id);
                existing.current_period_end = event.renews_at.or(event.ends_at);
                existing.updated_at = now;
                self.store.update_subscription(&existing).await?;
                existing
            }
            None => {
                let subscription = Subscription {
                    id: Uuid::now_v7(),
                    user_id: owner.clone(),
                    provider_subscription_id: event.provider_subscription_id,
                    provider_order_id: event.provider_order_id,
                    provider_product_id: event.provider_product_id,
                    provider_variant_id: event.provider_variant_id,
                    provider_customer_id: event.provider_customer_id.clone(),
                    status: event.status,
                    current_period_end: event.renews_at.or(event.ends_at),
                    cancelled_at: None,
                    created_at: now,
                    updated_at: now,
                };
                self.store.insert_subscription(&subscription).await?;
                subscription
            }
        };

        entitlement.grant(true, event.renews_at, now);
        if let Some(customer_id) = event.provider_customer_id {
            entitlement.provider_customer_id = Some(customer_id);
        }
        entitlement.provider_subscription_id = Some(subscription.provider_subscription_id.clone());
        self.store.save_entitlement(&entitlement).await?;

        Ok((subscription, entitlement))
    }

    async fn updated(
        &self,
        event: SubscriptionUpdated,
        now: DateTime<Utc>,
    ) -> CoreResult<(Subscription, UserEntitlement)> {
        let mut subscription = self.subscription(&event.provider_subscription_id).await?;
        let period_end = event.renews_at.or(event.ends_at);

        if event.status == SubscriptionStatus::Cancelled && subscription.cancelled_at.is_none() {
            subscription.cancelled_at = Some(now);
        }
        subscription.status = event.status;
        subscription.current_period_end = period_end;
        if event.provider_customer_id.is_some() {
            subscription.provider_customer_id = event.provider_customer_id.clone();
        }
        subscription.updated_at = now;
        self.store.update_subscription(&subscription).await?;

        let mut entitlement = self.entitlement(&subscription.user_id).await?;
        entitlement.grant(subscription.status.grants_premium(), period_end, now);
        if let Some(customer_id) = event.provider_customer_id {
            entitlement.provider_customer_id = Some(customer_id);
        }
        self.store.save_entitlement(&entitlement).await?;

        Ok((subscription, entitlement))
    }

    async fn cancelled(
        &self,
        event: SubscriptionCancelled,
        now: DateTime<Utc>,
    ) -> CoreResult<(Subscription, UserEntitlement)> {
        let mut subscription = self.subscription(&event.provider_subscription_id).await?;
        let mut entitlement = self.entitlement(&subscription.user_id).await?;

        // Access runs to the end of the paid period.
        let access_ends = event
            .ends_at
            .or(subscription.current_period_end)
            .or(entitlement.premium_expires_at);

        subscription.status = SubscriptionStatus::Cancelled;
        subscription.cancelled_at = Some(now);
        if event.ends_at.is_some() {
            subscription.current_period_end = event.ends_at;
        }
        subscription.updated_at = now;
        self.store.update_subscription(&subscription).await?;

        let still_premium = entitlement.is_premium;
        entitlement.grant(still_premium, access_ends, now);
        self.store.save_entitlement(&entitlement).await?;

        Ok((subscription, entitlement))
    }

    async fn expired(
        &self,
        event: SubscriptionExpired,
        now: DateTime<Utc>,
    ) -> CoreResult<(Subscription, UserEntitlement)> {
        let mut subscription = self.subscription(&event.provider_subscription_id).await?;

        subscription.status = SubscriptionStatus::Expired;
        subscription.updated_at = now;
        self.store.update_subscription(&subscription).await?;

        let mut entitlement = self.entitlement(&subscription.user_id).await?;
        entitlement.revoke(now);
        self.store.save_entitlement(&entitlement).await?;

        Ok((subscription, entitlement))
    }

    async fn subscription(&self, provider_subscription_id: &str) -> CoreResult<Subscription> {
        self.store
            .find_subscription(provider_subscription_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("subscription {provider_subscription_id}")))
    }

    async fn entitlement(&self, user_id: &str) -> CoreResult<UserEntitlement> {
        self.store
            .find_entitlement(user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("user {user_id}")))
    }
}
