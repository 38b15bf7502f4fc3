//! View counting behind the cooldown gate.
//!
//! Views are non-critical telemetry: once the gate admits a view, a
//! failing store is logged and the caller still sees `counted = true`.

use std::sync::Arc;

use crate::clock::Clock;
use crate::content::ContentRef;
use crate::error::CoreResult;
use crate::events::types::ViewEvent;
use crate::events::{CatalogEvent, EventBus};
use crate::ratelimit::RateGate;
use crate::store::EngagementStore;

pub const NOT_COUNTED_MESSAGE: &str = "View already counted recently";
pub const DEGRADED_WARNING: &str = "View acknowledged but could not be stored";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOutcome {
    pub counted: bool,
    /// New total when the write went through.
    pub views: Option<i64>,
    pub message: Option<&'static str>,
    pub warning: Option<&'static str>,
}

#[derive(Clone)]
pub struct ViewCounter {
    store: Arc<dyn EngagementStore>,
    gate: Arc<dyn RateGate>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl ViewCounter {
    pub fn new(
        store: Arc<dyn EngagementStore>,
        gate: Arc<dyn RateGate>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            store,
            gate,
            clock,
            events,
        }
    }

    /// Count one view of `content` by `visitor_key` unless that visitor
    /// already viewed it inside the cooldown window.
    pub async fn record(&self, content: &ContentRef, visitor_key: &str) -> ViewOutcome {
        let now = self.clock.now();
        let key = format!("views:{visitor_key}:{}:{}", content.content_type, content.content_id);

        if !self.gate.admit(&key, now).is_admitted() {
            return ViewOutcome {
                counted: false,
                views: None,
                message: Some(NOT_COUNTED_MESSAGE),
                warning: None,
            };
        }

        match self.store.increment_views(content, now).await {
            Ok(views) => {
                self.events.publish(CatalogEvent::ViewCounted(ViewEvent {
                    content: content.clone(),
                    views,
                    timestamp: now,
                }));
                ViewOutcome {
                    counted: true,
                    views: Some(views),
                    message: None,
                    warning: None,
                }
            }
            Err(err) => {
                tracing::warn!(
                    content = %content,
                    degraded = true,
                    error = %err,
                    "view admitted but increment failed"
                );
                ViewOutcome {
                    counted: true,
                    views: None,
                    message: None,
                    warning: Some(DEGRADED_WARNING),
                }
            }
        }
    }

    /// Current view total, zero for content never viewed.
    pub async fn views(&self, content: &ContentRef) -> CoreResult<i64> {
        Ok(self
            .store
            .aggregate(content)
            .await?
            .map_or(0, |aggregate| aggregate.views))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::content::{ContentAggregate, ContentType};
    use crate::interaction::{Interaction, VoteKind, Voter};
    use crate::ratelimit::CooldownGate;
    use crate::store::{MemoryStore, StoreError, StoreResult};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    fn counter(store: Arc<dyn EngagementStore>) -> (Arc<ManualClock>, ViewCounter) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let gate = Arc::new(CooldownGate::new(Duration::seconds(30), 0.0));
        let counter = ViewCounter::new(store, gate, clock.clone(), EventBus::new(16));
        (clock, counter)
    }

    #[tokio::test]
    async fn counts_once_per_cooldown_window() {
        let (clock, counter) = counter(Arc::new(MemoryStore::new()));
        let video = ContentRef::video("v1").unwrap();

        let first = counter.record(&video, "1.2.3.4").await;
        assert!(first.counted);
        assert_eq!(first.views, Some(1));

        clock.advance(Duration::seconds(10));
        let second = counter.record(&video, "1.2.3.4").await;
        assert!(!second.counted);
        assert_eq!(second.message, Some(NOT_COUNTED_MESSAGE));
        assert_eq!(counter.views(&video).await.unwrap(), 1);

        clock.advance(Duration::seconds(21));
        let third = counter.record(&video, "1.2.3.4").await;
        assert!(third.counted);
        assert_eq!(counter.views(&video).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn gate_key_includes_content_type_and_visitor() {
        let (_, counter) = counter(Arc::new(MemoryStore::new()));
        let video = ContentRef::video("x").unwrap();
        let picture = ContentRef::new(ContentType::Picture, "x").unwrap();

        assert!(counter.record(&video, "1.2.3.4").await.counted);
        assert!(counter.record(&picture, "1.2.3.4").await.counted);
        assert!(counter.record(&video, "9.9.9.9").await.counted);
        assert_eq!(counter.views(&video).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn unknown_content_has_zero_views() {
        let (_, counter) = counter(Arc::new(MemoryStore::new()));
        let video = ContentRef::video("never-seen").unwrap();
        assert_eq!(counter.views(&video).await.unwrap(), 0);
    }

    /// Engagement store whose writes always fail.
    struct BrokenStore;

    fn down<T>() -> StoreResult<T> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    #[async_trait]
    impl EngagementStore for BrokenStore {
        async fn find_interaction(&self, _: &ContentRef, _: &Voter) -> StoreResult<Option<Interaction>> {
            down()
        }
        async fn insert_interaction(&self, _: &Interaction) -> StoreResult<()> {
            down()
        }
        async fn update_interaction_kind(
            &self,
            _: &ContentRef,
            _: &Voter,
            _: VoteKind,
            _: DateTime<Utc>,
        ) -> StoreResult<()> {
            down()
        }
        async fn delete_interaction(&self, _: &ContentRef, _: &Voter) -> StoreResult<()> {
            down()
        }
        async fn adjust_votes(&self, _: &ContentRef, _: i64, _: i64, _: DateTime<Utc>) -> StoreResult<()> {
            down()
        }
        async fn increment_views(&self, _: &ContentRef, _: DateTime<Utc>) -> StoreResult<i64> {
            down()
        }
        async fn aggregate(&self, _: &ContentRef) -> StoreResult<Option<ContentAggregate>> {
            down()
        }
    }

    #[tokio::test]
    async fn storage_failure_after_admission_is_soft_success() {
        let (_, counter) = counter(Arc::new(BrokenStore));
        let video = ContentRef::video("v1").unwrap();

        let outcome = counter.record(&video, "1.2.3.4").await;
        assert!(outcome.counted);
        assert_eq!(outcome.views, None);
        assert_eq!(outcome.warning, Some(DEGRADED_WARNING));

        assert!(counter.views(&video).await.is_err());
    }
}
