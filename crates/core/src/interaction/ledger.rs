use std::sync::Arc;

use super::types::{
    Interaction, InteractionSnapshot, VoteAction, VoteKind, VoteOutcome, VoteRequest, Voter,
};
use crate::clock::Clock;
use crate::content::ContentRef;
use crate::error::CoreResult;
use crate::events::types::InteractionEvent;
use crate::events::{CatalogEvent, EventBus};
use crate::store::EngagementStore;

/// Records at most one like/dislike per (content, voter) and keeps the
/// aggregate counters in step.
///
/// The lookup and the row write are separate store calls, so two
/// simultaneous votes from the same voter can still race on the row. The
/// counter side is safe: every change is one relative delta.
#[derive(Clone)]
pub struct InteractionLedger {
    store: Arc<dyn EngagementStore>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl InteractionLedger {
    pub fn new(store: Arc<dyn EngagementStore>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            store,
            clock,
            events,
        }
    }

    pub async fn apply(
        &self,
        content: &ContentRef,
        voter: &Voter,
        request: VoteRequest,
    ) -> CoreResult<VoteOutcome> {
        let now = self.clock.now();
        let existing = self.store.find_interaction(content, voter).await?;
        let previous = existing.as_ref().map(|i| i.kind);

        let outcome = match (request, previous) {
            (VoteRequest::Remove, None) => VoteOutcome {
                action: VoteAction::Removed,
                previous: None,
                current: None,
                toggled: false,
            },
            (VoteRequest::Remove, Some(old)) => {
                self.store.delete_interaction(content, voter).await?;
                self.shift(content, Some(old), None).await?;
                VoteOutcome {
                    action: VoteAction::Removed,
                    previous: Some(old),
                    current: None,
                    toggled: false,
                }
            }
            (VoteRequest::Cast(kind), None) => {
                self.store
                    .insert_interaction(&Interaction {
                        content: content.clone(),
                        voter: voter.clone(),
                        kind,
                        created_at: now,
                    })
                    .await?;
                self.shift(content, None, Some(kind)).await?;
                VoteOutcome {
                    action: VoteAction::New,
                    previous: None,
                    current: Some(kind),
                    toggled: false,
                }
            }
            (VoteRequest::Cast(kind), Some(old)) if old == kind => {
                self.store.delete_interaction(content, voter).await?;
                self.shift(content, Some(old), None).await?;
                VoteOutcome {
                    action: VoteAction::Removed,
                    previous: Some(old),
                    current: None,
                    toggled: true,
                }
            }
            (VoteRequest::Cast(kind), Some(old)) => {
                self.store
                    .update_interaction_kind(content, voter, kind, now)
                    .await?;
                self.shift(content, Some(old), Some(kind)).await?;
                VoteOutcome {
                    action: VoteAction::Changed,
                    previous: Some(old),
                    current: Some(kind),
                    toggled: false,
                }
            }
        };

        tracing::debug!(
            content = %content,
            voter = voter.kind(),
            action = ?outcome.action,
            previous = ?outcome.previous,
            "interaction applied"
        );

        self.events
            .publish(CatalogEvent::InteractionRecorded(InteractionEvent {
                content: content.clone(),
                voter: voter.to_string(),
                action: outcome.action,
                kind: outcome.current,
                previous: outcome.previous,
                timestamp: now,
            }));

        Ok(outcome)
    }

    /// The voter's current stance and the content's vote counters.
    pub async fn snapshot(
        &self,
        content: &ContentRef,
        voter: &Voter,
    ) -> CoreResult<InteractionSnapshot> {
        let interaction = self.store.find_interaction(content, voter).await?;
        let aggregate = self.store.aggregate(content).await?;
        let (likes, dislikes) = aggregate.map_or((0, 0), |a| (a.likes, a.dislikes));
        Ok(InteractionSnapshot {
            user_interaction: interaction.map(|i| i.kind),
            likes,
            dislikes,
        })
    }

    /// Apply the counter change for moving a vote from `from` to `to` as a
    /// single delta.
    async fn shift(
        &self,
        content: &ContentRef,
        from: Option<VoteKind>,
        to: Option<VoteKind>,
    ) -> CoreResult<()> {
        let (mut likes, mut dislikes) = (0, 0);
        if let Some(kind) = from {
            let (l, d) = kind.delta();
            likes -= l;
            dislikes -= d;
        }
        if let Some(kind) = to {
            let (l, d) = kind.delta();
            likes += l;
            dislikes += d;
        }
        if likes != 0 || dislikes != 0 {
            self.store
                .adjust_votes(content, likes, dislikes, self.clock.now())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::identity::resolve_visitor_id;
    use crate::store::MemoryStore;

    fn ledger() -> (Arc<MemoryStore>, InteractionLedger) {
        let store = Arc::new(MemoryStore::new());
        let ledger = InteractionLedger::new(store.clone(), Arc::new(SystemClock), EventBus::new(16));
        (store, ledger)
    }

    fn visitor() -> Voter {
        Voter::Visitor(resolve_visitor_id("1.2.3.4", "test-agent"))
    }

    const LIKE: VoteRequest = VoteRequest::Cast(VoteKind::Like);
    const DISLIKE: VoteRequest = VoteRequest::Cast(VoteKind::Dislike);

    #[tokio::test]
    async fn first_vote_is_new() {
        let (_, ledger) = ledger();
        let content = ContentRef::video("v1").unwrap();

        let outcome = ledger.apply(&content, &visitor(), LIKE).await.unwrap();
        assert_eq!(outcome.action, VoteAction::New);
        assert_eq!(outcome.previous, None);

        let snap = ledger.snapshot(&content, &visitor()).await.unwrap();
        assert_eq!(snap.user_interaction, Some(VoteKind::Like));
        assert_eq!((snap.likes, snap.dislikes), (1, 0));
    }

    #[tokio::test]
    async fn repeating_a_vote_toggles_it_off() {
        let (store, ledger) = ledger();
        let content = ContentRef::video("v1").unwrap();

        ledger.apply(&content, &visitor(), LIKE).await.unwrap();
        let outcome = ledger.apply(&content, &visitor(), LIKE).await.unwrap();

        assert_eq!(outcome.action, VoteAction::Removed);
        assert!(outcome.toggled);
        assert_eq!(outcome.previous, Some(VoteKind::Like));
        assert_eq!(store.interaction_count(&content).await, 0);

        let snap = ledger.snapshot(&content, &visitor()).await.unwrap();
        assert_eq!((snap.likes, snap.dislikes), (0, 0));
        assert_eq!(snap.user_interaction, None);
    }

    #[tokio::test]
    async fn switching_kind_moves_the_count() {
        let (store, ledger) = ledger();
        let content = ContentRef::video("v1").unwrap();
        // Another visitor's like must survive untouched.
        let other = Voter::Visitor(resolve_visitor_id("5.6.7.8", "test-agent"));
        ledger.apply(&content, &other, LIKE).await.unwrap();

        ledger.apply(&content, &visitor(), LIKE).await.unwrap();
        let outcome = ledger.apply(&content, &visitor(), DISLIKE).await.unwrap();

        assert_eq!(outcome.action, VoteAction::Changed);
        assert_eq!(outcome.previous, Some(VoteKind::Like));
        assert_eq!(outcome.current, Some(VoteKind::Dislike));

        let snap = ledger.snapshot(&content, &visitor()).await.unwrap();
        assert_eq!(snap.user_interaction, Some(VoteKind::Dislike));
        assert_eq!((snap.likes, snap.dislikes), (1, 1));
        assert_eq!(store.interaction_count(&content).await, 2);
    }

    #[tokio::test]
    async fn remove_deletes_existing_vote() {
        let (_, ledger) = ledger();
        let content = ContentRef::video("v1").unwrap();

        ledger.apply(&content, &visitor(), DISLIKE).await.unwrap();
        let outcome = ledger
            .apply(&content, &visitor(), VoteRequest::Remove)
            .await
            .unwrap();

        assert_eq!(outcome.action, VoteAction::Removed);
        assert_eq!(outcome.previous, Some(VoteKind::Dislike));
        assert!(!outcome.toggled);

        let snap = ledger.snapshot(&content, &visitor()).await.unwrap();
        assert_eq!((snap.likes, snap.dislikes), (0, 0));
    }

    #[tokio::test]
    async fn remove_without_vote_is_a_no_op() {
        let (store, ledger) = ledger();
        let content = ContentRef::video("v1").unwrap();

        let outcome = ledger
            .apply(&content, &visitor(), VoteRequest::Remove)
            .await
            .unwrap();

        assert_eq!(outcome.action, VoteAction::Removed);
        assert_eq!(outcome.previous, None);
        assert!(store.aggregate(&content).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn visitor_and_user_votes_are_separate() {
        let (_, ledger) = ledger();
        let content = ContentRef::video("v1").unwrap();
        let user = Voter::user("u1").unwrap();

        ledger.apply(&content, &visitor(), LIKE).await.unwrap();
        let outcome = ledger.apply(&content, &user, LIKE).await.unwrap();
        assert_eq!(outcome.action, VoteAction::New);

        let snap = ledger.snapshot(&content, &user).await.unwrap();
        assert_eq!(snap.likes, 2);
    }

    #[tokio::test]
    async fn votes_publish_events() {
        let store = Arc::new(MemoryStore::new());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let ledger = InteractionLedger::new(store, Arc::new(SystemClock), bus);
        let content = ContentRef::video("v1").unwrap();

        ledger.apply(&content, &visitor(), LIKE).await.unwrap();

        match rx.recv().await.unwrap() {
            CatalogEvent::InteractionRecorded(event) => {
                assert_eq!(event.action, VoteAction::New);
                assert_eq!(event.kind, Some(VoteKind::Like));
                assert!(event.voter.starts_with("visitor:"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
