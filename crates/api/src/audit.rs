use catalog_core::events::{CatalogEvent, EventBus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Log every domain event as a structured line. Ends when the bus closes.
pub fn spawn(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "audit log fell behind the event bus");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn log_event(event: &CatalogEvent) {
    match event {
        CatalogEvent::InteractionRecorded(e) => tracing::info!(
            target: "audit",
            content = %e.content,
            voter = %e.voter,
            action = ?e.action,
            kind = ?e.kind,
            previous = ?e.previous,
            "interaction recorded"
        ),
        CatalogEvent::ViewCounted(e) => tracing::info!(
            target: "audit",
            content = %e.content,
            views = e.views,
            "view counted"
        ),
        CatalogEvent::EntitlementChanged(e) => tracing::info!(
            target: "audit",
            user_id = %e.user_id,
            event = %e.event_name,
            subscription_id = %e.provider_subscription_id,
            is_premium = e.is_premium,
            "entitlement changed"
        ),
    }
}
