use std::sync::Arc;

use catalog_core::billing::SubscriptionMachine;
use catalog_core::clock::Clock;
use catalog_core::events::EventBus;
use catalog_core::interaction::InteractionLedger;
use catalog_core::ratelimit::{CooldownGate, RateGate, WindowLimiter};
use catalog_core::store::{BillingStore, EngagementStore, StoreHealth};
use catalog_core::views::ViewCounter;
use chrono::Duration;

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: AppConfig,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    ledger: InteractionLedger,
    views: ViewCounter,
    billing: SubscriptionMachine,
    billing_store: Arc<dyn BillingStore>,
    store_health: Arc<dyn StoreHealth>,
    vote_limiter: Arc<dyn RateGate>,
}

impl AppState {
    pub fn new<S>(config: AppConfig, store: Arc<S>, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self
    where
        S: EngagementStore + BillingStore + StoreHealth + 'static,
    {
        let cooldown = Duration::seconds(config.view_cooldown_secs as i64);
        let view_gate = Arc::new(CooldownGate::new(
            cooldown,
            config.rate_limit_sweep_probability,
        ));
        let vote_limiter = Arc::new(WindowLimiter::new(
            config.interaction_limit_max,
            Duration::seconds(config.interaction_limit_window_secs as i64),
            config.rate_limit_sweep_probability,
        ));

        let ledger = InteractionLedger::new(store.clone(), clock.clone(), event_bus.clone());
        let views = ViewCounter::new(store.clone(), view_gate, clock.clone(), event_bus.clone());
        let billing = SubscriptionMachine::new(store.clone(), clock.clone(), event_bus.clone());

        Self {
            inner: Arc::new(InnerState {
                config,
                clock,
                event_bus,
                ledger,
                views,
                billing,
                billing_store: store.clone(),
                store_health: store,
                vote_limiter,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.inner.event_bus
    }

    pub fn ledger(&self) -> &InteractionLedger {
        &self.inner.ledger
    }

    pub fn views(&self) -> &ViewCounter {
        &self.inner.views
    }

    pub fn billing(&self) -> &SubscriptionMachine {
        &self.inner.billing
    }

    pub fn billing_store(&self) -> &dyn BillingStore {
        self.inner.billing_store.as_ref()
    }

    pub fn store_health(&self) -> &dyn StoreHealth {
        self.inner.store_health.as_ref()
    }

    pub fn vote_limiter(&self) -> &dyn RateGate {
        self.inner.vote_limiter.as_ref()
    }
}
