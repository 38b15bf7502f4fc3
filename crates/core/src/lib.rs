//! Engagement and billing core for the catalog: visitor identity, rate
//! gates, the like/dislike ledger, view counting and the subscription
//! state machine, plus the stores they persist through.

pub mod billing;
pub mod clock;
pub mod content;
pub mod error;
pub mod events;
pub mod identity;
pub mod interaction;
pub mod ratelimit;
pub mod store;
pub mod views;
