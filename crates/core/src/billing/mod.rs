//! Lemon Squeezy subscription mirroring.
//!
//! Webhooks are verified ([`signature`]), parsed into a typed
//! [`webhook::WebhookEvent`], then applied by [`machine::SubscriptionMachine`]
//! to the subscription row and the owning user's entitlement.

pub mod machine;
pub mod signature;
pub mod types;
pub mod webhook;

pub use machine::{SubscriptionMachine, TransitionOutcome};
pub use signature::{verify_signature, SignatureError, SIGNATURE_HEADER};
pub use types::{Subscription, SubscriptionStatus, UserEntitlement};
pub use webhook::{WebhookEvent, WebhookParseError};
