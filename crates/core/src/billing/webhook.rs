//! Typed view of Lemon Squeezy webhook payloads.
//!
//! The provider sends `{ meta: { event_name, custom_data }, data: { id,
//! attributes } }`. Only the subscription lifecycle events are modelled;
//! everything else parses to [`WebhookEvent::Other`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

use super::types::SubscriptionStatus;
use crate::error::CoreError;

#[derive(Debug, Error)]
pub enum WebhookParseError {
    #[error("malformed webhook payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("webhook payload is missing {0}")]
    MissingField(&'static str),
}

impl From<WebhookParseError> for CoreError {
    fn from(err: WebhookParseError) -> Self {
        CoreError::InvalidInput(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCreated {
    /// From `meta.custom_data.user_id`, set at checkout.
    pub user_id: Option<String>,
    pub provider_subscription_id: String,
    pub provider_order_id: Option<String>,
    pub provider_product_id: Option<String>,
    pub provider_variant_id: Option<String>,
    pub provider_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub renews_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdated {
    pub provider_subscription_id: String,
    pub provider_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub renews_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCancelled {
    pub provider_subscription_id: String,
    pub ends_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionExpired {
    pub provider_subscription_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    SubscriptionCreated(SubscriptionCreated),
    SubscriptionUpdated(SubscriptionUpdated),
    SubscriptionCancelled(SubscriptionCancelled),
    SubscriptionExpired(SubscriptionExpired),
    /// Any event we do not act on. Acknowledged and logged.
    Other { event_name: String },
}

impl WebhookEvent {
    pub fn event_name(&self) -> &str {
        match self {
            WebhookEvent::SubscriptionCreated(_) => "subscription_created",
            WebhookEvent::SubscriptionUpdated(_) => "subscription_updated",
            WebhookEvent::SubscriptionCancelled(_) => "subscription_cancelled",
            WebhookEvent::SubscriptionExpired(_) => "subscription_expired",
            WebhookEvent::Other { event_name } => event_name,
        }
    }

    /// Parse an already verified request body.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookParseError> {
        let raw: RawWebhook = serde_json::from_slice(body)?;
        let event_name = raw.meta.event_name.trim().to_string();
        if event_name.is_empty() {
            return Err(WebhookParseError::MissingField("meta.event_name"));
        }

        let event = match event_name.as_str() {
            "subscription_created" => {
                let data = raw.data.ok_or(WebhookParseError::MissingField("data"))?;
                let attrs = data.attributes;
                WebhookEvent::SubscriptionCreated(SubscriptionCreated {
                    user_id: raw
                        .meta
                        .custom_data
                        .and_then(|c| c.user_id)
                        .and_then(ProviderId::into_non_empty),
                    provider_subscription_id: data.id.into_required("data.id")?,
                    provider_order_id: attrs.order_id.and_then(ProviderId::into_non_empty),
                    provider_product_id: attrs.product_id.and_then(ProviderId::into_non_empty),
                    provider_variant_id: attrs.variant_id.and_then(ProviderId::into_non_empty),
                    provider_customer_id: attrs.customer_id.and_then(ProviderId::into_non_empty),
                    status: required_status(attrs.status)?,
                    renews_at: attrs.renews_at,
                    ends_at: attrs.ends_at,
                })
            }
            "subscription_updated" => {
                let data = raw.data.ok_or(WebhookParseError::MissingField("data"))?;
                let attrs = data.attributes;
                WebhookEvent::SubscriptionUpdated(SubscriptionUpdated {
                    provider_subscription_id: data.id.into_required("data.id")?,
                    provider_customer_id: attrs.customer_id.and_then(ProviderId::into_non_empty),
                    status: required_status(attrs.status)?,
                    renews_at: attrs.renews_at,
                    ends_at: attrs.ends_at,
                })
            }
            "subscription_cancelled" => {
                let data = raw.data.ok_or(WebhookParseError::MissingField("data"))?;
                WebhookEvent::SubscriptionCancelled(SubscriptionCancelled {
                    provider_subscription_id: data.id.into_required("data.id")?,
                    ends_at: data.attributes.ends_at,
                })
            }
            "subscription_expired" => {
                let data = raw.data.ok_or(WebhookParseError::MissingField("data"))?;
                WebhookEvent::SubscriptionExpired(SubscriptionExpired {
                    provider_subscription_id: data.id.into_required("data.id")?,
                })
            }
            _ => WebhookEvent::Other { event_name },
        };
        Ok(event)
    }
}

fn required_status(status: Option<String>) -> Result<SubscriptionStatus, WebhookParseError> {
    status
        .filter(|s| !s.trim().is_empty())
        .map(|s| SubscriptionStatus::parse(&s))
        .ok_or(WebhookParseError::MissingField("data.attributes.status"))
}

#[derive(Debug, Deserialize)]
struct RawWebhook {
    meta: RawMeta,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Debug, Deserialize)]
struct RawMeta {
    event_name: String,
    #[serde(default)]
    custom_data: Option<RawCustomData>,
}

#[derive(Debug, Deserialize)]
struct RawCustomData {
    #[serde(default)]
    user_id: Option<ProviderId>,
}

#[derive(Debug, Deserialize)]
struct RawData {
    id: ProviderId,
    #[serde(default)]
    attributes: RawAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct RawAttributes {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    renews_at: Option<DateTime<Utc>>,
    #[serde(default)]
    ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    customer_id: Option<ProviderId>,
    #[serde(default)]
    order_id: Option<ProviderId>,
    #[serde(default)]
    product_id: Option<ProviderId>,
    #[serde(default)]
    variant_id: Option<ProviderId>,
}

/// Provider ids arrive as numbers in attributes and as strings in `data.id`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProviderId {
    Number(serde_json::Number),
    Text(String),
}

impl ProviderId {
    fn into_non_empty(self) -> Option<String> {
        let value = match self {
            ProviderId::Number(n) => n.to_string(),
            ProviderId::Text(s) => s.trim().to_string(),
        };
        (!value.is_empty()).then_some(value)
    }

    fn into_required(self, field: &'static str) -> Result<String, WebhookParseError> {
        self.into_non_empty().ok_or(WebhookParseError::MissingField(field))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn body(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn parses_subscription_created_with_numeric_ids() {
        let payload = body(json!({
            "meta": { "event_name": "subscription_created", "custom_data": { "user_id": "u1" } },
            "data": {
                "id": "sub_1",
                "attributes": {
                    "status": "active",
                    "renews_at": "2025-01-01T00:00:00.000000Z",
                    "ends_at": null,
                    "customer_id": 42,
                    "order_id": 7,
                    "product_id": 3,
                    "variant_id": 9
                }
            }
        }));

        let WebhookEvent::SubscriptionCreated(created) = WebhookEvent::parse(&payload).unwrap() else {
            panic!("expected subscription_created");
        };
        assert_eq!(created.user_id.as_deref(), Some("u1"));
        assert_eq!(created.provider_subscription_id, "sub_1");
        assert_eq!(created.provider_customer_id.as_deref(), Some("42"));
        assert_eq!(created.provider_variant_id.as_deref(), Some("9"));
        assert_eq!(created.status, SubscriptionStatus::Active);
        assert_eq!(
            created.renews_at,
            Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(created.ends_at, None);
    }

    #[test]
    fn created_without_custom_data_parses_with_no_user() {
        let payload = body(json!({
            "meta": { "event_name": "subscription_created" },
            "data": { "id": 5, "attributes": { "status": "on_trial" } }
        }));

        let WebhookEvent::SubscriptionCreated(created) = WebhookEvent::parse(&payload).unwrap() else {
            panic!("expected subscription_created");
        };
        assert_eq!(created.user_id, None);
        assert_eq!(created.provider_subscription_id, "5");
    }

    #[test]
    fn unknown_events_are_other() {
        let payload = body(json!({ "meta": { "event_name": "order_created" }, "data": { "id": "1" } }));
        let event = WebhookEvent::parse(&payload).unwrap();
        assert_eq!(
            event,
            WebhookEvent::Other {
                event_name: "order_created".to_string()
            }
        );
        assert_eq!(event.event_name(), "order_created");
    }

    #[test]
    fn missing_fields_are_reported() {
        let no_status = body(json!({
            "meta": { "event_name": "subscription_updated" },
            "data": { "id": "sub_1", "attributes": {} }
        }));
        assert!(matches!(
            WebhookEvent::parse(&no_status),
            Err(WebhookParseError::MissingField("data.attributes.status"))
        ));

        let no_data = body(json!({ "meta": { "event_name": "subscription_expired" } }));
        assert!(matches!(
            WebhookEvent::parse(&no_data),
            Err(WebhookParseError::MissingField("data"))
        ));

        assert!(matches!(
            WebhookEvent::parse(b"not json"),
            Err(WebhookParseError::Json(_))
        ));
    }

    #[test]
    fn cancelled_carries_ends_at() {
        let payload = body(json!({
            "meta": { "event_name": "subscription_cancelled" },
            "data": { "id": "sub_1", "attributes": { "status": "cancelled", "ends_at": "2030-06-01T12:00:00Z" } }
        }));
        let WebhookEvent::SubscriptionCancelled(cancelled) = WebhookEvent::parse(&payload).unwrap() else {
            panic!("expected subscription_cancelled");
        };
        assert_eq!(
            cancelled.ends_at,
            Some(Utc.with_ymd_and_hms(2030, 6, 1, 12, 0, 0).unwrap())
        );
    }
}
