use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provider-reported subscription status. Unknown values are preserved
/// verbatim so the local row mirrors whatever the provider sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubscriptionStatus {
    Active,
    OnTrial,
    Paused,
    PastDue,
    Unpaid,
    Cancelled,
    Expired,
    Other(String),
}

impl SubscriptionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Self::Active,
            "on_trial" => Self::OnTrial,
            "paused" => Self::Paused,
            "past_due" => Self::PastDue,
            "unpaid" => Self::Unpaid,
            "cancelled" => Self::Cancelled,
            "expired" => Self::Expired,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::OnTrial => "on_trial",
            Self::Paused => "paused",
            Self::PastDue => "past_due",
            Self::Unpaid => "unpaid",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Other(raw) => raw,
        }
    }

    /// Statuses that grant premium access.
    pub fn grants_premium(&self) -> bool {
        matches!(self, Self::Active | Self::OnTrial)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SubscriptionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubscriptionStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// One billing-provider subscription lifecycle.
/// Maps to the `subscriptions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: String,
    pub provider_subscription_id: String,
    pub provider_order_id: Option<String>,
    pub provider_product_id: Option<String>,
    pub provider_variant_id: Option<String>,
    pub provider_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Premium-access fields of a user. These, not subscription rows, are the
/// source of truth for access checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntitlement {
    pub user_id: String,
    pub is_premium: bool,
    pub premium_expires_at: Option<DateTime<Utc>>,
    pub provider_customer_id: Option<String>,
    pub provider_subscription_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserEntitlement {
    /// A user with no premium history.
    pub fn free(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            is_premium: false,
            premium_expires_at: None,
            provider_customer_id: None,
            provider_subscription_id: None,
            updated_at: now,
        }
    }

    /// Effective access at `now`: the flag must be set and the expiry, if
    /// any, must not have passed.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.premium_expires_at.map_or(true, |expires| expires > now)
    }

    /// Set both entitlement fields so they agree at `now`.
    pub(crate) fn grant(&mut self, premium: bool, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) {
        self.premium_expires_at = expires_at;
        self.is_premium = premium && expires_at.map_or(true, |expires| expires > now);
        self.updated_at = now;
    }

    pub(crate) fn revoke(&mut self, now: DateTime<Utc>) {
        self.is_premium = false;
        self.premium_expires_at = None;
        self.updated_at = now;
    }
}
