//! Pseudonymous visitor identity for anonymous votes and view dedup.
//!
//! The id is a truncated SHA-256 over `ip:user_agent`. It is a lookup key
//! only; nothing about the visitor is stored alongside it.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Placeholder used when a request carries no ip or user agent.
pub const UNKNOWN: &str = "unknown";

const VISITOR_ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VisitorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the visitor id for an (ip, user agent) pair. Blank inputs are
/// treated as [`UNKNOWN`].
pub fn resolve_visitor_id(ip: &str, user_agent: &str) -> VisitorId {
    let ip = non_blank(ip);
    let user_agent = non_blank(user_agent);

    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b":");
    hasher.update(user_agent.as_bytes());
    let digest = hex::encode(hasher.finalize());

    VisitorId(digest[..VISITOR_ID_LEN].to_string())
}

fn non_blank(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN
    } else {
        trimmed
    }
}
