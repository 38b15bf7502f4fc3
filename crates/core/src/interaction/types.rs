use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentRef;
use crate::error::CoreError;
use crate::identity::VisitorId;

/// A recorded stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Like,
    Dislike,
}

impl VoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteKind::Like => "like",
            VoteKind::Dislike => "dislike",
        }
    }

    /// (likes, dislikes) delta for adding one vote of this kind.
    pub fn delta(self) -> (i64, i64) {
        match self {
            VoteKind::Like => (1, 0),
            VoteKind::Dislike => (0, 1),
        }
    }
}

impl FromStr for VoteKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "like" => Ok(VoteKind::Like),
            "dislike" => Ok(VoteKind::Dislike),
            other => Err(CoreError::InvalidInput(format!("unknown vote kind: {other}"))),
        }
    }
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a caller asks the ledger to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRequest {
    Cast(VoteKind),
    Remove,
}

impl FromStr for VoteRequest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "like" => Ok(VoteRequest::Cast(VoteKind::Like)),
            "dislike" => Ok(VoteRequest::Cast(VoteKind::Dislike)),
            "remove" => Ok(VoteRequest::Remove),
            other => Err(CoreError::InvalidInput(format!(
                "action must be one of like, dislike, remove (got {other:?})"
            ))),
        }
    }
}

/// What the ledger did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    New,
    Removed,
    Changed,
}

/// The party a vote belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Voter {
    Visitor(VisitorId),
    User(String),
}

impl Voter {
    pub fn user(user_id: &str) -> Result<Self, CoreError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(CoreError::Unauthorized("user id is empty".to_string()));
        }
        Ok(Voter::User(user_id.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Voter::Visitor(_) => "visitor",
            Voter::User(_) => "user",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Voter::Visitor(id) => id.as_str(),
            Voter::User(id) => id,
        }
    }
}

impl fmt::Display for Voter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// One voter's stance on one content item.
/// Maps to the `interactions` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub content: ContentRef,
    pub voter: Voter,
    pub kind: VoteKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteOutcome {
    pub action: VoteAction,
    /// The kind recorded before this call, if any.
    pub previous: Option<VoteKind>,
    /// The kind recorded after this call, if any.
    pub current: Option<VoteKind>,
    /// Set when a repeated vote of the same kind removed it.
    pub toggled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSnapshot {
    pub user_interaction: Option<VoteKind>,
    pub likes: i64,
    pub dislikes: i64,
}
