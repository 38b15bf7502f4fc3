use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validate::{validate_content_id, ContentIdError};

/// Kinds of catalog content that carry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Video,
    Picture,
    #[serde(alias = "profile")]
    Actress,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Video => "video",
            ContentType::Picture => "picture",
            ContentType::Actress => "actress",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown content type: {0}")]
pub struct UnknownContentType(pub String);

impl FromStr for ContentType {
    type Err = UnknownContentType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(ContentType::Video),
            "picture" => Ok(ContentType::Picture),
            "actress" | "profile" => Ok(ContentType::Actress),
            other => Err(UnknownContentType(other.to_string())),
        }
    }
}

/// A validated pointer to one content item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: String,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: &str) -> Result<Self, ContentIdError> {
        let content_id = validate_content_id(content_id)?;
        Ok(Self {
            content_type,
            content_id: content_id.to_string(),
        })
    }

    pub fn video(content_id: &str) -> Result<Self, ContentIdError> {
        Self::new(ContentType::Video, content_id)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)
    }
}

/// Denormalized counters for one content item.
/// Maps to the `content_stats` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentAggregate {
    pub content: ContentRef,
    pub views: i64,
    pub likes: i64,
    pub dislikes: i64,
    pub updated_at: DateTime<Utc>,
}
