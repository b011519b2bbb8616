//! Persisted record shapes
//!
//! These mirror what the stores write; they are append-only (messages,
//! events) or upserted (customer record).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageRole {
    User,
    Ai,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Ai => "AI",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "USER" => Self::User,
            _ => Self::Ai,
        }
    }
}

/// One persisted utterance. Append-only, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub session_id: String,
    pub text: String,
    pub role: MessageRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(session_id: impl Into<String>, text: impl Into<String>, role: MessageRole) -> Self {
        Self {
            session_id: session_id.into(),
            text: text.into(),
            role,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Identified customer facts, keyed by session. Upserted, last write wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub session_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub product_interest: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomerRecord {
    pub fn new(
        session_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        product_interest: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            name: name.into(),
            email: email.into(),
            product_interest,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Business event with an arbitrary structured payload. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: String,
    pub name: String,
    pub data: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    pub fn new(
        session_id: impl Into<String>,
        name: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            name: name.into(),
            data,
            metadata: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_as_screaming_case() {
        let json = serde_json::to_string(&MessageRole::User).unwrap();
        assert_eq!(json, r#""USER""#);
        assert_eq!(MessageRole::from_str("AI"), MessageRole::Ai);
    }
}
