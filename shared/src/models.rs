//! Shared data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Maximum number of characters kept from the first message as a chat title.
pub const TITLE_MAX_CHARS: usize = 40;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// A fragment of turn content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

/// One message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub parts: Vec<Part>,
    /// Uploaded image path attached to a user turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
}

impl Turn {
    /// A user turn with a single text part.
    pub fn user(text: impl Into<String>, img: Option<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part { text: text.into() }],
            img,
        }
    }

    /// A model turn with a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            parts: vec![Part { text: text.into() }],
            img: None,
        }
    }

    /// Text of the first part, if any.
    pub fn text(&self) -> Option<&str> {
        self.parts.first().map(|p| p.text.as_str())
    }
}

/// A conversation thread owned by one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Uuid,
    pub user_id: String,
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Summary derived from the first user turn, used to repair the index.
    pub fn summary(&self) -> ChatSummary {
        let text = self
            .history
            .iter()
            .find(|turn| turn.role == Role::User)
            .and_then(Turn::text)
            .unwrap_or_default();

        ChatSummary {
            chat_id: self.id,
            title: title_from(text),
            created_at: self.created_at,
        }
    }
}

/// Index entry for one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub chat_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A user's catalog of chats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChatIndex {
    pub user_id: String,
    pub chats: Vec<ChatSummary>,
}

/// Result of an owner-scoped append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppendOutcome {
    pub matched: u64,
    pub modified: u64,
}

/// Wire form of an append acknowledgment.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendAck {
    pub acknowledged: bool,
    pub matched_count: u64,
    pub modified_count: u64,
}

impl From<AppendOutcome> for AppendAck {
    fn from(outcome: AppendOutcome) -> Self {
        Self {
            acknowledged: true,
            matched_count: outcome.matched,
            modified_count: outcome.modified,
        }
    }
}

/// Create chat request payload.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatRequest {
    #[validate(length(min = 1, message = "text cannot be empty"))]
    pub text: String,
}

/// Append turn request payload.
#[derive(Debug, Deserialize)]
pub struct AppendTurnRequest {
    #[serde(default)]
    pub question: Option<String>,
    pub ans: String,
    #[serde(default)]
    pub img: Option<String>,
}

/// Diagnostic response for `/api/test`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    pub user_id: String,
}

/// Chat title: the first `TITLE_MAX_CHARS` characters of the text.
pub fn title_from(text: &str) -> String {
    text.chars().take(TITLE_MAX_CHARS).collect()
}
