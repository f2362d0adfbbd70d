use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::Message;

pub type ConversationId = i64;

pub const DEFAULT_TITLE: &str = "New Chat";

#[derive(Debug, Clone, PartialEq)]
pub struct Conversation {
    /// `None` until the backend assigns an id on the first exchange.
    pub id: Option<ConversationId>,
    pub name: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn draft() -> Self {
        Self {
            id: None,
            name: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
        }
    }
}

/// List-view projection of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub name: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub updated_at: DateTime<Utc>,
}
