use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    Conversation, ConversationId, Message, ModelInfo, PersonaId, Role,
};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

// --- Chat exchange ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona_id: Option<PersonaId>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(rename = "chat_id", skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub content: String,
    #[serde(default)]
    pub raw: serde_json::Value,
    #[serde(rename = "chat_id")]
    pub conversation_id: ConversationId,
}

// --- Conversation records ---

#[derive(Debug, Clone, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub role: String,
    pub content: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationRecord {
    pub id: ConversationId,
    pub name: String,
    #[serde(with = "crate::models::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::models::timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
}

impl ConversationRecord {
    /// Convert into the displayed form. Rows with roles the transcript does
    /// not show (`system`) are dropped; order is by `created_at`.
    pub fn into_conversation(self) -> Conversation {
        let mut messages: Vec<Message> = self
            .messages
            .into_iter()
            .filter_map(|m| {
                let role = Role::from_str(&m.role)?;
                Some(Message::confirmed(m.id, role, m.content, m.created_at))
            })
            .collect();
        messages.sort_by_key(|m| m.created_at);

        Conversation {
            id: Some(self.id),
            name: self.name,
            messages,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenameRequest<'a> {
    pub name: &'a str,
}

// --- Settings and models ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub lm_studio_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_message_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}
