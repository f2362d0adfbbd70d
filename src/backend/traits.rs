use async_trait::async_trait;

use super::types::{BackendError, BackendSettings, ChatReply, ChatRequest, ConversationRecord};
use crate::models::{ConversationId, ConversationSummary, ModelInfo, Persona, PersonaId, PersonaInput};

/// The REST surface of the chat backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BackendError>;

    async fn get_conversation(&self, id: ConversationId)
        -> Result<ConversationRecord, BackendError>;

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), BackendError>;

    async fn rename_conversation(&self, id: ConversationId, name: &str)
        -> Result<(), BackendError>;

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, BackendError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError>;

    async fn refresh_models(&self) -> Result<Vec<ModelInfo>, BackendError>;

    async fn list_personas(&self) -> Result<Vec<Persona>, BackendError>;

    async fn create_persona(&self, input: PersonaInput) -> Result<Persona, BackendError>;

    async fn update_persona(&self, id: PersonaId, input: PersonaInput)
        -> Result<Persona, BackendError>;

    async fn delete_persona(&self, id: PersonaId) -> Result<(), BackendError>;

    async fn get_settings(&self) -> Result<BackendSettings, BackendError>;

    async fn put_settings(&self, settings: BackendSettings) -> Result<BackendSettings, BackendError>;
}
