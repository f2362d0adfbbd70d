//! In-memory backend used by the service and controller tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::traits::ChatBackend;
use super::types::{
    BackendError, BackendSettings, ChatReply, ChatRequest, ConversationRecord, MessageRecord,
};
use crate::models::{ConversationId, ConversationSummary, ModelInfo, Persona, PersonaId, PersonaInput};

#[derive(Default)]
struct State {
    conversations: BTreeMap<ConversationId, ConversationRecord>,
    next_conversation_id: i64,
    next_message_id: i64,
    personas: Vec<Persona>,
    settings: Option<BackendSettings>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<State>,
    pub get_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub rename_calls: AtomicUsize,
    pub fail_chat: Mutex<Option<String>>,
    pub fail_rename: Mutex<Option<String>>,
    pub renamed: Mutex<Vec<(ConversationId, String)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored conversation holding one user/assistant exchange.
    pub fn seed(&self, name: &str, user: &str, assistant: &str) -> ConversationId {
        let mut state = self.state.lock().unwrap();
        let id = Self::create(&mut state, name);
        Self::push(&mut state, id, "user", user);
        Self::push(&mut state, id, "assistant", assistant);
        id
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn rename_calls(&self) -> usize {
        self.rename_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_chat(&self, message: &str) {
        *self.fail_chat.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_next_rename(&self, message: &str) {
        *self.fail_rename.lock().unwrap() = Some(message.to_string());
    }

    fn create(state: &mut State, name: &str) -> ConversationId {
        state.next_conversation_id += 1;
        let id = state.next_conversation_id;
        let now = Utc::now();
        state.conversations.insert(
            id,
            ConversationRecord {
                id,
                name: name.to_string(),
                created_at: now,
                updated_at: now,
                messages: Vec::new(),
            },
        );
        id
    }

    fn push(state: &mut State, id: ConversationId, role: &str, content: &str) {
        state.next_message_id += 1;
        let message_id = state.next_message_id;
        if let Some(record) = state.conversations.get_mut(&id) {
            let now = Utc::now();
            record.messages.push(MessageRecord {
                id: message_id,
                role: role.to_string(),
                content: content.to_string(),
                created_at: now,
            });
            record.updated_at = now;
        }
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let mut list: Vec<ConversationSummary> = state
            .conversations
            .values()
            .map(|c| ConversationSummary {
                id: c.id,
                name: c.name.clone(),
                created_at: c.created_at,
                updated_at: c.updated_at,
            })
            .collect();
        list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(list)
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<ConversationRecord, BackendError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        state
            .conversations
            .get(&id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Chat {} not found", id)))
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state
            .conversations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound(format!("Chat {} not found", id)))
    }

    async fn rename_conversation(
        &self,
        id: ConversationId,
        name: &str,
    ) -> Result<(), BackendError> {
        self.rename_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_rename.lock().unwrap().take() {
            return Err(BackendError::RequestFailed(message));
        }
        self.renamed.lock().unwrap().push((id, name.to_string()));
        let mut state = self.state.lock().unwrap();
        match state.conversations.get_mut(&id) {
            Some(record) => {
                record.name = name.to_string();
                Ok(())
            }
            None => Err(BackendError::NotFound(format!("Chat {} not found", id))),
        }
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, BackendError> {
        if let Some(message) = self.fail_chat.lock().unwrap().take() {
            return Err(BackendError::RequestFailed(message));
        }
        let mut state = self.state.lock().unwrap();
        let id = match request.conversation_id {
            Some(id) if state.conversations.contains_key(&id) => id,
            Some(id) => return Err(BackendError::NotFound(format!("Chat {} not found", id))),
            None => Self::create(&mut state, &request.prompt),
        };
        let content = format!("echo: {}", request.prompt);
        Self::push(&mut state, id, "user", &request.prompt);
        Self::push(&mut state, id, "assistant", &content);
        Ok(ChatReply {
            content,
            raw: serde_json::Value::Null,
            conversation_id: id,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        Ok(vec![
            ModelInfo {
                id: "local-model-a".to_string(),
                object: Some("model".to_string()),
                owned_by: None,
            },
            ModelInfo {
                id: "local-model-b".to_string(),
                object: Some("model".to_string()),
                owned_by: None,
            },
        ])
    }

    async fn refresh_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        self.list_models().await
    }

    async fn list_personas(&self) -> Result<Vec<Persona>, BackendError> {
        Ok(self.state.lock().unwrap().personas.clone())
    }

    async fn create_persona(&self, input: PersonaInput) -> Result<Persona, BackendError> {
        let mut state = self.state.lock().unwrap();
        let persona = Persona {
            id: state.personas.len() as PersonaId + 1,
            name: input.name,
            system_prompt: input.system_prompt,
        };
        state.personas.push(persona.clone());
        Ok(persona)
    }

    async fn update_persona(
        &self,
        id: PersonaId,
        input: PersonaInput,
    ) -> Result<Persona, BackendError> {
        let mut state = self.state.lock().unwrap();
        let persona = state
            .personas
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| BackendError::NotFound("Persona not found".to_string()))?;
        persona.name = input.name;
        persona.system_prompt = input.system_prompt;
        Ok(persona.clone())
    }

    async fn delete_persona(&self, id: PersonaId) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let before = state.personas.len();
        state.personas.retain(|p| p.id != id);
        if state.personas.len() == before {
            return Err(BackendError::NotFound("Persona not found".to_string()));
        }
        Ok(())
    }

    async fn get_settings(&self) -> Result<BackendSettings, BackendError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .settings
            .clone()
            .unwrap_or(BackendSettings {
                lm_studio_base_url: "http://127.0.0.1:1234/v1".to_string(),
                context_message_count: None,
            }))
    }

    async fn put_settings(
        &self,
        settings: BackendSettings,
    ) -> Result<BackendSettings, BackendError> {
        self.state.lock().unwrap().settings = Some(settings.clone());
        Ok(settings)
    }
}
