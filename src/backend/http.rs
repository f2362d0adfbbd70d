use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::traits::ChatBackend;
use super::types::{
    BackendError, BackendSettings, ChatReply, ChatRequest, ConversationRecord, ErrorBody,
    ModelList, RenameRequest,
};
use crate::models::{ConversationId, ConversationSummary, ModelInfo, Persona, PersonaId, PersonaInput};

/// REST client for the LM Studio proxy backend.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn parse_error_message(status: StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            let detail = match parsed.detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            return format!("HTTP {}: {}", status.as_u16(), detail);
        }
        format!("HTTP {}: Request failed", status.as_u16())
    }

    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response, BackendError> {
        let response = req
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(format!("Failed to reach {}: {}", self.base_url, e)))?;

        let status = response.status();
        tracing::debug!("{} -> {}", what, status.as_u16());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = Self::parse_error_message(status, &body);
        if status == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound(message));
        }
        Err(BackendError::RequestFailed(message))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, BackendError> {
        let response = self
            .send(self.client.get(self.url("/chats")), "GET /chats")
            .await?;
        Self::json(response).await
    }

    async fn get_conversation(
        &self,
        id: ConversationId,
    ) -> Result<ConversationRecord, BackendError> {
        let response = self
            .send(
                self.client.get(self.url(&format!("/chats/{}", id))),
                "GET /chats/{id}",
            )
            .await?;
        Self::json(response).await
    }

    async fn delete_conversation(&self, id: ConversationId) -> Result<(), BackendError> {
        self.send(
            self.client.delete(self.url(&format!("/chats/{}", id))),
            "DELETE /chats/{id}",
        )
        .await?;
        Ok(())
    }

    async fn rename_conversation(
        &self,
        id: ConversationId,
        name: &str,
    ) -> Result<(), BackendError> {
        self.send(
            self.client
                .put(self.url(&format!("/chats/{}", id)))
                .json(&RenameRequest { name }),
            "PUT /chats/{id}",
        )
        .await?;
        Ok(())
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatReply, BackendError> {
        let response = self
            .send(self.client.post(self.url("/chat")).json(&request), "POST /chat")
            .await?;
        Self::json(response).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let response = self
            .send(self.client.get(self.url("/models")), "GET /models")
            .await?;
        let list: ModelList = Self::json(response).await?;
        Ok(list.data)
    }

    async fn refresh_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let response = self
            .send(self.client.post(self.url("/models/refresh")), "POST /models/refresh")
            .await?;
        // The refresh endpoint wraps the model list under "models".
        let mut body: serde_json::Value = Self::json(response).await?;
        let list = match body.get_mut("models") {
            Some(inner) => inner.take(),
            None => body,
        };
        let list: ModelList = serde_json::from_value(list)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(list.data)
    }

    async fn list_personas(&self) -> Result<Vec<Persona>, BackendError> {
        let response = self
            .send(self.client.get(self.url("/personas")), "GET /personas")
            .await?;
        Self::json(response).await
    }

    async fn create_persona(&self, input: PersonaInput) -> Result<Persona, BackendError> {
        let response = self
            .send(
                self.client.post(self.url("/personas")).json(&input),
                "POST /personas",
            )
            .await?;
        Self::json(response).await
    }

    async fn update_persona(
        &self,
        id: PersonaId,
        input: PersonaInput,
    ) -> Result<Persona, BackendError> {
        let response = self
            .send(
                self.client
                    .put(self.url(&format!("/personas/{}", id)))
                    .json(&input),
                "PUT /personas/{id}",
            )
            .await?;
        Self::json(response).await
    }

    async fn delete_persona(&self, id: PersonaId) -> Result<(), BackendError> {
        self.send(
            self.client.delete(self.url(&format!("/personas/{}", id))),
            "DELETE /personas/{id}",
        )
        .await?;
        Ok(())
    }

    async fn get_settings(&self) -> Result<BackendSettings, BackendError> {
        let response = self
            .send(self.client.get(self.url("/settings")), "GET /settings")
            .await?;
        Self::json(response).await
    }

    async fn put_settings(
        &self,
        settings: BackendSettings,
    ) -> Result<BackendSettings, BackendError> {
        // The backend acknowledges with a status message, not the stored value.
        self.send(
            self.client.put(self.url("/settings")).json(&settings),
            "PUT /settings",
        )
        .await?;
        Ok(settings)
    }
}
