use std::sync::Arc;

use crate::backend::{ChatBackend, ChatReply, ChatRequest};
use crate::config::ClientConfig;
use crate::models::{Attachment, ConversationId, PersonaId};
use crate::services::attachments;

/// What the user picked for the next exchange.
#[derive(Debug, Clone, Default)]
pub struct ChatSelection {
    pub model: Option<String>,
    pub persona_id: Option<PersonaId>,
}

/// Flatten typed text and staged files into the prompt sent to the backend.
/// `None` when there is nothing to send.
pub fn compose_prompt(text: &str, staged: &[Attachment]) -> Option<String> {
    let text = text.trim();
    if text.is_empty() && staged.is_empty() {
        return None;
    }
    Some(attachments::encode(text, staged))
}

/// Build a `ChatRequest` from the resolved parameters.
pub fn build_request(
    model: &str,
    prompt: String,
    selection: &ChatSelection,
    conversation_id: Option<ConversationId>,
    config: &ClientConfig,
) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        persona_id: selection.persona_id,
        prompt,
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        conversation_id,
    }
}

/// Run one exchange. The error is already formatted for display.
pub async fn send_exchange(
    backend: Arc<dyn ChatBackend>,
    request: ChatRequest,
) -> Result<ChatReply, String> {
    let model = request.model.clone();
    match backend.chat(request).await {
        Ok(reply) => {
            tracing::info!(
                "Exchange with {} stored in conversation {}",
                model,
                reply.conversation_id
            );
            Ok(reply)
        }
        Err(e) => {
            tracing::error!("Chat exchange failed: {}", e);
            Err(format!("Failed to get a response: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::from_lookup(|key| (key == "HOME").then(|| "/home/test".to_string())).unwrap()
    }

    #[test]
    fn test_compose_prompt() {
        assert_eq!(compose_prompt("   ", &[]), None);
        assert_eq!(compose_prompt("  hi \n", &[]).as_deref(), Some("hi"));
        assert_eq!(
            compose_prompt("", &[Attachment::new("a.txt", "A")]).as_deref(),
            Some("[File: a.txt]\nA\n[/File: a.txt]")
        );
    }

    #[test]
    fn test_build_request_uses_config_defaults() {
        let selection = ChatSelection {
            model: Some("m".to_string()),
            persona_id: Some(2),
        };
        let request = build_request("m", "p".to_string(), &selection, Some(8), &config());
        assert_eq!(request.persona_id, Some(2));
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.conversation_id, Some(8));
    }
}
