pub mod commands;
pub mod terminal;

use crate::models::{Attachment, Conversation, ConversationId, ConversationSummary, ModelInfo, Persona, PersonaId};

/// Presentation surface the controller reports to.
pub trait View: Send {
    fn render_transcript(&mut self, conversation: Option<&Conversation>, loading: bool);

    fn render_summaries(&mut self, summaries: &[ConversationSummary], active: Option<ConversationId>);

    fn render_catalog(
        &mut self,
        models: &[ModelInfo],
        selected_model: Option<&str>,
        personas: &[Persona],
        selected_persona: Option<PersonaId>,
    );

    fn render_staged(&mut self, attachments: &[Attachment]);

    fn notify(&mut self, message: &str);

    fn show_error(&mut self, message: &str);
}
