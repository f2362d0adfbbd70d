use std::io::Write;

use chrono::{DateTime, Utc};

use super::View;
use crate::models::{
    Attachment, Conversation, ConversationId, ConversationSummary, ModelInfo, Persona, PersonaId,
    Role,
};
use crate::services::attachments;
use crate::services::theme::{self, Theme};

/// Plain stdout rendering.
pub struct TerminalView<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text) {
            tracing::error!("Failed to write to terminal: {}", e);
        }
    }

    fn accent(text: &str) -> String {
        match theme::current() {
            Theme::Dark => format!("\x1b[1;96m{}\x1b[0m", text),
            Theme::Light => format!("\x1b[1;34m{}\x1b[0m", text),
        }
    }
}

/// Sidebar-style relative timestamp: time today, weekday this week, else
/// month and day.
pub fn format_updated(updated: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let hours = (now - updated).num_hours();
    if hours < 24 {
        updated.format("%H:%M").to_string()
    } else if hours < 24 * 7 {
        updated.format("%a").to_string()
    } else {
        updated.format("%b %-d").to_string()
    }
}

/// Message body for display: user prompts are decoded so attached files
/// show as names rather than their full text.
pub fn display_body(role: Role, content: &str) -> (String, Vec<String>) {
    if role == Role::Assistant {
        return (content.to_string(), Vec::new());
    }
    let decoded = attachments::decode(content);
    let names = decoded.files.into_iter().map(|f| f.name).collect();
    (decoded.text, names)
}

impl<W: Write + Send> View for TerminalView<W> {
    fn render_transcript(&mut self, conversation: Option<&Conversation>, loading: bool) {
        if loading {
            self.line("Loading conversation...");
            return;
        }
        let Some(conversation) = conversation else {
            self.line("Start a new conversation or open one with /open <id>.");
            return;
        };

        let header = match conversation.id {
            Some(id) => format!("#{} {} ({} messages)", id, conversation.name, conversation.messages.len()),
            None => format!("{} (unsaved)", conversation.name),
        };
        self.line(&Self::accent(&header));

        for message in &conversation.messages {
            let who = match message.role {
                Role::User => "You",
                Role::Assistant => "Assistant",
            };
            let status = if message.provisional { " (sending)" } else { "" };
            self.line(&format!("[{}] {}{}:", message.created_at.format("%H:%M"), who, status));

            let (body, files) = display_body(message.role, &message.content);
            if !body.is_empty() {
                self.line(&body);
            }
            if !files.is_empty() {
                self.line(&format!("  attached: {}", files.join(", ")));
            }
        }
    }

    fn render_summaries(&mut self, summaries: &[ConversationSummary], active: Option<ConversationId>) {
        if summaries.is_empty() {
            self.line("No chats yet.");
            return;
        }
        let now = Utc::now();
        for summary in summaries {
            let marker = if Some(summary.id) == active { "*" } else { " " };
            self.line(&format!(
                "{} {:>4}  {:<40} {}",
                marker,
                summary.id,
                summary.name,
                format_updated(summary.updated_at, now)
            ));
        }
    }

    fn render_catalog(
        &mut self,
        models: &[ModelInfo],
        selected_model: Option<&str>,
        personas: &[Persona],
        selected_persona: Option<PersonaId>,
    ) {
        if models.is_empty() {
            self.line("No models available. Check the LM Studio URL with /settings.");
        }
        for model in models {
            let marker = if Some(model.id.as_str()) == selected_model { "*" } else { " " };
            self.line(&format!("{} model   {}", marker, model.id));
        }
        for persona in personas {
            let marker = if Some(persona.id) == selected_persona { "*" } else { " " };
            self.line(&format!("{} persona {:>3} {}", marker, persona.id, persona.name));
        }
    }

    fn render_staged(&mut self, attachments: &[Attachment]) {
        if attachments.is_empty() {
            self.line("No files attached.");
            return;
        }
        let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        self.line(&format!("Attached: {}", names.join(", ")));
    }

    fn notify(&mut self, message: &str) {
        self.line(message);
    }

    fn show_error(&mut self, message: &str) {
        self.line(&format!("Error: {}", message));
    }
}
