use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::backend::{BackendSettings, ChatBackend, ChatReply};
use crate::config::{self, ClientConfig};
use crate::models::{
    Attachment, Conversation, ConversationId, ConversationSummary, ModelInfo, Persona, PersonaId,
    PersonaInput,
};
use crate::services::chat::{self, ChatSelection};
use crate::services::edit::{BlurTicket, SubmitOutcome};
use crate::services::files::{self, FileReader, PendingFile};
use crate::services::theme::{self, Theme};
use crate::services::{ConversationReconciler, EditCommitCoordinator, PreferenceStore, SummaryCacheSync};
use crate::services::conversation::Applied;
use crate::ui::View;

pub struct App {
    backend: Arc<dyn ChatBackend>,
    reader: Arc<dyn FileReader>,
    config: ClientConfig,
    store: PreferenceStore,
    reconciler: ConversationReconciler,
    summaries: SummaryCacheSync,
    rename: EditCommitCoordinator<ConversationId>,
    staged: Vec<Attachment>,
    models: Vec<ModelInfo>,
    personas: Vec<Persona>,
    selection: ChatSelection,
    sending: bool,
    list_requested: bool,
    // Bumped whenever the user navigates away from the active conversation.
    epoch: u64,
    out: mpsc::UnboundedSender<AppCmd>,
    view: Box<dyn View>,
}

#[derive(Debug)]
pub enum AppMsg {
    NewChat,
    SelectConversation(ConversationId),
    DeleteConversation(ConversationId),
    ListConversations,
    RefreshConversations,
    LoadCatalog,
    RefreshModels,
    SelectModel(String),
    SelectPersona(Option<PersonaId>),
    SavePersona(Option<PersonaId>, PersonaInput),
    DeletePersona(PersonaId),
    Attach(Vec<PendingFile>),
    Detach(String),
    SendMessage(String),
    StartRename(ConversationId),
    EditRename(String),
    SubmitRename,
    CancelRename,
    BlurRename,
    RenameBlurElapsed(BlurTicket),
    SetTheme(Theme),
    ShowSettings,
    UpdateSettings(String, Option<u32>),
}

#[derive(Debug)]
pub enum AppCmd {
    ConversationsLoaded {
        generation: u64,
        result: Result<Vec<ConversationSummary>, String>,
    },
    ConversationFetched {
        id: ConversationId,
        result: Result<Conversation, String>,
    },
    ExchangeDone {
        epoch: u64,
        result: Result<ChatReply, String>,
    },
    Deleted(ConversationId, Result<(), String>),
    Renamed(ConversationId, String, Result<(), String>),
    CatalogLoaded(Result<(Vec<ModelInfo>, Vec<Persona>), String>),
    ModelsRefreshed(Result<Vec<ModelInfo>, String>),
    PersonasChanged(Result<String, String>),
    FilesLoaded(Result<Vec<Attachment>, String>),
    SettingsLoaded(Result<BackendSettings, String>),
    SettingsSaved(Result<BackendSettings, String>),
}

impl App {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        reader: Arc<dyn FileReader>,
        config: ClientConfig,
        view: Box<dyn View>,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<AppCmd>,
        mpsc::UnboundedReceiver<BlurTicket>,
    ) {
        let (out, cmds) = mpsc::unbounded_channel();
        let (blur_tx, blur_rx) = mpsc::unbounded_channel();
        let store = PreferenceStore::new(config.preferences_path.clone());

        let app = Self {
            backend,
            reader,
            config,
            store,
            reconciler: ConversationReconciler::new(),
            summaries: SummaryCacheSync::new(),
            rename: EditCommitCoordinator::new(blur_tx),
            staged: Vec::new(),
            models: Vec::new(),
            personas: Vec::new(),
            selection: ChatSelection::default(),
            sending: false,
            list_requested: false,
            epoch: 0,
            out,
            view,
        };
        (app, cmds, blur_rx)
    }

    pub fn is_renaming(&self) -> bool {
        self.rename.is_editing()
    }

    /// Fires whenever the conversation list must be re-fetched.
    pub fn summary_changes(&self) -> watch::Receiver<u64> {
        self.summaries.subscribe()
    }

    /// Run `work` off the controller and deliver its result as an `AppCmd`.
    fn command<F>(&self, work: F)
    where
        F: Future<Output = AppCmd> + Send + 'static,
    {
        let out = self.out.clone();
        tokio::spawn(async move {
            if out.send(work.await).is_err() {
                tracing::debug!("Controller gone; dropping command result");
            }
        });
    }

    fn fetch_conversation(&mut self, id: ConversationId) {
        self.reconciler.begin_select(id);
        self.spawn_fetch(id);
    }

    /// Fetch `id` for a selection the reconciler has already begun.
    fn spawn_fetch(&mut self, id: ConversationId) {
        self.view.render_transcript(self.reconciler.active(), true);

        let backend = self.backend.clone();
        self.command(async move {
            let result = backend
                .get_conversation(id)
                .await
                .map(|record| record.into_conversation())
                .map_err(|e| format!("Failed to load chat: {}", e));
            AppCmd::ConversationFetched { id, result }
        });
    }

    fn refresh_summaries(&self) {
        let backend = self.backend.clone();
        let generation = self.summaries.invalidation_count();
        self.command(async move {
            let result = backend
                .list_conversations()
                .await
                .map_err(|e| format!("Failed to load chats: {}", e));
            AppCmd::ConversationsLoaded { generation, result }
        });
    }

    fn refresh_models(&self) {
        let backend = self.backend.clone();
        self.command(async move {
            let result = backend
                .refresh_models()
                .await
                .map_err(|e| format!("Failed to refresh models: {}", e));
            AppCmd::ModelsRefreshed(result)
        });
    }

    fn load_catalog(&self) {
        let backend = self.backend.clone();
        self.command(async move {
            let result = futures::try_join!(backend.list_models(), backend.list_personas())
                .map_err(|e| format!("Failed to load models: {}", e));
            AppCmd::CatalogLoaded(result)
        });
    }

    fn leave_conversation(&mut self) {
        self.epoch += 1;
        self.rename.cancel();
    }

    fn render_catalog(&mut self) {
        self.view.render_catalog(
            &self.models,
            self.selection.model.as_deref(),
            &self.personas,
            self.selection.persona_id,
        );
    }

    /// Keep the selected model if it is still offered, else the last-used
    /// one, else the first listed.
    fn settle_model(&mut self) {
        let offered = |id: &str| self.models.iter().any(|m| m.id == id);
        if self.selection.model.as_deref().is_some_and(offered) {
            return;
        }
        let remembered = self.store.load().last_model.filter(|id| offered(id.as_str()));
        self.selection.model = remembered.or_else(|| self.models.first().map(|m| m.id.clone()));
    }

    async fn finish_rename(&mut self, ticket: Option<BlurTicket>) {
        let backend = self.backend.clone();
        let out = self.out.clone();
        let commit = move |id: ConversationId, name: String| {
            tokio::spawn(async move {
                let result = backend
                    .rename_conversation(id, &name)
                    .await
                    .map_err(|e| format!("Failed to rename chat: {}", e));
                let _ = out.send(AppCmd::Renamed(id, name, result));
            });
            std::future::ready(Ok::<(), String>(()))
        };

        let outcome = match ticket {
            Some(ticket) => self.rename.blur_elapsed(ticket, commit).await,
            None => self.rename.submit(commit).await,
        };
        match outcome {
            Ok(SubmitOutcome::Committed { key, value }) => {
                tracing::info!("Renaming chat {} to {:?}", key, value);
            }
            Ok(SubmitOutcome::Unchanged) => self.view.notify("Name unchanged."),
            Ok(SubmitOutcome::Inactive) => {}
            Err(e) => self.view.show_error(&e),
        }
    }

    pub async fn update(&mut self, msg: AppMsg) {
        match msg {
            AppMsg::NewChat => {
                self.leave_conversation();
                self.reconciler.new_conversation();
                self.staged.clear();
                self.view.render_transcript(None, false);
            }
            AppMsg::SelectConversation(id) => {
                self.leave_conversation();
                self.fetch_conversation(id);
            }
            AppMsg::DeleteConversation(id) => {
                let backend = self.backend.clone();
                self.command(async move {
                    let result = backend
                        .delete_conversation(id)
                        .await
                        .map_err(|e| format!("Failed to delete chat: {}", e));
                    AppCmd::Deleted(id, result)
                });
            }
            AppMsg::ListConversations => {
                if self.summaries.is_stale() {
                    self.list_requested = true;
                    self.refresh_summaries();
                } else {
                    self.view
                        .render_summaries(self.summaries.summaries(), self.reconciler.active_id());
                }
            }
            AppMsg::RefreshConversations => self.refresh_summaries(),
            AppMsg::LoadCatalog => self.load_catalog(),
            AppMsg::RefreshModels => self.refresh_models(),
            AppMsg::SelectModel(id) => {
                if !self.models.is_empty() && !self.models.iter().any(|m| m.id == id) {
                    self.view.show_error(&format!("Unknown model: {}", id));
                    return;
                }
                if let Err(e) = self.store.update(|p| p.last_model = Some(id.clone())) {
                    tracing::warn!("Failed to remember model: {:#}", e);
                }
                self.selection.model = Some(id);
                self.render_catalog();
            }
            AppMsg::SelectPersona(persona_id) => {
                if let Some(id) = persona_id {
                    if !self.personas.iter().any(|p| p.id == id) {
                        self.view.show_error(&format!("Unknown persona: {}", id));
                        return;
                    }
                }
                self.selection.persona_id = persona_id;
                self.render_catalog();
            }
            AppMsg::SavePersona(id, input) => {
                if input.name.trim().is_empty() {
                    self.view.show_error("Persona name is required");
                    return;
                }
                let backend = self.backend.clone();
                self.command(async move {
                    let saved = match id {
                        Some(id) => backend.update_persona(id, input).await,
                        None => backend.create_persona(input).await,
                    };
                    let result = saved
                        .map(|p| format!("Saved persona {} ({}).", p.id, p.name))
                        .map_err(|e| format!("Failed to save persona: {}", e));
                    AppCmd::PersonasChanged(result)
                });
            }
            AppMsg::DeletePersona(id) => {
                let backend = self.backend.clone();
                self.command(async move {
                    let result = backend
                        .delete_persona(id)
                        .await
                        .map(|()| format!("Deleted persona {}.", id))
                        .map_err(|e| format!("Failed to delete persona: {}", e));
                    AppCmd::PersonasChanged(result)
                });
            }
            AppMsg::Attach(picked) => {
                let reader = self.reader.clone();
                self.command(async move {
                    let result = files::load_batch(&picked, reader.as_ref())
                        .await
                        .map_err(|e| e.to_string());
                    AppCmd::FilesLoaded(result)
                });
            }
            AppMsg::Detach(name) => {
                let before = self.staged.len();
                self.staged.retain(|a| a.name != name);
                if self.staged.len() == before {
                    self.view.show_error(&format!("No attached file named {}", name));
                    return;
                }
                self.view.render_staged(&self.staged);
            }
            AppMsg::SendMessage(text) => self.send_message(&text),
            AppMsg::StartRename(id) => {
                let current = self
                    .summaries
                    .find(id)
                    .map(|s| s.name.clone())
                    .or_else(|| {
                        self.reconciler
                            .active()
                            .filter(|c| c.id == Some(id))
                            .map(|c| c.name.clone())
                    });
                match current {
                    Some(name) => {
                        self.rename.start_edit(id, &name);
                        self.view.notify(&format!(
                            "Renaming \"{}\": type the new name, /esc to cancel.",
                            name
                        ));
                    }
                    None => self
                        .view
                        .show_error(&format!("Chat {} is not in the list; try /list", id)),
                }
            }
            AppMsg::EditRename(value) => self.rename.set_value(&value),
            AppMsg::SubmitRename => self.finish_rename(None).await,
            AppMsg::CancelRename => {
                if self.rename.cancel() {
                    self.view.notify("Rename cancelled.");
                }
            }
            AppMsg::BlurRename => {
                self.rename.schedule_blur_commit();
            }
            AppMsg::RenameBlurElapsed(ticket) => self.finish_rename(Some(ticket)).await,
            AppMsg::SetTheme(theme) => match theme::set(theme) {
                Ok(()) => self.view.notify(&format!("Theme: {}", theme.as_str())),
                Err(e) => self.view.show_error(&format!("Failed to save theme: {:#}", e)),
            },
            AppMsg::ShowSettings => {
                let backend = self.backend.clone();
                self.command(async move {
                    let result = backend
                        .get_settings()
                        .await
                        .map_err(|e| format!("Failed to load settings: {}", e));
                    AppCmd::SettingsLoaded(result)
                });
            }
            AppMsg::UpdateSettings(url, context_message_count) => {
                let url = match config::parse_http_url("lm_studio_base_url", &url) {
                    Ok(url) => url,
                    Err(e) => {
                        self.view.show_error(&e.to_string());
                        return;
                    }
                };
                let settings = BackendSettings {
                    lm_studio_base_url: url.to_string(),
                    context_message_count,
                };
                let backend = self.backend.clone();
                self.command(async move {
                    let result = backend
                        .put_settings(settings)
                        .await
                        .map_err(|e| format!("Failed to save settings: {}", e));
                    AppCmd::SettingsSaved(result)
                });
            }
        }
    }

    fn send_message(&mut self, text: &str) {
        if self.sending {
            self.view.show_error("Still waiting for the previous reply");
            return;
        }
        let Some(model) = self.selection.model.clone() else {
            self.view.show_error("Select a model first (/models)");
            return;
        };
        let Some(prompt) = chat::compose_prompt(text, &self.staged) else {
            return;
        };

        let conversation_id = match self.reconciler.prepare_exchange(&prompt) {
            Ok(id) => id,
            Err(e) => {
                self.view.show_error(&e.to_string());
                return;
            }
        };
        self.staged.clear();
        self.view.render_transcript(self.reconciler.active(), false);

        let request =
            chat::build_request(&model, prompt, &self.selection, conversation_id, &self.config);
        self.sending = true;
        let epoch = self.epoch;
        let backend = self.backend.clone();
        self.command(async move {
            let result = chat::send_exchange(backend, request).await;
            AppCmd::ExchangeDone { epoch, result }
        });
    }

    pub async fn update_cmd(&mut self, cmd: AppCmd) {
        match cmd {
            AppCmd::ConversationsLoaded { generation, result } => match result {
                Ok(list) => {
                    self.summaries.apply(generation, list);
                    if std::mem::take(&mut self.list_requested) {
                        self.view.render_summaries(
                            self.summaries.summaries(),
                            self.reconciler.active_id(),
                        );
                    }
                }
                Err(e) => {
                    self.list_requested = false;
                    self.view.show_error(&e);
                }
            },
            AppCmd::ConversationFetched { id, result } => match result {
                Ok(conversation) => {
                    if self.reconciler.apply_fetched(conversation) == Applied::Replaced {
                        self.view.render_transcript(self.reconciler.active(), false);
                    }
                }
                Err(e) => {
                    self.reconciler.fetch_failed(id);
                    self.view.show_error(&e);
                }
            },
            AppCmd::ExchangeDone { epoch, result } => {
                self.sending = false;
                match result {
                    Ok(reply) => {
                        self.summaries.invalidate();
                        if epoch == self.epoch {
                            let id = self.reconciler.on_exchange_complete(&reply);
                            self.spawn_fetch(id);
                        } else {
                            tracing::debug!(
                                "Reply for chat {} arrived after navigation; not reloading",
                                reply.conversation_id
                            );
                        }
                    }
                    Err(e) => self.view.show_error(&e),
                }
            }
            AppCmd::Deleted(id, result) => match result {
                Ok(()) => {
                    self.summaries.invalidate();
                    if self.rename.editing_key() == Some(&id) {
                        self.rename.cancel();
                    }
                    if self.reconciler.active_id() == Some(id) {
                        self.leave_conversation();
                        self.reconciler.new_conversation();
                        self.view.render_transcript(None, false);
                    }
                    self.view.notify(&format!("Deleted chat {}.", id));
                }
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::Renamed(id, name, result) => match result {
                Ok(()) => {
                    self.summaries.invalidate();
                    self.view.notify(&format!("Renamed chat {} to \"{}\".", id, name));
                }
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::CatalogLoaded(result) => match result {
                Ok((models, personas)) => {
                    self.models = models;
                    self.personas = personas;
                    if self
                        .selection
                        .persona_id
                        .is_some_and(|id| !self.personas.iter().any(|p| p.id == id))
                    {
                        self.selection.persona_id = None;
                    }
                    self.settle_model();
                    self.render_catalog();
                }
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::ModelsRefreshed(result) => match result {
                Ok(models) => {
                    self.models = models;
                    self.settle_model();
                    self.render_catalog();
                }
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::PersonasChanged(result) => match result {
                Ok(notice) => {
                    self.view.notify(&notice);
                    self.load_catalog();
                }
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::FilesLoaded(result) => match result {
                Ok(loaded) => {
                    self.staged.extend(loaded);
                    self.view.render_staged(&self.staged);
                }
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::SettingsLoaded(result) => match result {
                Ok(settings) => self.view.notify(&describe_settings(&settings)),
                Err(e) => self.view.show_error(&e),
            },
            AppCmd::SettingsSaved(result) => match result {
                Ok(settings) => {
                    self.view.notify(&describe_settings(&settings));
                    self.refresh_models();
                }
                Err(e) => self.view.show_error(&e),
            },
        }
    }
}

fn describe_settings(settings: &BackendSettings) -> String {
    match settings.context_message_count {
        Some(count) => format!(
            "LM Studio: {} (context: {} messages)",
            settings.lm_studio_base_url, count
        ),
        None => format!("LM Studio: {}", settings.lm_studio_base_url),
    }
}
