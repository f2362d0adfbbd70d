//! The active conversation's transcript.
//!
//! User messages are shown optimistically as soon as they are submitted.
//! Assistant replies are never taken from the exchange response: a completed
//! exchange always re-fetches the conversation, and that fetch replaces the
//! transcript wholesale.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::backend::ChatReply;
use crate::models::{Conversation, ConversationId, Message, MessageId, Role};

/// How close in time an identical message must be to count as a repeat.
pub const DEDUP_WINDOW_SECS: i64 = 5;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("No active conversation")]
    NoActiveConversation,

    #[error("Still loading the selected conversation")]
    Loading,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outcome of applying a fetched conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Replaced,
    Stale,
}

pub struct ConversationReconciler {
    active: Option<Conversation>,
    loading: bool,
    requested: Option<ConversationId>,
    last_local_id: u64,
    clock: Arc<dyn Clock>,
}

impl Default for ConversationReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationReconciler {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            active: None,
            loading: false,
            requested: None,
            last_local_id: 0,
            clock,
        }
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active.as_ref()
    }

    pub fn active_id(&self) -> Option<ConversationId> {
        self.active.as_ref().and_then(|c| c.id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Back to the empty state; nothing from the previous conversation
    /// survives.
    pub fn new_conversation(&mut self) {
        self.active = None;
        self.loading = false;
        self.requested = None;
    }

    /// Install an unsaved conversation if none is active.
    pub fn begin_draft(&mut self) -> &Conversation {
        self.active.get_or_insert_with(Conversation::draft)
    }

    /// Mark `id` as the conversation the next fetch result must belong to.
    pub fn begin_select(&mut self, id: ConversationId) {
        self.loading = true;
        self.requested = Some(id);
    }

    /// Replace the transcript with a fetched copy, unless a different
    /// conversation has been requested since.
    pub fn apply_fetched(&mut self, conversation: Conversation) -> Applied {
        if conversation.id.is_none() || conversation.id != self.requested {
            tracing::debug!(
                "Discarding stale conversation {:?} (requested {:?})",
                conversation.id,
                self.requested
            );
            return Applied::Stale;
        }
        self.active = Some(conversation);
        self.loading = false;
        Applied::Replaced
    }

    /// A fetch for `id` failed; the current transcript stays as it is.
    pub fn fetch_failed(&mut self, id: ConversationId) {
        if self.requested == Some(id) {
            self.loading = false;
        }
    }

    /// Append a provisional message, unless an identical one (same role and
    /// content) was created within the dedup window. Returns the id of the
    /// inserted message, or `None` for a suppressed repeat.
    pub fn append_optimistic(
        &mut self,
        role: Role,
        content: &str,
    ) -> Result<Option<MessageId>, ReconcileError> {
        let now = self.clock.now();
        let window_ms = DEDUP_WINDOW_SECS * 1000;

        let conversation = self
            .active
            .as_mut()
            .ok_or(ReconcileError::NoActiveConversation)?;

        let repeated = conversation.messages.iter().any(|m| {
            m.role == role
                && m.content == content
                && (m.created_at - now).num_milliseconds().abs() < window_ms
        });
        if repeated {
            tracing::debug!("Suppressed duplicate {} message", role.as_str());
            return Ok(None);
        }

        let id = Self::next_local_id(&mut self.last_local_id, now);
        conversation.messages.push(Message {
            id,
            role,
            content: content.to_string(),
            created_at: now,
            provisional: true,
        });
        Ok(Some(id))
    }

    /// Ephemeral ids are millisecond clock values, bumped when the clock has
    /// not advanced so that none is ever handed out twice.
    fn next_local_id(last: &mut u64, now: DateTime<Utc>) -> MessageId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        *last = millis.max(*last + 1);
        MessageId::Local(*last)
    }

    /// Stage `prompt` as the next user message and return the conversation
    /// the exchange belongs to (`None` for a new chat). Refused while a
    /// switch is loading: the transcript on screen is not the one selected.
    pub fn prepare_exchange(
        &mut self,
        prompt: &str,
    ) -> Result<Option<ConversationId>, ReconcileError> {
        if self.loading {
            return Err(ReconcileError::Loading);
        }
        self.begin_draft();
        self.append_optimistic(Role::User, prompt)?;
        Ok(self.active_id())
    }

    /// Finish a successful exchange. The reply text is not used:
    /// the caller fetches the returned id and hands it to `apply_fetched`.
    pub fn on_exchange_complete(&mut self, reply: &ChatReply) -> ConversationId {
        tracing::debug!(
            "Exchange complete for conversation {} ({} chars); re-fetching",
            reply.conversation_id,
            reply.content.len()
        );
        self.begin_select(reply.conversation_id);
        reply.conversation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use crate::backend::{ChatBackend, ChatRequest};
    use chrono::Duration;
    use std::sync::Mutex;

    struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now += Duration::seconds(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    async fn fetch(backend: &FakeBackend, id: ConversationId) -> Conversation {
        backend.get_conversation(id).await.unwrap().into_conversation()
    }

    fn reply(conversation_id: ConversationId) -> ChatReply {
        ChatReply {
            content: "ignored".to_string(),
            raw: serde_json::Value::Null,
            conversation_id,
        }
    }

    #[test]
    fn test_append_requires_active_conversation() {
        let mut reconciler = ConversationReconciler::new();
        let err = reconciler.append_optimistic(Role::User, "hi").unwrap_err();
        assert!(matches!(err, ReconcileError::NoActiveConversation));
    }

    #[test]
    fn test_duplicate_within_window_is_suppressed() {
        let mut reconciler = ConversationReconciler::new();
        reconciler.begin_draft();

        assert!(reconciler.append_optimistic(Role::User, "hi").unwrap().is_some());
        assert!(reconciler.append_optimistic(Role::User, "hi").unwrap().is_none());

        let messages = &reconciler.active().unwrap().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert!(messages[0].provisional);
        assert!(messages[0].id.is_local());
    }

    #[test]
    fn test_duplicate_after_window_is_kept() {
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let mut reconciler = ConversationReconciler::with_clock(clock.clone());
        reconciler.begin_draft();

        reconciler.append_optimistic(Role::User, "again").unwrap();
        clock.advance(DEDUP_WINDOW_SECS + 1);
        reconciler.append_optimistic(Role::User, "again").unwrap();

        assert_eq!(reconciler.active().unwrap().messages.len(), 2);
    }

    #[test]
    fn test_different_role_is_not_a_duplicate() {
        let mut reconciler = ConversationReconciler::new();
        reconciler.begin_draft();
        reconciler.append_optimistic(Role::User, "ok").unwrap();
        reconciler.append_optimistic(Role::Assistant, "ok").unwrap();
        assert_eq!(reconciler.active().unwrap().messages.len(), 2);
    }

    #[test]
    fn test_local_ids_are_unique_under_a_frozen_clock() {
        let clock = Arc::new(ManualClock(Mutex::new(Utc::now())));
        let mut reconciler = ConversationReconciler::with_clock(clock);
        reconciler.begin_draft();

        let a = reconciler.append_optimistic(Role::User, "a").unwrap().unwrap();
        let b = reconciler.append_optimistic(Role::User, "b").unwrap().unwrap();
        assert_ne!(a, b);
        let messages = &reconciler.active().unwrap().messages;
        assert!(messages[0].created_at <= messages[1].created_at);
    }

    #[tokio::test]
    async fn test_select_discards_provisional_messages() {
        let backend = FakeBackend::new();
        let other = backend.seed("Other", "question", "answer");

        let mut reconciler = ConversationReconciler::new();
        reconciler.prepare_exchange("x").unwrap();

        reconciler.begin_select(other);
        assert!(reconciler.is_loading());
        reconciler.apply_fetched(fetch(&backend, other).await);

        let active = reconciler.active().unwrap();
        assert_eq!(active.id, Some(other));
        assert!(active.messages.iter().all(|m| m.content != "x"));
        assert!(active.messages.iter().all(|m| !m.provisional));
        assert!(!reconciler.is_loading());
    }

    #[tokio::test]
    async fn test_exchange_reply_is_replaced_by_fetch() {
        let backend = FakeBackend::new();
        let mut reconciler = ConversationReconciler::new();

        assert_eq!(reconciler.prepare_exchange("Summarize").unwrap(), None);
        let stored = backend
            .chat(ChatRequest {
                model: "local-model".to_string(),
                persona_id: None,
                prompt: "Summarize".to_string(),
                temperature: None,
                max_tokens: None,
                conversation_id: None,
            })
            .await
            .unwrap();

        let id = reconciler.on_exchange_complete(&reply(stored.conversation_id));
        // Nothing from the reply lands before the fetch does.
        assert_eq!(reconciler.active().unwrap().messages.len(), 1);
        assert!(reconciler.is_loading());

        assert_eq!(reconciler.apply_fetched(fetch(&backend, id).await), Applied::Replaced);
        let active = reconciler.active().unwrap();
        assert_eq!(active.id, Some(id));
        assert_eq!(active.messages.len(), 2);
        assert_eq!(active.messages[0].content, "Summarize");
        assert_eq!(active.messages[1].role, Role::Assistant);
        assert!(active.messages.iter().all(|m| !m.provisional));

        assert_eq!(reconciler.prepare_exchange("And then?").unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_exchange_refused_while_switching() {
        let backend = FakeBackend::new();
        let first = backend.seed("First", "q1", "a1");
        let second = backend.seed("Second", "q2", "a2");

        let mut reconciler = ConversationReconciler::new();
        reconciler.begin_select(first);
        reconciler.apply_fetched(fetch(&backend, first).await);
        reconciler.begin_select(second);

        let err = reconciler.prepare_exchange("for second").unwrap_err();
        assert!(matches!(err, ReconcileError::Loading));
        assert_eq!(reconciler.active().unwrap().messages.len(), 2);
    }

    #[tokio::test]
    async fn test_stale_fetch_is_ignored() {
        let backend = FakeBackend::new();
        let first = backend.seed("First", "q1", "a1");
        let second = backend.seed("Second", "q2", "a2");

        let mut reconciler = ConversationReconciler::new();
        reconciler.begin_select(first);
        reconciler.begin_select(second);

        let late = backend.get_conversation(first).await.unwrap().into_conversation();
        assert_eq!(reconciler.apply_fetched(late), Applied::Stale);
        assert!(reconciler.active().is_none());
        assert!(reconciler.is_loading());

        let current = backend.get_conversation(second).await.unwrap().into_conversation();
        assert_eq!(reconciler.apply_fetched(current), Applied::Replaced);
        assert_eq!(reconciler.active_id(), Some(second));
        assert!(!reconciler.is_loading());
    }

    #[tokio::test]
    async fn test_failed_select_keeps_current_transcript() {
        let backend = FakeBackend::new();
        let id = backend.seed("Kept", "q", "a");
        let mut reconciler = ConversationReconciler::new();
        reconciler.begin_select(id);
        reconciler.apply_fetched(fetch(&backend, id).await);

        reconciler.begin_select(404);
        assert!(backend.get_conversation(404).await.is_err());
        reconciler.fetch_failed(404);

        assert_eq!(reconciler.active_id(), Some(id));
        assert!(!reconciler.is_loading());
    }

    #[test]
    fn test_new_conversation_resets() {
        let mut reconciler = ConversationReconciler::new();
        reconciler.begin_draft();
        reconciler.append_optimistic(Role::User, "draft").unwrap();
        reconciler.new_conversation();
        assert!(reconciler.active().is_none());
    }
}
