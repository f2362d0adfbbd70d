use tokio::sync::watch;

use crate::models::{ConversationId, ConversationSummary};

/// Conversation list for the sidebar.
///
/// Mutations never patch the list locally. They call [`invalidate`], which
/// bumps a counter published on a watch channel; subscribers re-fetch and
/// hand the result to [`apply`].
///
/// [`invalidate`]: SummaryCacheSync::invalidate
/// [`apply`]: SummaryCacheSync::apply
pub struct SummaryCacheSync {
    summaries: Vec<ConversationSummary>,
    counter: watch::Sender<u64>,
    loaded_at: Option<u64>,
}

impl Default for SummaryCacheSync {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryCacheSync {
    pub fn new() -> Self {
        let (counter, _) = watch::channel(0);
        Self {
            summaries: Vec::new(),
            counter,
            loaded_at: None,
        }
    }

    pub fn summaries(&self) -> &[ConversationSummary] {
        &self.summaries
    }

    pub fn find(&self, id: ConversationId) -> Option<&ConversationSummary> {
        self.summaries.iter().find(|s| s.id == id)
    }

    pub fn invalidation_count(&self) -> u64 {
        *self.counter.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.counter.subscribe()
    }

    pub fn invalidate(&self) {
        self.counter.send_modify(|n| *n += 1);
        tracing::debug!("Summary list invalidated ({})", self.invalidation_count());
    }

    /// Never loaded, or invalidated since the last successful load.
    pub fn is_stale(&self) -> bool {
        self.loaded_at != Some(self.invalidation_count())
    }

    /// Replace the list wholesale with one fetched when the counter read
    /// `generation`. A failed fetch never reaches here, so the previous list
    /// stays.
    pub fn apply(&mut self, generation: u64, summaries: Vec<ConversationSummary>) {
        self.summaries = summaries;
        self.loaded_at = Some(generation);
    }
}
