//! Single-field in-place edits (conversation rename).
//!
//! Submit, cancel and blur can all try to finish the same edit. A blur only
//! schedules a commit: the deferred task reports its ticket back over a
//! channel after [`BLUR_COMMIT_DELAY`], and the owner hands the ticket to
//! [`EditCommitCoordinator::blur_elapsed`]. Anything that closes or restarts
//! the session in the meantime cancels the task and invalidates the ticket.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const BLUR_COMMIT_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlurTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome<K> {
    Committed { key: K, value: String },
    /// The session closed without a commit (empty or unchanged value).
    Unchanged,
    /// No session was open, or the ticket was no longer current.
    Inactive,
}

struct EditSession<K> {
    key: K,
    original: String,
    value: String,
}

struct PendingCommit {
    ticket: BlurTicket,
    cancel: CancellationToken,
}

pub struct EditCommitCoordinator<K> {
    session: Option<EditSession<K>>,
    pending: Option<PendingCommit>,
    next_ticket: u64,
    notify: mpsc::UnboundedSender<BlurTicket>,
}

impl<K: Clone> EditCommitCoordinator<K> {
    pub fn new(notify: mpsc::UnboundedSender<BlurTicket>) -> Self {
        Self {
            session: None,
            pending: None,
            next_ticket: 0,
            notify,
        }
    }

    pub fn start_edit(&mut self, key: K, initial: &str) {
        self.clear_timer();
        self.session = Some(EditSession {
            key,
            original: initial.to_string(),
            value: initial.to_string(),
        });
    }

    pub fn set_value(&mut self, value: &str) {
        if let Some(session) = &mut self.session {
            session.value = value.to_string();
        }
    }

    pub fn is_editing(&self) -> bool {
        self.session.is_some()
    }

    pub fn editing_key(&self) -> Option<&K> {
        self.session.as_ref().map(|s| &s.key)
    }

    pub fn has_pending_commit(&self) -> bool {
        self.pending.is_some()
    }

    /// Close the session without committing. Returns whether one was open.
    pub fn cancel(&mut self) -> bool {
        self.clear_timer();
        self.session.take().is_some()
    }

    /// Commit after [`BLUR_COMMIT_DELAY`] unless something else finishes the
    /// session first. Replaces any earlier pending commit.
    pub fn schedule_blur_commit(&mut self) -> Option<BlurTicket> {
        self.session.as_ref()?;
        self.clear_timer();

        self.next_ticket += 1;
        let ticket = BlurTicket(self.next_ticket);
        let cancel = CancellationToken::new();
        let notify = self.notify.clone();
        let token = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(BLUR_COMMIT_DELAY) => {
                    let _ = notify.send(ticket);
                }
            }
        });

        self.pending = Some(PendingCommit { ticket, cancel });
        Some(ticket)
    }

    /// Run the deferred submit for `ticket` if it is still the pending one.
    pub async fn blur_elapsed<F, Fut, E>(
        &mut self,
        ticket: BlurTicket,
        commit: F,
    ) -> Result<SubmitOutcome<K>, E>
    where
        F: FnOnce(K, String) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        if self.pending.as_ref().map(|p| p.ticket) != Some(ticket) {
            tracing::debug!("Ignoring stale blur ticket {:?}", ticket);
            return Ok(SubmitOutcome::Inactive);
        }
        self.pending = None;
        self.submit(commit).await
    }

    /// Close the session, invoking `commit` once with the trimmed value when
    /// it is non-empty and differs from the starting value as stored. The session is
    /// closed whether or not the commit succeeds.
    pub async fn submit<F, Fut, E>(&mut self, commit: F) -> Result<SubmitOutcome<K>, E>
    where
        F: FnOnce(K, String) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.clear_timer();
        let Some(session) = self.session.take() else {
            return Ok(SubmitOutcome::Inactive);
        };

        let value = session.value.trim();
        if value.is_empty() || value == session.original {
            return Ok(SubmitOutcome::Unchanged);
        }

        let value = value.to_string();
        commit(session.key.clone(), value.clone()).await?;
        Ok(SubmitOutcome::Committed {
            key: session.key,
            value,
        })
    }

    fn clear_timer(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }
}

impl<K> Drop for EditCommitCoordinator<K> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.cancel.cancel();
        }
    }
}
