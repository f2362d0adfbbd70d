pub mod attachments;
pub mod chat;
pub mod conversation;
pub mod edit;
pub mod files;
pub mod settings;
pub mod summaries;
pub mod theme;

pub use conversation::ConversationReconciler;
pub use edit::EditCommitCoordinator;
pub use settings::PreferenceStore;
pub use summaries::SummaryCacheSync;
