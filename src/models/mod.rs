pub mod attachment;
pub mod conversation;
pub mod message;
pub mod persona;
pub mod timestamp;

pub use attachment::Attachment;
pub use conversation::{Conversation, ConversationId, ConversationSummary};
pub use message::{Message, MessageId, Role};
pub use persona::{ModelInfo, Persona, PersonaId, PersonaInput};
