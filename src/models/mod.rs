pub mod citation;
pub mod conversation;
pub mod message;

pub use citation::Citation;
pub use conversation::Conversation;
pub use message::{Draft, Message, MessageId, Sender};
