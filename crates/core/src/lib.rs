pub mod config;
pub mod conversation;
pub mod errors;

pub use conversation::{normalize, ConversationInput, InputError, Role, Transcript, Turn};
pub use errors::{FailureKind, InterfaceError};
