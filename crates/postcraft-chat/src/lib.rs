//! Conversational side of Postcraft.
//!
//! Parses finalized posts out of model replies, owns the single chat
//! session with the strategist persona, and records each exchange in the
//! state store.

pub mod conversation;
pub mod directive;
pub mod error;
pub mod gemini;
pub mod manager;
pub mod parser;
pub mod session;

pub use conversation::{Conversation, TurnOutcome};
pub use directive::STRATEGIST_DIRECTIVE;
pub use error::ChatError;
pub use gemini::GeminiChatService;
pub use manager::{ChatSessionManager, TurnReply};
pub use parser::ResponseParser;
pub use session::{ChatService, ChatSession, MockChatService};
