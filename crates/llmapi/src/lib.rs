//! Shared vocabulary for conversation-capable LLM backends.
//!
//! Provider adapters (Anthropic-style, NovelAI-style, ...) live elsewhere and
//! implement [`providers::base::Conversation`]. This crate holds the content
//! model they exchange and the contract they must honor.
pub mod errors;
pub mod models;
pub mod providers;

pub use errors::{ConversationError, ConversationResult};
pub use models::content::{ContentBlock, ContentType};
pub use models::message::{Message, RichMessage, RichResponse};
pub use models::role::Role;
pub use models::tool::ToolDefinition;
pub use providers::base::{Conversation, Reply, Sampling, StopReason, Usage};
pub use providers::configs::Settings;
