//! Chat with the ThalAssist assistant.
//!
//! This module keeps a conversation transcript on top of the session client
//! and provides the pieces of the `thalassist-chat` REPL:
//!
//! - [`conversation`]: the transcript and the send/reply cycle
//! - [`endpoint`]: the remote chat services a conversation can use
//! - [`message`]: transcript entries and the reply model
//! - [`render`]: terminal output
//! - [`commands`]: slash command parsing
//! - [`config`]: CLI argument parsing and configuration

mod commands;
mod config;
mod conversation;
mod endpoint;
mod message;
mod render;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, EndpointFlavor};
pub use conversation::{Conversation, ConversationStats, SendStatus};
pub use endpoint::{
    ADVISOR_ENDPOINT, ANALYTICS_ENDPOINT, ASSISTANT_ENDPOINT, AdvisorEndpoint, AssistantEndpoint,
    ChatEndpoint,
};
pub use message::{AssistantReply, ChatEntry, REPLY_ERROR_TEXT, ReplyKind, greeting};
pub use render::{PlainTextRenderer, Renderer, format_entry};
