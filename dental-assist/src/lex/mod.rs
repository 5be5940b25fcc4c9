//! Client for the external conversational runtime (Amazon Lex).
//!
//! The runtime owns the dialog: intents, slots and dialog states are its
//! protocol, not ours. This module only sends text turns, merges the session
//! attributes that come back, and normalizes replies and failures into the
//! shapes the controllers work with.

pub mod client;
pub mod error;
pub mod response;
pub mod runtime;
pub mod scripted;

pub use client::{BotConfig, LexChatbot, SessionInfo};
pub use error::{ErrorInfo, RuntimeError, classify_error, codes};
pub use response::{BotReply, ResponseKind, RuntimeReply};
pub use runtime::{AwsLexRuntime, BotRuntime, PostTextRequest};
pub use scripted::ScriptedRuntime;
