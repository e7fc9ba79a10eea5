//! Core types: user, chat, message, and handler response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User identity (id, username, names).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Chat (group or private) identity. `id` is the conversation id used as the session key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub chat_type: String,
}

/// A single inbound or outbound message. Inbound messages are immutable values:
/// the router and handlers read them but never mutate them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub user: User,
    pub chat: Chat,
    pub content: String,
    pub direction: MessageDirection,
    pub created_at: DateTime<Utc>,
}

/// Direction of the message (from user or from bot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageDirection {
    Incoming,
    Outgoing,
}

/// Outcome of a command handler. `Reply(text)` makes the router send the text back to
/// the message's chat; `Silent` ends dispatch with no reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Send this text back to the conversation.
    Reply(String),
    /// Handled, nothing to send.
    Silent,
}
