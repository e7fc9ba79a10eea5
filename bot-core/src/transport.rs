//! Transport abstraction over the messaging-platform client.
//!
//! [`Transport`] is the seam between the core and the platform: the runtime connects and
//! disconnects it, the router sends replies through it. Implementations live outside the
//! core (e.g. bot-telegram); tests substitute mock transports.

use crate::error::Result;
use crate::types::{Chat, Message};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Messaging-platform client contract: connect/disconnect lifecycle plus outbound send.
///
/// `connect` hands back the inbound message channel; the transport pushes every received
/// message into it until `disconnect` is called or the receiver is dropped.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connects to the platform and starts receiving. Returns the inbound channel.
    async fn connect(&self) -> Result<mpsc::Receiver<Message>>;

    /// Stops receiving and releases the connection. Safe to call when already disconnected.
    async fn disconnect(&self) -> Result<()>;

    /// Sends a text message to the given chat.
    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()>;

    /// Sends a reply to the given message (same chat).
    async fn reply_to(&self, message: &Message, text: &str) -> Result<()> {
        self.send_message(&message.chat, text).await
    }
}
