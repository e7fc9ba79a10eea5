//! Teloxide-backed [`Transport`]: long-poll receive loop feeding the inbound channel.
//!
//! `connect` verifies the token with get_me, then spawns a get_updates loop that
//! converts each message to a core [`Message`] and pushes it into the channel. The loop
//! stops on `disconnect` or when the runtime drops the receiver; the lifecycle
//! controller owns both of those, which is why this crate does not use teloxide's REPL.

use std::sync::Arc;

use async_trait::async_trait;
use bot_core::{BotError, Chat, Message, Result, Transport};
use teloxide::payloads::GetUpdatesSetters;
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::UpdateKind;
use tokio::sync::{mpsc, Notify};
use tokio::time::Duration;
use tracing::{info, warn};

use crate::adapters::TelegramMessageWrapper;
use crate::config::TelegramConfig;

/// Long-poll timeout passed to get_updates.
const POLL_TIMEOUT_SECS: u32 = 30;
/// Inbound channel capacity; polling backpressures when dispatch falls behind.
const INBOUND_BUFFER: usize = 100;
/// Wait before retrying after a failed get_updates call.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Telegram implementation of [`Transport`].
pub struct TelegramTransport {
    bot: teloxide::Bot,
    stop: Arc<Notify>,
}

impl TelegramTransport {
    /// Creates a transport from an existing teloxide Bot.
    pub fn new(bot: teloxide::Bot) -> Self {
        Self {
            bot,
            stop: Arc::new(Notify::new()),
        }
    }

    /// Creates a transport from config: token plus optional custom API URL.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let mut bot = teloxide::Bot::new(config.bot_token.clone());
        if let Some(url) = &config.api_url {
            let url = reqwest::Url::parse(url)
                .map_err(|e| BotError::Config(format!("invalid TELEGRAM_API_URL: {}", e)))?;
            bot = bot.set_api_url(url);
        }
        Ok(Self::new(bot))
    }

    /// Returns the underlying teloxide Bot for direct API use when needed.
    pub fn inner(&self) -> &teloxide::Bot {
        &self.bot
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<Message>> {
        // get_me proves the token and the network before the runtime goes Running.
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        info!(
            username = me.user.username.as_deref().unwrap_or(""),
            "connected to Telegram"
        );

        let (tx, rx) = mpsc::channel(INBOUND_BUFFER);
        tokio::spawn(poll_updates(self.bot.clone(), tx, self.stop.clone()));
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        self.stop.notify_one();
        Ok(())
    }

    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat.id), text.to_string())
            .await
            .map_err(|e| BotError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// get_updates loop: tracks the update offset, forwards text messages to `tx`.
async fn poll_updates(bot: teloxide::Bot, tx: mpsc::Sender<Message>, stop: Arc<Notify>) {
    let mut offset: Option<i32> = None;
    loop {
        let mut request = bot.get_updates().timeout(POLL_TIMEOUT_SECS);
        if let Some(offset) = offset {
            request = request.offset(offset);
        }

        let updates = tokio::select! {
            _ = stop.notified() => break,
            result = request.send() => result,
        };

        match updates {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.id.as_offset());
                    if let UpdateKind::Message(message) = update.kind {
                        let core_msg = TelegramMessageWrapper(&message).to_core();
                        info!(
                            user_id = core_msg.user.id,
                            chat_id = core_msg.chat.id,
                            message_id = %core_msg.id,
                            "received message"
                        );
                        if tx.send(core_msg).await.is_err() {
                            info!("inbound receiver dropped, update polling stopped");
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "get_updates failed, retrying");
                tokio::time::sleep(POLL_RETRY_DELAY).await;
            }
        }
    }
    info!("update polling stopped");
}
