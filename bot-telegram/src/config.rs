//! Minimal Telegram config: token, API URL, log path.
//! Loaded from the environment: BOT_TOKEN (required), TELEGRAM_API_URL, LOG_FILE.

use bot_core::{BotError, Result};
use std::env;

/// Connection config for the Telegram transport plus the log file path.
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_url: Option<String>,
    pub log_file: Option<String>,
}

impl TelegramConfig {
    /// Loads from environment variables, with `token` overriding BOT_TOKEN when given.
    /// A missing token is a configuration error; the other values are optional.
    pub fn load(token: Option<String>) -> Result<Self> {
        let bot_token = match token {
            Some(token) => token,
            None => env::var("BOT_TOKEN")
                .map_err(|_| BotError::Config("BOT_TOKEN not set".to_string()))?,
        };
        let api_url = env::var("TELEGRAM_API_URL").ok();
        let log_file = env::var("LOG_FILE").ok();
        Ok(Self {
            bot_token,
            api_url,
            log_file,
        })
    }

    /// Loads from environment variables alone.
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Builds a config from the given token; everything else stays None.
    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            api_url: None,
            log_file: None,
        }
    }
}
