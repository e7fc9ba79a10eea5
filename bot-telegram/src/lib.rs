//! # bot-telegram
//!
//! Telegram layer: [`TelegramTransport`] implements [`bot_core::Transport`] over
//! teloxide long polling, adapters convert teloxide types to core types, and
//! [`TelegramConfig`] loads the token and API URL from the environment. Only this
//! crate touches teloxide; the rest of the workspace is transport-agnostic.

mod adapters;
mod config;
mod transport;

pub use adapters::{TelegramMessageWrapper, TelegramUserWrapper};
pub use config::TelegramConfig;
pub use transport::TelegramTransport;
