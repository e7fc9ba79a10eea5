//! # bot-core
//!
//! Core types and traits for the bot: [`Transport`], message and user types, the error
//! taxonomy, and tracing initialization. Transport-agnostic; used by every other crate
//! in the workspace.

pub mod error;
pub mod logger;
pub mod transport;
pub mod types;

pub use error::{BotError, HandlerError, Result};
pub use logger::init_tracing;
pub use transport::Transport;
pub use types::{Chat, HandlerResponse, Message, MessageDirection, User};
