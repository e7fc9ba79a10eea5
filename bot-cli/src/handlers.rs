//! Built-in commands: greeting, help menu, per-conversation message counter, and the
//! unknown-input fallback.

use async_trait::async_trait;
use bot_core::{HandlerResponse, Message, Result};
use command_router::CommandHandler;
use serde_json::json;
use session_store::Session;

/// /start: greeting pointing at /help.
pub struct StartHandler;

#[async_trait]
impl CommandHandler for StartHandler {
    async fn handle(&self, _message: &Message, _session: &mut Session) -> Result<HandlerResponse> {
        Ok(HandlerResponse::Reply(
            "Welcome! Type /help to see available commands.".to_string(),
        ))
    }
}

/// /help: static command list.
pub struct HelpHandler;

#[async_trait]
impl CommandHandler for HelpHandler {
    async fn handle(&self, _message: &Message, _session: &mut Session) -> Result<HandlerResponse> {
        Ok(HandlerResponse::Reply(
            "Available commands:\n\
             /start - Greeting\n\
             /help - This menu\n\
             /count - Messages seen in this conversation"
                .to_string(),
        ))
    }
}

/// /count: increments and reports a counter kept in the conversation's session bag.
pub struct CountHandler;

const COUNT_KEY: &str = "count";

#[async_trait]
impl CommandHandler for CountHandler {
    async fn handle(&self, _message: &Message, session: &mut Session) -> Result<HandlerResponse> {
        let count = session
            .get(COUNT_KEY)
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0)
            + 1;
        session.set(COUNT_KEY, json!(count));
        Ok(HandlerResponse::Reply(format!(
            "Messages seen in this conversation: {}",
            count
        )))
    }
}
