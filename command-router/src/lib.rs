//! # Command router
//!
//! Routes each inbound message to a registered [`CommandHandler`] by its leading command
//! token and dispatches it with the conversation's session. Messages that carry no
//! recognized command go to the fallback handler; a handler fault is caught, logged, and
//! answered with a generic failure reply — dispatch never lets a handler error escape
//! into the receive loop.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bot_core::{BotError, HandlerResponse, Message, Result, Transport};
use chrono::Utc;
use session_store::{Session, SessionStore};
use tracing::{error, info, instrument};

/// Command parsing rules. The prefix character and case handling are policy, not
/// hard-wired: some deployments use `/`, others `,`.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub prefix: char,
    pub case_sensitive: bool,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            prefix: '/',
            case_sensitive: false,
        }
    }
}

impl RoutingPolicy {
    /// Extracts the command token from message text: leading prefix stripped, cut at the
    /// first whitespace and at `@` (platforms append the bot name in group chats).
    /// Returns None when the text does not start with the prefix or the token is empty.
    pub fn command_token(&self, text: &str) -> Option<String> {
        let rest = text.trim_start().strip_prefix(self.prefix)?;
        let token = rest.split_whitespace().next()?;
        let token = token.split('@').next().unwrap_or(token);
        if token.is_empty() {
            return None;
        }
        Some(self.canonical(token))
    }

    fn canonical(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_lowercase()
        }
    }
}

/// User-supplied logic for one command. Invoked with the message and the conversation's
/// session; the session lock is held for the duration of the call.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, message: &Message, session: &mut Session) -> Result<HandlerResponse>;
}

/// Reply sent when a handler fails. The error itself only goes to the log.
const FAILURE_REPLY: &str = "Something went wrong handling that command. Please try again.";

/// Default fallback: points the user at /help.
struct UnknownCommandHandler;

#[async_trait]
impl CommandHandler for UnknownCommandHandler {
    async fn handle(&self, _message: &Message, _session: &mut Session) -> Result<HandlerResponse> {
        Ok(HandlerResponse::Reply(
            "Unknown command. Type /help to see available commands.".to_string(),
        ))
    }
}

/// Typed mapping from command name to handler, plus the dispatch loop's entry point.
pub struct CommandRouter {
    policy: RoutingPolicy,
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionStore>,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
    fallback: Arc<dyn CommandHandler>,
}

impl CommandRouter {
    /// Creates a router with the default policy and fallback.
    pub fn new(transport: Arc<dyn Transport>, sessions: Arc<SessionStore>) -> Self {
        Self {
            policy: RoutingPolicy::default(),
            transport,
            sessions,
            handlers: HashMap::new(),
            fallback: Arc::new(UnknownCommandHandler),
        }
    }

    /// Replaces the routing policy (prefix character, case sensitivity).
    pub fn with_policy(mut self, policy: RoutingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the fallback handler invoked for unrecognized commands and plain text.
    pub fn with_fallback(mut self, fallback: Arc<dyn CommandHandler>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Registers a handler under `name`. Names must be non-empty and unique.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) -> Result<()> {
        if name.is_empty() {
            return Err(BotError::Config("command name must not be empty".to_string()));
        }
        let name = self.policy.canonical(name);
        if self.handlers.contains_key(&name) {
            return Err(BotError::Config(format!("duplicate command: {}", name)));
        }
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Registered command names, sorted. Useful for help output.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Routes `message` to its handler and sends the reply, if any.
    ///
    /// The session lock is taken before the handler runs and released before the reply
    /// is sent. Handler and send failures are logged here; neither propagates.
    #[instrument(skip(self, message))]
    pub async fn dispatch(&self, message: &Message) {
        let token = self.policy.command_token(&message.content);
        let handler = token
            .as_deref()
            .and_then(|t| self.handlers.get(t))
            .cloned()
            .unwrap_or_else(|| self.fallback.clone());

        info!(
            user_id = message.user.id,
            chat_id = message.chat.id,
            message_id = %message.id,
            command = token.as_deref().unwrap_or("<fallback>"),
            "step: dispatch started"
        );

        let session = self.sessions.get_or_create(message.chat.id).await;
        let response = {
            let mut session = session.lock().await;
            session.touch(Utc::now());
            handler.handle(message, &mut session).await
        };

        match response {
            Ok(HandlerResponse::Reply(text)) => {
                if let Err(e) = self.transport.reply_to(message, &text).await {
                    error!(
                        error = %e,
                        chat_id = message.chat.id,
                        "step: reply send failed"
                    );
                }
            }
            Ok(HandlerResponse::Silent) => {}
            Err(e) => {
                error!(
                    error = %e,
                    user_id = message.user.id,
                    chat_id = message.chat.id,
                    command = token.as_deref().unwrap_or("<fallback>"),
                    "step: handler failed"
                );
                if let Err(e) = self.transport.reply_to(message, FAILURE_REPLY).await {
                    error!(error = %e, chat_id = message.chat.id, "step: failure reply send failed");
                }
            }
        }

        info!(
            user_id = message.user.id,
            chat_id = message.chat.id,
            message_id = %message.id,
            "step: dispatch finished"
        );
    }
}

// Unit/integration tests live in tests/command_router_test.rs
