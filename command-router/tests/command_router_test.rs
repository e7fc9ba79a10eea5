//! Integration tests for [`command_router::CommandRouter`].
//!
//! Covers: routing to the registered handler exactly once, fallback for unknown commands
//! and plain text, duplicate/empty registration failures, handler-fault isolation,
//! configurable prefix policy, and session state surviving across dispatches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bot_core::{
    BotError, Chat, HandlerResponse, Message, MessageDirection, Result, Transport, User,
};
use chrono::Utc;
use command_router::{CommandHandler, CommandRouter, RoutingPolicy};
use serde_json::json;
use session_store::{Session, SessionStore};
use tokio::sync::{mpsc, Mutex};

fn create_test_message(chat_id: i64, content: &str) -> Message {
    Message {
        id: "test_message_id".to_string(),
        user: User {
            id: 123,
            username: Some("test_user".to_string()),
            first_name: Some("Test".to_string()),
            last_name: None,
        },
        chat: Chat {
            id: chat_id,
            chat_type: "private".to_string(),
        },
        content: content.to_string(),
        direction: MessageDirection::Incoming,
        created_at: Utc::now(),
    }
}

/// Transport that records every outbound send. `connect` is unused by router tests.
struct RecordingTransport {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<Message>> {
        let (_tx, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn send_message(&self, chat: &Chat, text: &str) -> Result<()> {
        self.sent.lock().await.push((chat.id, text.to_string()));
        Ok(())
    }
}

/// Handler that counts invocations and replies with a fixed text.
struct CountingHandler {
    calls: Arc<AtomicUsize>,
    reply: String,
}

#[async_trait]
impl CommandHandler for CountingHandler {
    async fn handle(&self, _message: &Message, _session: &mut Session) -> Result<HandlerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(HandlerResponse::Reply(self.reply.clone()))
    }
}

fn router_fixture() -> (Arc<RecordingTransport>, Arc<SessionStore>, CommandRouter) {
    let transport = Arc::new(RecordingTransport::new());
    let sessions = Arc::new(SessionStore::default());
    let router = CommandRouter::new(transport.clone(), sessions.clone());
    (transport, sessions, router)
}

/// **Test: dispatching "/start" invokes the registered handler exactly once, sends
/// exactly one "Welcome" reply, and creates a session for the conversation.**
#[tokio::test]
async fn test_registered_command_dispatched_once() {
    let (transport, sessions, mut router) = router_fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    router
        .register(
            "start",
            Arc::new(CountingHandler {
                calls: calls.clone(),
                reply: "Welcome".to_string(),
            }),
        )
        .unwrap();

    router.dispatch(&create_test_message(42, "/start")).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.sent().await, vec![(42, "Welcome".to_string())]);
    assert!(sessions.contains(42).await);
}

/// **Test: an unregistered command goes to the fallback exactly once; nothing propagates.**
#[tokio::test]
async fn test_unknown_command_goes_to_fallback() {
    let (transport, _sessions, mut router) = router_fixture();
    let registered = Arc::new(AtomicUsize::new(0));
    let fallback = Arc::new(AtomicUsize::new(0));

    router
        .register(
            "start",
            Arc::new(CountingHandler {
                calls: registered.clone(),
                reply: "Welcome".to_string(),
            }),
        )
        .unwrap();
    let router = router.with_fallback(Arc::new(CountingHandler {
        calls: fallback.clone(),
        reply: "Unknown input.".to_string(),
    }));

    router.dispatch(&create_test_message(1, "/foo")).await;

    assert_eq!(registered.load(Ordering::SeqCst), 0);
    assert_eq!(fallback.load(Ordering::SeqCst), 1);
    assert_eq!(transport.sent().await, vec![(1, "Unknown input.".to_string())]);
}

/// **Test: plain text without the command prefix goes to the fallback.**
#[tokio::test]
async fn test_plain_text_goes_to_fallback() {
    let (_transport, _sessions, router) = router_fixture();
    let fallback = Arc::new(AtomicUsize::new(0));
    let router = router.with_fallback(Arc::new(CountingHandler {
        calls: fallback.clone(),
        reply: "Unknown input.".to_string(),
    }));

    router.dispatch(&create_test_message(1, "hello there")).await;

    assert_eq!(fallback.load(Ordering::SeqCst), 1);
}

/// **Test: registering a duplicate command name fails with a configuration error;
/// empty names are rejected too.**
#[tokio::test]
async fn test_duplicate_and_empty_registration_fail() {
    let (_transport, _sessions, mut router) = router_fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = || {
        Arc::new(CountingHandler {
            calls: calls.clone(),
            reply: String::new(),
        })
    };

    router.register("start", handler()).unwrap();
    let duplicate = router.register("start", handler());
    assert!(matches!(duplicate, Err(BotError::Config(_))));

    // Case-insensitive policy: "START" collides with "start".
    let shadowed = router.register("START", handler());
    assert!(matches!(shadowed, Err(BotError::Config(_))));

    let empty = router.register("", handler());
    assert!(matches!(empty, Err(BotError::Config(_))));
}

/// **Test: a handler error is caught, a generic failure reply is sent, and dispatch
/// returns normally.**
#[tokio::test]
async fn test_handler_fault_is_isolated() {
    struct FailingHandler;

    #[async_trait]
    impl CommandHandler for FailingHandler {
        async fn handle(
            &self,
            _message: &Message,
            _session: &mut Session,
        ) -> Result<HandlerResponse> {
            Err(BotError::Handler(bot_core::HandlerError::Failed(
                "boom".to_string(),
            )))
        }
    }

    let (transport, _sessions, mut router) = router_fixture();
    router.register("boom", Arc::new(FailingHandler)).unwrap();

    router.dispatch(&create_test_message(9, "/boom")).await;

    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 9);
    assert!(sent[0].1.contains("Something went wrong"));
}

/// **Test: a handler returning Silent ends dispatch without any outbound send.**
#[tokio::test]
async fn test_silent_handler_sends_nothing() {
    struct SilentHandler;

    #[async_trait]
    impl CommandHandler for SilentHandler {
        async fn handle(
            &self,
            _message: &Message,
            _session: &mut Session,
        ) -> Result<HandlerResponse> {
            Ok(HandlerResponse::Silent)
        }
    }

    let (transport, sessions, mut router) = router_fixture();
    router.register("mute", Arc::new(SilentHandler)).unwrap();

    router.dispatch(&create_test_message(2, "/mute")).await;

    assert!(transport.sent().await.is_empty());
    // Dispatch still creates and touches the session.
    assert!(sessions.contains(2).await);
}

/// **Test: the routing prefix is policy — a comma-prefix router routes ",HELP now"
/// to the handler registered as "help".**
#[tokio::test]
async fn test_comma_prefix_policy() {
    let (transport, _sessions, router) = router_fixture();
    let mut router = router.with_policy(RoutingPolicy {
        prefix: ',',
        case_sensitive: false,
    });
    let calls = Arc::new(AtomicUsize::new(0));
    router
        .register(
            "help",
            Arc::new(CountingHandler {
                calls: calls.clone(),
                reply: "Help Menu".to_string(),
            }),
        )
        .unwrap();

    router.dispatch(&create_test_message(5, ",HELP now")).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.sent().await, vec![(5, "Help Menu".to_string())]);
}

/// **Test: a "@botname" suffix on the command token is stripped before lookup.**
#[tokio::test]
async fn test_bot_mention_suffix_stripped() {
    let (_transport, _sessions, mut router) = router_fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    router
        .register(
            "start",
            Arc::new(CountingHandler {
                calls: calls.clone(),
                reply: "Welcome".to_string(),
            }),
        )
        .unwrap();

    router
        .dispatch(&create_test_message(3, "/start@some_bot args"))
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

/// **Test: session mutations made by a handler survive into the next dispatch for the
/// same conversation and are not shared across conversations.**
#[tokio::test]
async fn test_session_state_persists_across_dispatches() {
    struct CountCommand;

    #[async_trait]
    impl CommandHandler for CountCommand {
        async fn handle(
            &self,
            _message: &Message,
            session: &mut Session,
        ) -> Result<HandlerResponse> {
            let n = session
                .get("count")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0)
                + 1;
            session.set("count", json!(n));
            Ok(HandlerResponse::Reply(n.to_string()))
        }
    }

    let (transport, _sessions, mut router) = router_fixture();
    router.register("count", Arc::new(CountCommand)).unwrap();

    router.dispatch(&create_test_message(10, "/count")).await;
    router.dispatch(&create_test_message(10, "/count")).await;
    router.dispatch(&create_test_message(11, "/count")).await;

    assert_eq!(
        transport.sent().await,
        vec![
            (10, "1".to_string()),
            (10, "2".to_string()),
            (11, "1".to_string()),
        ]
    );
}
