//! # session-store
//!
//! Per-conversation state. [`SessionStore`] maps conversation ids to [`Session`]s:
//! get-or-create never fails, there is exactly one session object per conversation id,
//! and each session sits behind its own mutex so concurrent dispatches against the same
//! conversation are serialized. Sessions idle past the configured timeout are removed by
//! [`SessionStore::evict_stale`], which the runtime calls periodically.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// State for one conversation: an arbitrary key-value bag plus the last-activity
/// timestamp used for eviction. Created by the store on first message; mutated only
/// by handlers holding the session lock.
#[derive(Debug)]
pub struct Session {
    conversation_id: i64,
    values: HashMap<String, Value>,
    last_activity: DateTime<Utc>,
}

impl Session {
    fn new(conversation_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            conversation_id,
            values: HashMap::new(),
            last_activity: now,
        }
    }

    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    /// Returns the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Removes and returns the value under `key`, if any.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Marks the session as active at `now`. The router calls this on every dispatch.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

/// Concurrency-safe store of [`Session`]s keyed by conversation id.
///
/// The outer `RwLock<HashMap>` guards the mapping; each session's own `Mutex` guards
/// its contents. Handlers therefore never observe divergent copies of a session and
/// updates from concurrent dispatches cannot be lost.
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Arc<Mutex<Session>>>>,
    idle_timeout: Duration,
}

/// Default inactivity timeout before a session is considered stale.
pub const DEFAULT_IDLE_TIMEOUT_HOURS: i64 = 24;

impl SessionStore {
    /// Creates a store with the given inactivity timeout.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Returns the session for `conversation_id`, creating it on first use.
    pub async fn get_or_create(&self, conversation_id: i64) -> Arc<Mutex<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&conversation_id) {
                return session.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        // Another task may have created it between the read and write locks.
        sessions
            .entry(conversation_id)
            .or_insert_with(|| {
                debug!(conversation_id, "session created");
                Arc::new(Mutex::new(Session::new(conversation_id, Utc::now())))
            })
            .clone()
    }

    /// Removes sessions whose last activity is older than the idle timeout.
    /// Sessions a dispatch is currently using are kept. Returns the number evicted.
    pub async fn evict_stale(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| {
            // A clone handed out by get_or_create may not have taken the lock yet;
            // removing it here would leave two session objects for one conversation.
            if Arc::strong_count(session) > 1 {
                return true;
            }
            match session.try_lock() {
                Ok(guard) => now - guard.last_activity() < self.idle_timeout,
                Err(_) => true,
            }
        });
        before - sessions.len()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// True if a session exists for `conversation_id`.
    pub async fn contains(&self, conversation_id: i64) -> bool {
        self.sessions.read().await.contains_key(&conversation_id)
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_IDLE_TIMEOUT_HOURS))
    }
}
