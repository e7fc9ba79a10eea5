//! Runtime: the receive loop and its start/stop choreography.

use std::sync::Arc;

use bot_core::{BotError, Result, Transport};
use chrono::Utc;
use command_router::CommandRouter;
use session_store::SessionStore;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, sleep_until, Duration, Instant};
use tracing::{error, info, instrument, warn};

use crate::lifecycle::LifecycleState;

/// Tunables for startup, shutdown, and maintenance.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Connect attempts before startup fails.
    pub connect_attempts: u32,
    /// Base backoff between attempts; attempt n waits n times this.
    pub connect_backoff: Duration,
    /// How long draining waits for in-flight dispatches.
    pub drain_grace: Duration,
    /// Period of the stale-session eviction tick.
    pub evict_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 3,
            connect_backoff: Duration::from_secs(2),
            drain_grace: Duration::from_secs(5),
            evict_interval: Duration::from_secs(600),
        }
    }
}

/// Clonable trigger for the "shutdown requested" event. The first request starts a
/// graceful drain; a second request while draining aborts in-flight work immediately.
/// Requests after the runtime has stopped are no-ops.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl ShutdownHandle {
    pub fn request_stop(&self) {
        // Send failure just means the runtime is already gone.
        let _ = self.tx.send(());
    }
}

/// Lifecycle controller. Owns the transport reference, the router, and the session
/// store; supervises the whole receive/dispatch loop.
pub struct Runtime {
    transport: Arc<dyn Transport>,
    router: Arc<CommandRouter>,
    sessions: Arc<SessionStore>,
    config: RuntimeConfig,
    state_tx: watch::Sender<LifecycleState>,
    stop_tx: mpsc::UnboundedSender<()>,
    stop_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl Runtime {
    pub fn new(
        transport: Arc<dyn Transport>,
        router: CommandRouter,
        sessions: Arc<SessionStore>,
        config: RuntimeConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Stopped);
        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            router: Arc::new(router),
            sessions,
            config,
            state_tx,
            stop_tx,
            stop_rx: Mutex::new(Some(stop_rx)),
        }
    }

    /// Handle for requesting shutdown from signal listeners or other tasks.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.stop_tx.clone(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    /// Subscribes to lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: LifecycleState) {
        info!(state = ?state, "step: lifecycle transition");
        // send_replace never fails; we hold both ends via subscribe().
        self.state_tx.send_replace(state);
    }

    /// Runs the bot until shutdown is requested or the transport closes the inbound
    /// channel. Returns `BotError::Startup` when the transport cannot be reached
    /// within the bounded retries.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        let mut stop_rx = self
            .stop_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| BotError::Startup("runtime already started".to_string()))?;

        self.set_state(LifecycleState::Starting);
        let mut inbound = match self.connect_with_retry().await {
            Ok(rx) => rx,
            Err(e) => {
                self.set_state(LifecycleState::Stopped);
                return Err(e);
            }
        };

        let evictor = self.spawn_evictor();
        let mut in_flight: JoinSet<()> = JoinSet::new();
        self.set_state(LifecycleState::Running);

        loop {
            tokio::select! {
                maybe = inbound.recv() => match maybe {
                    Some(message) => {
                        let router = self.router.clone();
                        in_flight.spawn(async move {
                            router.dispatch(&message).await;
                        });
                    }
                    None => {
                        warn!("transport closed the inbound channel");
                        break;
                    }
                },
                _ = stop_rx.recv() => {
                    info!("shutdown requested");
                    break;
                }
                Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = result {
                        error!(error = %e, "dispatch task panicked");
                    }
                }
            }
        }

        // Stop accepting new messages before draining.
        drop(inbound);
        evictor.abort();

        self.set_state(LifecycleState::Draining);
        self.drain(in_flight, &mut stop_rx).await;

        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "transport disconnect failed");
        }
        self.set_state(LifecycleState::Stopped);
        info!("step: runtime stopped");
        Ok(())
    }

    async fn connect_with_retry(&self) -> Result<mpsc::Receiver<bot_core::Message>> {
        let mut last_err = None;
        for attempt in 1..=self.config.connect_attempts {
            match self.transport.connect().await {
                Ok(rx) => {
                    info!(attempt, "transport connected");
                    return Ok(rx);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "transport connect failed");
                    last_err = Some(e);
                    if attempt < self.config.connect_attempts {
                        sleep(self.config.connect_backoff * attempt).await;
                    }
                }
            }
        }
        Err(BotError::Startup(format!(
            "transport unreachable after {} attempts: {}",
            self.config.connect_attempts,
            last_err.map(|e| e.to_string()).unwrap_or_default(),
        )))
    }

    /// Waits for in-flight dispatches, bounded by the grace timeout. A further stop
    /// request or an expired grace period aborts what remains.
    async fn drain(&self, mut in_flight: JoinSet<()>, stop_rx: &mut mpsc::UnboundedReceiver<()>) {
        let deadline = Instant::now() + self.config.drain_grace;
        info!(in_flight = in_flight.len(), "step: draining");

        while !in_flight.is_empty() {
            tokio::select! {
                _ = stop_rx.recv() => {
                    warn!(
                        remaining = in_flight.len(),
                        "second shutdown request, aborting in-flight dispatches"
                    );
                    in_flight.shutdown().await;
                    return;
                }
                result = in_flight.join_next() => match result {
                    Some(Err(e)) => error!(error = %e, "dispatch task panicked"),
                    Some(Ok(())) => {}
                    None => return,
                },
                _ = sleep_until(deadline) => {
                    warn!(
                        remaining = in_flight.len(),
                        error = %BotError::ShutdownTimeout,
                        "aborting in-flight dispatches"
                    );
                    in_flight.shutdown().await;
                    return;
                }
            }
        }
        info!("step: drain complete");
    }

    fn spawn_evictor(&self) -> JoinHandle<()> {
        let sessions = self.sessions.clone();
        let period = self.config.evict_interval;
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            // The first interval tick fires immediately; skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                let evicted = sessions.evict_stale(Utc::now()).await;
                if evicted > 0 {
                    info!(evicted, "evicted stale sessions");
                }
            }
        })
    }
}
