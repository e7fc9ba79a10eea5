//! Bot binary: loads config from env, registers the built-in commands, and runs the
//! runtime until an interrupt or terminate signal. A second signal during shutdown
//! forces an immediate stop.

mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use bot_core::init_tracing;
use bot_runtime::{Runtime, RuntimeConfig, ShutdownHandle};
use bot_telegram::{TelegramConfig, TelegramTransport};
use clap::{Parser, Subcommand};
use command_router::CommandRouter;
use session_store::SessionStore;
use tracing::{error, info};

use handlers::{CountHandler, HelpHandler, StartHandler};

#[derive(Parser)]
#[command(name = "bot")]
#[command(about = "Telegram command bot: run the dispatch loop", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => run(token).await,
    }
}

async fn run(token: Option<String>) -> Result<()> {
    let config = TelegramConfig::load(token).context("Load config from env (BOT_TOKEN)")?;

    init_tracing(config.log_file.as_deref())?;

    let transport = Arc::new(TelegramTransport::from_config(&config)?);
    let sessions = Arc::new(SessionStore::default());

    let mut router = CommandRouter::new(transport.clone(), sessions.clone());
    router.register("start", Arc::new(StartHandler))?;
    router.register("help", Arc::new(HelpHandler))?;
    router.register("count", Arc::new(CountHandler))?;

    let runtime = Runtime::new(transport, router, sessions, RuntimeConfig::default());
    spawn_signal_listener(runtime.shutdown_handle());

    info!("bot starting");
    runtime.run().await?;
    info!("bot stopped");
    Ok(())
}

/// Forwards interrupt/terminate signals to the runtime as stop requests. The runtime
/// treats a repeated request as "stop now", so each signal is simply forwarded.
#[cfg(unix)]
fn spawn_signal_listener(handle: ShutdownHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    tokio::spawn(async move {
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupt signal received"),
                _ = terminate.recv() => info!("terminate signal received"),
            }
            handle.request_stop();
        }
    });
}

#[cfg(not(unix))]
fn spawn_signal_listener(handle: ShutdownHandle) {
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                error!("failed to listen for ctrl-c");
                return;
            }
            info!("interrupt signal received");
            handle.request_stop();
        }
    });
}
