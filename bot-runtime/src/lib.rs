//! # bot-runtime
//!
//! Owns the bot's lifecycle: connects the transport with bounded retries, runs the
//! receive loop (one dispatch task per inbound message), and coordinates graceful
//! shutdown — stop accepting, drain in-flight dispatches up to a grace timeout, then
//! disconnect. Shutdown is requested through [`ShutdownHandle`], decoupled from any
//! particular OS signal mechanism.

mod lifecycle;
mod runtime;

pub use lifecycle::LifecycleState;
pub use runtime::{Runtime, RuntimeConfig, ShutdownHandle};
