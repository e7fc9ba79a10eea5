//! Lifecycle states. Transitions: Stopped → Starting → Running → Draining → Stopped.
//! Startup failure goes Starting → Stopped directly.

/// Observable runtime state, published through a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Not connected; terminal until the next start.
    Stopped,
    /// Connecting the transport (bounded retries).
    Starting,
    /// Receive loop live, dispatching messages.
    Running,
    /// No longer accepting messages; waiting for in-flight dispatches.
    Draining,
}
