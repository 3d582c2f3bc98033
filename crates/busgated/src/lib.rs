//! RPC gateway daemon between a message bus and a pool of handlers.
//!
//! Inbound text messages are decoded by [`busgate_jsonrpc`], queued by the
//! [`dispatch::Dispatcher`] and executed on the [`pool::WorkerPool`], whose
//! workers resolve dotted method names through the hot-reloadable
//! [`methods::MethodResolver`]. Every request carrying an id receives
//! exactly one reply through the transport's [`dispatch::ReplySink`].
//!
//! Flows started on remote peers complete asynchronously. The
//! [`flow::FlowInvoker`] parks each caller in a
//! [`flow::CorrelationRegistry`] until the matching acknowledgment or the
//! acknowledgment deadline resolves it, exactly once.
//!
//! The binary wires these components to a JSONL socket listener
//! ([`transport`]) after the usual bootstrap: configuration loading,
//! structured telemetry, socket preparation and health reporting.

mod bootstrap;
pub mod dispatch;
pub mod flow;
mod health;
pub mod methods;
pub mod pool;
mod process;
mod runtime;
mod sync;
mod telemetry;
pub mod transport;

pub use bootstrap::{
    ArgsConfigLoader, BootstrapError, ConfigLoader, Daemon, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use process::{
    ControlAction, LaunchError, ShutdownError, ShutdownSignal, SystemShutdownSignal, run_daemon,
    run_daemon_with,
};
pub use runtime::{Gateway, GatewayError};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
