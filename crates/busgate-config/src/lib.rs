//! Shared configuration for the busgate daemon.
//!
//! [`Config`] is loaded through `ortho_config`, which layers built-in
//! defaults, an optional TOML file (`--config-path` or
//! `BUSGATE_CONFIG_PATH`), `BUSGATE_*` environment variables and command-line
//! flags, in increasing order of precedence. The resolved value is an
//! immutable snapshot: the daemon hands clones of it to every component at
//! startup and never mutates it afterwards.

mod defaults;
mod executor;
mod logging;
mod selection;
mod socket;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_FLOW_ACK_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_RELOAD_INTERVAL_SECS, DEFAULT_TCP_PORT, default_log_filter, default_log_format,
    default_socket_endpoint,
};
pub use executor::{ReloadInterval, host_concurrency};
pub use logging::{LogFormat, LogFormatParseError};
pub use selection::{TargetSelection, TargetSelectionParseError};
pub use socket::{SocketEndpoint, SocketParseError, SocketPreparationError};

/// Resolved daemon configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "BUSGATE")]
pub struct Config {
    /// Endpoint the line transport listens on.
    #[ortho_config(default = defaults::default_socket_endpoint())]
    pub listen_socket: SocketEndpoint,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
    /// Number of worker threads. Defaults to the host core count.
    pub worker_concurrency: Option<usize>,
    /// Tasks a worker completes before it is retired and replaced.
    pub max_tasks_per_worker: Option<usize>,
    /// Intake queue bound; zero means unbounded.
    #[ortho_config(default = defaults::DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,
    /// Seconds between handler module reloads. Negative disables reloading,
    /// zero reloads on every call.
    #[ortho_config(default = defaults::DEFAULT_RELOAD_INTERVAL_SECS)]
    pub method_reload_interval: f64,
    /// Seconds a flow invocation waits for its acknowledgment.
    #[ortho_config(default = defaults::DEFAULT_FLOW_ACK_TIMEOUT_SECS)]
    pub flow_ack_timeout: f64,
    /// How under-specified flow targets are completed.
    #[ortho_config(default = TargetSelection::default())]
    pub flow_target_selection: TargetSelection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_socket: defaults::default_socket_endpoint(),
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            worker_concurrency: None,
            max_tasks_per_worker: None,
            queue_capacity: defaults::DEFAULT_QUEUE_CAPACITY,
            method_reload_interval: defaults::DEFAULT_RELOAD_INTERVAL_SECS,
            flow_ack_timeout: defaults::DEFAULT_FLOW_ACK_TIMEOUT_SECS,
            flow_target_selection: TargetSelection::default(),
        }
    }
}

impl Config {
    /// Endpoint the line transport binds.
    #[must_use]
    pub fn listen_socket(&self) -> &SocketEndpoint {
        &self.listen_socket
    }

    /// Filter expression handed to the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Selected log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Worker count, falling back to the host core count. Zero is treated as
    /// unset.
    #[must_use]
    pub fn worker_concurrency(&self) -> usize {
        self.worker_concurrency
            .filter(|count| *count > 0)
            .unwrap_or_else(host_concurrency)
    }

    /// Task quota per worker, if any. Zero is treated as unlimited.
    #[must_use]
    pub fn max_tasks_per_worker(&self) -> Option<usize> {
        self.max_tasks_per_worker.filter(|quota| *quota > 0)
    }

    /// Intake queue bound, `None` when unbounded.
    #[must_use]
    pub fn queue_capacity(&self) -> Option<usize> {
        (self.queue_capacity > 0).then_some(self.queue_capacity)
    }

    /// Handler module reload policy.
    #[must_use]
    pub fn reload_interval(&self) -> ReloadInterval {
        ReloadInterval::from_secs(self.method_reload_interval)
    }

    /// Wait budget for flow acknowledgments. Non-finite or negative values
    /// fall back to the default.
    #[must_use]
    pub fn flow_ack_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.flow_ack_timeout)
            .unwrap_or(Duration::from_secs_f64(DEFAULT_FLOW_ACK_TIMEOUT_SECS))
    }

    /// Target selection policy for flow invocations.
    #[must_use]
    pub fn flow_target_selection(&self) -> TargetSelection {
        self.flow_target_selection
    }
}
