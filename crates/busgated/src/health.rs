//! Structured health reporting for daemon lifecycle events.

use std::sync::Arc;

use busgate_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked once the worker pool, dispatcher and listener are running.
    fn gateway_ready(&self, endpoint: &SocketEndpoint, concurrency: usize);

    /// Invoked after every worker has been replaced.
    fn workers_reset(&self);

    /// Invoked after the gateway has drained and stopped.
    fn gateway_stopped(&self);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter + ?Sized,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn gateway_ready(&self, endpoint: &SocketEndpoint, concurrency: usize) {
        (**self).gateway_ready(endpoint, concurrency);
    }

    fn workers_reset(&self) {
        (**self).workers_reset();
    }

    fn gateway_stopped(&self) {
        (**self).gateway_stopped();
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting daemon bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            socket = %config.listen_socket(),
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            queue_capacity = ?config.queue_capacity(),
            reload = ?config.reload_interval(),
            "daemon bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "daemon bootstrap failed"
        );
    }

    fn gateway_ready(&self, endpoint: &SocketEndpoint, concurrency: usize) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "gateway_ready",
            endpoint = %endpoint,
            concurrency,
            "gateway accepting requests"
        );
    }

    fn workers_reset(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "workers_reset",
            "gateway workers replaced"
        );
    }

    fn gateway_stopped(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "gateway_stopped",
            "gateway stopped"
        );
    }
}
