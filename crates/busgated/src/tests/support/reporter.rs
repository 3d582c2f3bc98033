//! Test double for [`HealthReporter`] that records lifecycle events.

use std::sync::Mutex;

use busgate_config::{Config, SocketEndpoint};

use crate::bootstrap::BootstrapError;
use crate::health::HealthReporter;

/// Structured health events tracked during scenarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded,
    BootstrapFailed(String),
    GatewayReady { endpoint: String, concurrency: usize },
    WorkersReset,
    GatewayStopped,
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn gateway_ready(&self, endpoint: &SocketEndpoint, concurrency: usize) {
        self.record(HealthEvent::GatewayReady {
            endpoint: endpoint.to_string(),
            concurrency,
        });
    }

    fn workers_reset(&self) {
        self.record(HealthEvent::WorkersReset);
    }

    fn gateway_stopped(&self) {
        self.record(HealthEvent::GatewayStopped);
    }
}
