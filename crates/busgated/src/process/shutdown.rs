use std::io;
use std::sync::Mutex;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use thiserror::Error;
use tracing::info;

use super::PROCESS_TARGET;
use crate::sync::lock;

/// What a control signal asks the daemon to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Drain and exit.
    Shutdown,
    /// Replace every worker and keep serving.
    ResetWorkers,
}

/// Abstraction over shutdown notification mechanisms.
pub trait ShutdownSignal: Send + Sync {
    /// Blocks until the next control signal and reports what it asks for.
    fn wait(&self) -> Result<ControlAction, ShutdownError>;
}

/// Errors reported by shutdown signal listeners.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Installing signal handlers failed.
    #[error("failed to install signal handlers: {source}")]
    Install {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Listener for process signals.
///
/// `SIGHUP` resets the workers; `SIGTERM`, `SIGINT` and `SIGQUIT` shut the
/// daemon down. Handlers are installed on the first wait and stay installed
/// between waits so no signal is lost.
#[derive(Default)]
pub struct SystemShutdownSignal {
    signals: Mutex<Option<Signals>>,
}

impl ShutdownSignal for SystemShutdownSignal {
    fn wait(&self) -> Result<ControlAction, ShutdownError> {
        let mut guard = lock(&self.signals);
        let signals = match guard.take() {
            Some(signals) => signals,
            None => Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
                .map_err(|source| ShutdownError::Install { source })?,
        };
        let signal = guard.insert(signals).forever().next();
        let action = match signal {
            Some(SIGHUP) => ControlAction::ResetWorkers,
            _ => ControlAction::Shutdown,
        };
        info!(
            target: PROCESS_TARGET,
            signal = ?signal,
            action = ?action,
            "control signal received"
        );
        Ok(action)
    }
}
