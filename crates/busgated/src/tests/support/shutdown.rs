use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::process::{ControlAction, ShutdownError, ShutdownSignal};

/// Shutdown signal that fires immediately.
pub struct ImmediateShutdown;

impl ShutdownSignal for ImmediateShutdown {
    fn wait(&self) -> Result<ControlAction, ShutdownError> {
        Ok(ControlAction::Shutdown)
    }
}

/// Asks for one worker reset, then for shutdown.
#[derive(Default)]
pub struct ResetThenShutdown {
    reset_sent: AtomicBool,
}

impl ShutdownSignal for ResetThenShutdown {
    fn wait(&self) -> Result<ControlAction, ShutdownError> {
        if self.reset_sent.swap(true, Ordering::SeqCst) {
            Ok(ControlAction::Shutdown)
        } else {
            Ok(ControlAction::ResetWorkers)
        }
    }
}

/// Shutdown signal whose handlers cannot be installed.
pub struct FailingShutdown;

impl ShutdownSignal for FailingShutdown {
    fn wait(&self) -> Result<ControlAction, ShutdownError> {
        Err(ShutdownError::Install {
            source: io::Error::other("signals unavailable"),
        })
    }
}
