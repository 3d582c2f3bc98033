//! Supervises daemon launch sequencing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bootstrap::{ConfigLoader, SystemConfigLoader, bootstrap_with};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::methods::{ModuleSource, builtin_source};

use super::PROCESS_TARGET;
use super::errors::LaunchError;
use super::shutdown::{ControlAction, ShutdownSignal, SystemShutdownSignal};

/// Runs the daemon with the production collaborators and the built-in
/// handler modules until a termination signal arrives. `SIGHUP` resets the
/// workers without interrupting service.
///
/// # Errors
///
/// See [`run_daemon_with`].
pub fn run_daemon() -> Result<(), LaunchError> {
    run_daemon_with(
        &SystemConfigLoader,
        Arc::new(StructuredHealthReporter::new()),
        builtin_source(),
        &SystemShutdownSignal::default(),
    )
}

/// Runs the daemon with injected collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when bootstrap or gateway start fails, when a
/// worker reset fails or when the shutdown signal cannot be awaited. In the
/// last two cases the gateway is still stopped before returning.
pub fn run_daemon_with(
    loader: &dyn ConfigLoader,
    reporter: Arc<dyn HealthReporter>,
    source: impl ModuleSource + 'static,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    info!(target: PROCESS_TARGET, "starting daemon runtime");
    let daemon = bootstrap_with(loader, reporter)?;
    let gateway = daemon.start_gateway(source)?;

    let served = loop {
        match shutdown.wait() {
            Ok(ControlAction::Shutdown) => break Ok(()),
            Ok(ControlAction::ResetWorkers) => {
                if let Err(error) = gateway.reset_workers() {
                    warn!(target: PROCESS_TARGET, error = %error, "worker reset failed, stopping");
                    break Err(LaunchError::from(error));
                }
            }
            Err(error) => {
                warn!(target: PROCESS_TARGET, error = %error, "shutdown wait failed, stopping");
                break Err(LaunchError::from(error));
            }
        }
    };
    gateway.stop()?;
    served?;
    info!(target: PROCESS_TARGET, "shutdown sequence completed");
    Ok(())
}
