//! Error surface for launching and supervising the daemon.

use thiserror::Error;

use crate::bootstrap::BootstrapError;
use crate::runtime::GatewayError;

use super::shutdown::ShutdownError;

/// Errors surfaced while running the daemon process.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrapping the daemon failed.
    #[error("daemon bootstrap failed: {source}")]
    Bootstrap {
        /// Underlying bootstrap error.
        #[from]
        source: BootstrapError,
    },
    /// Starting or stopping the gateway failed.
    #[error("gateway failed: {source}")]
    Gateway {
        /// Underlying gateway error.
        #[from]
        source: GatewayError,
    },
    /// Waiting for shutdown failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[from]
        source: ShutdownError,
    },
}
