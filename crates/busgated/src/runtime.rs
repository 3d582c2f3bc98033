//! Assembly of the running gateway: pool, dispatcher and line transport.

use std::net::SocketAddr;
use std::sync::Arc;

use busgate_config::Config;
use thiserror::Error;
use tracing::info;

use crate::dispatch::{DispatchConfig, DispatchError, Dispatcher};
use crate::health::HealthReporter;
use crate::methods::{MethodResolver, ModuleSource};
use crate::pool::{PoolConfig, PoolError, WorkerPool};
use crate::transport::{
    ConnectionSink, LineConnectionHandler, ListenerError, ListenerHandle, SocketListener,
};

const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Errors raised while starting or stopping the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The worker pool failed to start.
    #[error("failed to start worker pool: {source}")]
    Pool {
        /// Underlying pool error.
        #[from]
        source: PoolError,
    },
    /// The dispatcher failed to start or reset its workers.
    #[error("dispatcher failed: {source}")]
    Dispatch {
        /// Underlying dispatcher error.
        #[from]
        source: DispatchError,
    },
    /// The listener failed to bind, start or stop.
    #[error("socket listener failed: {source}")]
    Listener {
        /// Underlying listener error.
        #[from]
        source: ListenerError,
    },
}

/// A running gateway.
pub struct Gateway {
    dispatcher: Arc<Dispatcher<ConnectionSink>>,
    listener: ListenerHandle,
    local_addr: Option<SocketAddr>,
    reporter: Arc<dyn HealthReporter>,
}

impl Gateway {
    /// Binds the configured endpoint, then starts the worker pool over
    /// `source`, the dispatcher and the accept loop.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] for the first component that fails; the
    /// components already started are stopped again.
    pub fn start(
        config: &Config,
        source: impl ModuleSource + 'static,
        reporter: Arc<dyn HealthReporter>,
    ) -> Result<Self, GatewayError> {
        let listener = SocketListener::bind(config.listen_socket())?;
        let local_addr = listener.local_addr();

        let resolver = Arc::new(MethodResolver::new(source, config.reload_interval()));
        let pool_config = PoolConfig::from_config(config);
        let pool = Arc::new(WorkerPool::start(pool_config, resolver)?);
        let sink = Arc::new(ConnectionSink);
        let dispatcher = match Dispatcher::start(
            DispatchConfig::from_config(config),
            Arc::clone(&pool),
            Arc::clone(&sink),
        ) {
            Ok(dispatcher) => Arc::new(dispatcher),
            Err(error) => {
                pool.stop();
                return Err(error.into());
            }
        };

        let handler = Arc::new(LineConnectionHandler::new(Arc::clone(&dispatcher), sink));
        let listener = match listener.start(handler) {
            Ok(handle) => handle,
            Err(error) => {
                dispatcher.stop();
                return Err(error.into());
            }
        };

        reporter.gateway_ready(config.listen_socket(), pool_config.concurrency.get());
        Ok(Self {
            dispatcher,
            listener,
            local_addr,
            reporter,
        })
    }

    /// Bound TCP address, when listening on TCP.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The dispatcher fed by the listener.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher<ConnectionSink>> {
        &self.dispatcher
    }

    /// Replaces every worker while the listener keeps accepting requests.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Dispatch`] when the new workers cannot be started;
    /// queued requests are then answered with pool-stopped errors until the
    /// gateway is stopped.
    pub fn reset_workers(&self) -> Result<(), GatewayError> {
        info!(target: RUNTIME_TARGET, "resetting workers");
        self.dispatcher.reset_workers()?;
        self.reporter.workers_reset();
        Ok(())
    }

    /// Stops accepting clients, drains queued requests through the pool and
    /// waits for every worker to finish.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Listener`] when the accept thread panicked. The
    /// dispatcher is stopped regardless.
    pub fn stop(self) -> Result<(), GatewayError> {
        info!(target: RUNTIME_TARGET, "stopping gateway");
        self.listener.shutdown();
        let joined = self.listener.join();
        self.dispatcher.stop();
        self.reporter.gateway_stopped();
        joined.map_err(GatewayError::from)
    }
}
