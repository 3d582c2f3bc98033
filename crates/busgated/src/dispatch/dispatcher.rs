use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use busgate_config::Config;
use busgate_jsonrpc::{Envelope, RpcRequest, decode, encode_error};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use super::DISPATCH_TARGET;
use super::completion::ReplyCompletion;
use super::errors::{DispatchError, EnqueueError};
use super::sink::ReplySink;
use crate::methods::HandlerError;
use crate::pool::{Invocation, WorkerPool};
use crate::sync::lock;

/// Intake queue settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Maximum number of queued tasks, `None` for unbounded.
    pub queue_capacity: Option<NonZeroUsize>,
}

impl DispatchConfig {
    /// Intake settings taken from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_capacity: config.queue_capacity().and_then(NonZeroUsize::new),
        }
    }
}

/// A decoded request waiting for the consumer.
#[derive(Debug)]
pub struct QueuedTask<T> {
    /// When the message entered the intake.
    pub received_at: Instant,
    /// Where the reply goes.
    pub target: T,
    /// The request itself.
    pub request: RpcRequest,
}

/// Decodes inbound messages and feeds valid requests to the worker pool.
pub struct Dispatcher<S: ReplySink> {
    sink: Arc<S>,
    pool: Arc<WorkerPool>,
    intake: Mutex<Option<Sender<QueuedTask<S::Target>>>>,
    receiver: Receiver<QueuedTask<S::Target>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl<S: ReplySink> Dispatcher<S> {
    /// Creates the intake queue and starts its consumer thread.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Spawn`] when the consumer thread cannot be
    /// created.
    pub fn start(
        config: DispatchConfig,
        pool: Arc<WorkerPool>,
        sink: Arc<S>,
    ) -> Result<Self, DispatchError> {
        let dispatcher = Self::idle(config, pool, sink);
        dispatcher.spawn_consumer()?;
        info!(
            target: DISPATCH_TARGET,
            queue_capacity = ?config.queue_capacity.map(NonZeroUsize::get),
            "dispatcher started"
        );
        Ok(dispatcher)
    }

    pub(super) fn idle(config: DispatchConfig, pool: Arc<WorkerPool>, sink: Arc<S>) -> Self {
        let (sender, receiver) = match config.queue_capacity {
            Some(capacity) => crossbeam_channel::bounded(capacity.get()),
            None => crossbeam_channel::unbounded(),
        };
        Self {
            sink,
            pool,
            intake: Mutex::new(Some(sender)),
            receiver,
            consumer: Mutex::new(None),
        }
    }

    pub(super) fn spawn_consumer(&self) -> Result<(), DispatchError> {
        let receiver = self.receiver.clone();
        let pool = Arc::clone(&self.pool);
        let sink = Arc::clone(&self.sink);
        let handle = thread::Builder::new()
            .name("busgate-dispatch".to_owned())
            .spawn(move || run_consumer(&receiver, &pool, &sink))
            .map_err(|source| DispatchError::Spawn { source })?;
        *lock(&self.consumer) = Some(handle);
        Ok(())
    }

    /// Accepts one inbound text message from `target`.
    ///
    /// Malformed messages are handled here: an error reply is sent when the
    /// request id could be recovered, otherwise the message is logged and
    /// dropped. Responses and error responses are not requests and are
    /// dropped. Both cases return `Ok`.
    ///
    /// # Errors
    ///
    /// [`EnqueueError::QueueFull`] when the intake queue is at capacity and
    /// [`EnqueueError::Stopped`] after [`Dispatcher::stop`]. The caller
    /// decides how to signal the refusal.
    pub fn enqueue(&self, target: S::Target, text: &str) -> Result<(), EnqueueError> {
        let request = match decode(text) {
            Ok(Envelope::Request(request)) => request,
            Ok(envelope) => {
                debug!(
                    target: DISPATCH_TARGET,
                    id = ?envelope.id(),
                    "ignoring non-request message"
                );
                return Ok(());
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, error = %error, "malformed message");
                if let Some(id) = error.recovered_id() {
                    let reply = encode_error(Some(id), &error.to_rpc_error());
                    if let Err(send_error) = self.sink.send(&target, &reply) {
                        warn!(
                            target: DISPATCH_TARGET,
                            id = %id,
                            error = %send_error,
                            "failed to send decode error reply"
                        );
                    }
                }
                return Ok(());
            }
        };

        let guard = lock(&self.intake);
        let Some(intake) = guard.as_ref() else {
            return Err(EnqueueError::Stopped { id: request.id });
        };
        let task = QueuedTask {
            received_at: Instant::now(),
            target,
            request,
        };
        intake.try_send(task).map_err(|error| match error {
            TrySendError::Full(task) => {
                warn!(
                    target: DISPATCH_TARGET,
                    method = %task.request.method,
                    "intake queue full"
                );
                EnqueueError::QueueFull {
                    id: task.request.id,
                }
            }
            TrySendError::Disconnected(task) => EnqueueError::Stopped {
                id: task.request.id,
            },
        })
    }

    /// Number of tasks waiting for the consumer.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    /// Replaces every pool worker and drops cached handler modules.
    ///
    /// The intake stays open throughout: requests arriving meanwhile wait in
    /// the queue and are served by the new workers.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Reset`] when the pool is stopped or the new workers
    /// cannot be started.
    pub fn reset_workers(&self) -> Result<(), DispatchError> {
        self.pool
            .restart()
            .map_err(|source| DispatchError::Reset { source })?;
        info!(
            target: DISPATCH_TARGET,
            generations = self.pool.generations_started(),
            "workers reset"
        );
        Ok(())
    }

    /// Stops accepting messages, drains the queue into the pool, joins the
    /// consumer and finally stops the pool. Idempotent.
    pub fn stop(&self) {
        let intake = lock(&self.intake).take();
        let was_running = intake.is_some();
        drop(intake);

        let consumer = lock(&self.consumer).take();
        match consumer {
            Some(handle) => {
                if handle.join().is_err() {
                    warn!(target: DISPATCH_TARGET, "dispatch consumer panicked");
                }
            }
            None => {
                while let Ok(task) = self.receiver.try_recv() {
                    submit_task(&self.pool, &self.sink, task);
                }
            }
        }
        self.pool.stop();
        if was_running {
            info!(target: DISPATCH_TARGET, "dispatcher stopped");
        }
    }
}

impl<S: ReplySink> Drop for Dispatcher<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_consumer<S: ReplySink>(
    receiver: &Receiver<QueuedTask<S::Target>>,
    pool: &WorkerPool,
    sink: &Arc<S>,
) {
    debug!(target: DISPATCH_TARGET, "dispatch consumer running");
    for task in receiver {
        submit_task(pool, sink, task);
    }
    debug!(target: DISPATCH_TARGET, "dispatch consumer drained");
}

fn submit_task<S: ReplySink>(pool: &WorkerPool, sink: &Arc<S>, task: QueuedTask<S::Target>) {
    let QueuedTask {
        received_at,
        target,
        request,
    } = task;
    let RpcRequest { id, method, params } = request;
    debug!(
        target: DISPATCH_TARGET,
        method = %method,
        queued_ms = received_at.elapsed().as_millis(),
        "submitting request"
    );
    let completion = Box::new(ReplyCompletion::new(
        Arc::clone(sink),
        target,
        id,
        method.clone(),
        received_at,
    ));
    if let Err(rejected) = pool.submit(Invocation { method, params }, completion) {
        warn!(target: DISPATCH_TARGET, error = %rejected, "worker pool rejected request");
        rejected
            .into_completion()
            .on_failure(HandlerError::failure("PoolStopped", "worker pool is stopped"));
    }
}
