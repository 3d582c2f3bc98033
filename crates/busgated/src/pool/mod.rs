//! Fixed-size pool of OS worker threads with optional task quotas.
//!
//! Jobs are handed to workers over a channel holding one job per worker, so
//! submitters block while the pool is saturated. Each job resolves its
//! method through the [`MethodResolver`], runs the handler and delivers the
//! outcome to its [`Completion`] on the worker thread. A worker that reaches
//! `max_tasks_per_worker` spawns its own replacement and exits, so the pool
//! keeps its size while worker-local state is periodically discarded. If the
//! replacement cannot be spawned the worker keeps serving.
//! [`WorkerPool::restart`] swaps the whole generation at once.

mod errors;

use std::any::Any;
use std::io;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use busgate_config::Config;
use busgate_jsonrpc::{NativeValue, Params};
use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, error, info, warn};

pub use self::errors::{PoolError, Rejected};
use crate::methods::{HandlerError, MethodResolver};
use crate::sync::lock;

pub(crate) const POOL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pool");

/// Sizing of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of concurrently running workers.
    pub concurrency: NonZeroUsize,
    /// Tasks after which a worker is replaced, `None` for never.
    pub max_tasks_per_worker: Option<NonZeroUsize>,
}

impl PoolConfig {
    /// Pool sizing taken from the daemon configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: NonZeroUsize::new(config.worker_concurrency())
                .unwrap_or(NonZeroUsize::MIN),
            max_tasks_per_worker: config.max_tasks_per_worker().and_then(NonZeroUsize::new),
        }
    }
}

/// A method call to run on the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// Dotted method path.
    pub method: String,
    /// Call arguments.
    pub params: Params,
}

/// Receives the outcome of one job.
///
/// Exactly one of the two methods is called, exactly once, on a worker
/// thread. Both consume the completion.
pub trait Completion: Send + 'static {
    /// The handler returned a value.
    fn on_success(self: Box<Self>, value: NativeValue);
    /// Resolution or the handler failed.
    fn on_failure(self: Box<Self>, error: HandlerError);
}

struct Job {
    invocation: Invocation,
    completion: Box<dyn Completion>,
}

struct Shared {
    resolver: Arc<MethodResolver>,
    receiver: Receiver<Job>,
    quota: Option<NonZeroUsize>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    generations: Arc<AtomicUsize>,
    replace: SpawnWorker,
}

/// Starts one worker on a generation of the pool.
type SpawnWorker = fn(&Arc<Shared>) -> io::Result<()>;

/// Everything needed to bring up a fresh generation of workers.
struct Blueprint {
    config: PoolConfig,
    resolver: Arc<MethodResolver>,
    generations: Arc<AtomicUsize>,
    replace: SpawnWorker,
}

impl Blueprint {
    fn launch(&self) -> Result<(Sender<Job>, Arc<Shared>), PoolError> {
        let (sender, receiver) = crossbeam_channel::bounded(self.config.concurrency.get());
        let shared = Arc::new(Shared {
            resolver: Arc::clone(&self.resolver),
            receiver,
            quota: self.config.max_tasks_per_worker,
            workers: Mutex::new(Vec::new()),
            generations: Arc::clone(&self.generations),
            replace: self.replace,
        });
        for _ in 0..self.config.concurrency.get() {
            if let Err(source) = spawn_worker(&shared) {
                drop(sender);
                join_workers(&shared);
                return Err(PoolError::Spawn { source });
            }
        }
        Ok((sender, shared))
    }
}

/// Pool of worker threads executing method invocations.
pub struct WorkerPool {
    blueprint: Blueprint,
    sender: Mutex<Option<Sender<Job>>>,
    shared: Mutex<Arc<Shared>>,
}

impl WorkerPool {
    /// Spawns `config.concurrency` workers.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a worker thread cannot be created; any
    /// workers already spawned are stopped first.
    pub fn start(config: PoolConfig, resolver: Arc<MethodResolver>) -> Result<Self, PoolError> {
        Self::start_with(config, resolver, spawn_worker)
    }

    fn start_with(
        config: PoolConfig,
        resolver: Arc<MethodResolver>,
        replace: SpawnWorker,
    ) -> Result<Self, PoolError> {
        let blueprint = Blueprint {
            config,
            resolver,
            generations: Arc::new(AtomicUsize::new(0)),
            replace,
        };
        let (sender, shared) = blueprint.launch()?;
        info!(
            target: POOL_TARGET,
            concurrency = config.concurrency.get(),
            max_tasks_per_worker = ?config.max_tasks_per_worker.map(NonZeroUsize::get),
            "worker pool started"
        );
        Ok(Self {
            blueprint,
            sender: Mutex::new(Some(sender)),
            shared: Mutex::new(shared),
        })
    }

    /// Queues `invocation`; its outcome is delivered to `completion` on a
    /// worker thread.
    ///
    /// The hand-off holds one job per worker. Once it is full the call
    /// blocks until a worker frees up, which stalls the caller and lets the
    /// intake queue in front of the pool fill.
    ///
    /// # Errors
    ///
    /// Returns the completion inside [`Rejected`] after [`WorkerPool::stop`]
    /// so the caller can still report the failure.
    pub fn submit(
        &self,
        invocation: Invocation,
        completion: Box<dyn Completion>,
    ) -> Result<(), Rejected> {
        let job = Job {
            invocation,
            completion,
        };
        let sender = lock(&self.sender).clone();
        let Some(sender) = sender else {
            return Err(Rejected::stopped(job.completion));
        };
        sender
            .send(job)
            .map_err(|returned| Rejected::stopped(returned.into_inner().completion))
    }

    /// Replaces every worker with a fresh generation.
    ///
    /// Jobs already handed to the old workers finish on them. Cached handler
    /// modules are dropped so the new workers load them again. Submitters
    /// wait until the new generation is up.
    ///
    /// # Errors
    ///
    /// [`PoolError::Stopped`] when the pool was already stopped and
    /// [`PoolError::Spawn`] when the new generation cannot be started, which
    /// leaves the pool stopped.
    pub fn restart(&self) -> Result<(), PoolError> {
        let mut sender = lock(&self.sender);
        if sender.take().is_none() {
            return Err(PoolError::Stopped);
        }
        let previous = Arc::clone(&*lock(&self.shared));
        join_workers(&previous);
        self.blueprint.resolver.invalidate();

        let (fresh, shared) = self.blueprint.launch()?;
        *lock(&self.shared) = shared;
        *sender = Some(fresh);
        info!(
            target: POOL_TARGET,
            generations = self.generations_started(),
            "worker pool restarted"
        );
        Ok(())
    }

    /// Stops accepting jobs, lets workers drain everything already queued and
    /// joins them, replacements included. Safe to call repeatedly and from
    /// any thread, including a worker.
    pub fn stop(&self) {
        let sender = lock(&self.sender).take();
        let was_running = sender.is_some();
        drop(sender);

        let shared = Arc::clone(&*lock(&self.shared));
        join_workers(&shared);
        if was_running {
            info!(
                target: POOL_TARGET,
                generations = self.generations_started(),
                "worker pool stopped"
            );
        }
    }

    /// Number of worker threads spawned so far, replacements included.
    #[must_use]
    pub fn generations_started(&self) -> usize {
        self.blueprint.generations.load(Ordering::SeqCst)
    }

    /// Configured number of concurrent workers.
    #[must_use]
    pub const fn concurrency(&self) -> NonZeroUsize {
        self.blueprint.config.concurrency
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_worker(shared: &Arc<Shared>) -> io::Result<()> {
    let generation = shared.generations.fetch_add(1, Ordering::SeqCst);
    let worker = Arc::clone(shared);
    let handle = thread::Builder::new()
        .name(format!("busgate-worker-{generation}"))
        .spawn(move || run_worker(&worker, generation))?;
    lock(&shared.workers).push(handle);
    Ok(())
}

/// Joins every worker of one generation, skipping the calling thread.
fn join_workers(shared: &Shared) {
    let current = thread::current().id();
    loop {
        let next = lock(&shared.workers).pop();
        let Some(handle) = next else {
            break;
        };
        if handle.thread().id() == current {
            continue;
        }
        if handle.join().is_err() {
            warn!(target: POOL_TARGET, "worker thread panicked");
        }
    }
}

fn run_worker(shared: &Arc<Shared>, generation: usize) {
    debug!(target: POOL_TARGET, generation, "worker started");
    let mut completed = 0_usize;
    while let Ok(job) = shared.receiver.recv() {
        execute(&shared.resolver, job);
        completed += 1;
        if shared.quota.is_some_and(|quota| completed >= quota.get()) {
            match (shared.replace)(shared) {
                Ok(()) => {
                    debug!(target: POOL_TARGET, generation, completed, "worker retired");
                    return;
                }
                Err(error) => {
                    error!(
                        target: POOL_TARGET,
                        generation,
                        error = %error,
                        "failed to spawn replacement worker, keeping this one"
                    );
                    completed = 0;
                }
            }
        }
    }
    debug!(target: POOL_TARGET, generation, "worker exiting");
}

fn execute(resolver: &MethodResolver, job: Job) {
    let Job {
        invocation,
        completion,
    } = job;
    let method = invocation.method.clone();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_handler(resolver, invocation)))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload.as_ref());
            warn!(target: POOL_TARGET, method = %method, message = %message, "handler panicked");
            Err(HandlerError::failure("panic", message))
        });
    let delivered = panic::catch_unwind(AssertUnwindSafe(move || match outcome {
        Ok(value) => completion.on_success(value),
        Err(error) => completion.on_failure(error),
    }));
    if let Err(payload) = delivered {
        error!(
            target: POOL_TARGET,
            method = %method,
            message = %panic_message(payload.as_ref()),
            "completion callback panicked"
        );
    }
}

fn run_handler(
    resolver: &MethodResolver,
    invocation: Invocation,
) -> Result<NativeValue, HandlerError> {
    let handler = resolver.resolve(&invocation.method)?;
    handler.call(invocation.params)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
