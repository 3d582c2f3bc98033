//! Pending invocations awaiting a late acknowledgment or their deadline.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep, sleep_until};
use tracing::debug;

use super::FLOW_TARGET;
use super::errors::RegistryError;
use crate::sync::lock;

/// Composite identifier binding an issued flow to its acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Wraps an already-composed key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for CorrelationKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// How a pending invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// The acknowledgment event arrived.
    Event(T),
    /// The deadline passed first.
    TimedOut,
    /// The entry was removed without an outcome.
    Cancelled,
}

struct Entry<T> {
    deadline: Instant,
    sender: oneshot::Sender<Resolution<T>>,
}

/// Table of invocations waiting for an acknowledgment.
///
/// Every resolution path pops the entry under the table lock, so for any
/// key exactly one of [`resolve`](Self::resolve),
/// [`timeout`](Self::timeout) and
/// [`cancel_on_disconnect`](Self::cancel_on_disconnect) wins. The others
/// return `false` and do nothing.
pub struct CorrelationRegistry<T> {
    entries: Arc<Mutex<HashMap<CorrelationKey, Entry<T>>>>,
}

impl<T> Clone for CorrelationRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CorrelationRegistry<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CorrelationRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

impl<T> CorrelationRegistry<T> {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers `key` and returns the future that completes once the key
    /// is resolved, times out after `timeout`, or is cancelled.
    ///
    /// The deadline is fixed here, but the timer behind it is only armed
    /// when the future is first polled, so `begin` works outside a runtime.
    /// A future first polled after its deadline times out at once; one that
    /// is never polled keeps its entry until it is dropped or resolved.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateKey`] when `key` is already pending.
    pub fn begin(
        &self,
        key: CorrelationKey,
        timeout: Duration,
    ) -> Result<PendingFlow<T>, RegistryError> {
        let deadline = Instant::now() + timeout;
        let (sender, receiver) = oneshot::channel();
        {
            let mut entries = lock(&self.entries);
            if entries.contains_key(&key) {
                return Err(RegistryError::DuplicateKey { key });
            }
            entries.insert(key.clone(), Entry { deadline, sender });
        }
        debug!(target: FLOW_TARGET, key = %key, ?timeout, "invocation pending");
        Ok(PendingFlow {
            registry: self.clone(),
            key,
            deadline,
            timer: None,
            receiver,
            finished: false,
        })
    }

    /// Completes `key` with `outcome`. Returns `false` if the key was no
    /// longer pending.
    pub fn resolve(&self, key: &CorrelationKey, outcome: T) -> bool {
        self.finish(key, "resolve", Some(Resolution::Event(outcome)))
    }

    /// Completes `key` as timed out. Returns `false` if the key was no
    /// longer pending.
    pub fn timeout(&self, key: &CorrelationKey) -> bool {
        self.finish(key, "timeout", Some(Resolution::TimedOut))
    }

    /// Discards `key` after its waiter went away. Returns `false` if the key
    /// was no longer pending.
    pub fn cancel_on_disconnect(&self, key: &CorrelationKey) -> bool {
        self.finish(key, "cancel", None)
    }

    /// Whether `key` is waiting.
    #[must_use]
    pub fn is_pending(&self, key: &CorrelationKey) -> bool {
        lock(&self.entries).contains_key(key)
    }

    /// Deadline of a waiting key.
    #[must_use]
    pub fn deadline(&self, key: &CorrelationKey) -> Option<Instant> {
        lock(&self.entries).get(key).map(|entry| entry.deadline)
    }

    /// Number of waiting keys.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn finish(
        &self,
        key: &CorrelationKey,
        action: &'static str,
        resolution: Option<Resolution<T>>,
    ) -> bool {
        let Some(entry) = lock(&self.entries).remove(key) else {
            debug!(target: FLOW_TARGET, key = %key, action, "key no longer pending");
            return false;
        };
        debug!(target: FLOW_TARGET, key = %key, action, "invocation finished");
        if let Some(resolution) = resolution {
            // The waiter may have just been dropped; its cancel lost the race.
            let _ = entry.sender.send(resolution);
        }
        true
    }
}

/// Future side of a pending invocation.
///
/// The deadline set by [`CorrelationRegistry::begin`] is enforced from the
/// first poll onwards. Dropping the future before it completes cancels the
/// invocation.
#[must_use = "dropping a PendingFlow cancels the invocation"]
pub struct PendingFlow<T> {
    registry: CorrelationRegistry<T>,
    key: CorrelationKey,
    deadline: Instant,
    timer: Option<Pin<Box<Sleep>>>,
    receiver: oneshot::Receiver<Resolution<T>>,
    finished: bool,
}

impl<T> PendingFlow<T> {
    /// Key this future waits on.
    #[must_use]
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }

    fn poll_receiver(&mut self, cx: &mut Context<'_>) -> Poll<Resolution<T>> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(outcome) => {
                self.finished = true;
                Poll::Ready(outcome.unwrap_or(Resolution::Cancelled))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Future for PendingFlow<T> {
    type Output = Resolution<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if let Poll::Ready(resolution) = this.poll_receiver(cx) {
            return Poll::Ready(resolution);
        }
        let deadline = this.deadline;
        let timer = this.timer.get_or_insert_with(|| Box::pin(sleep_until(deadline)));
        if timer.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }
        // Whichever side won, the outcome is now in (or on its way to) the
        // receiver.
        this.registry.timeout(&this.key);
        this.poll_receiver(cx)
    }
}

impl<T> Drop for PendingFlow<T> {
    fn drop(&mut self) {
        if !self.finished {
            self.registry.cancel_on_disconnect(&self.key);
        }
    }
}

impl<T> fmt::Debug for PendingFlow<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingFlow")
            .field("key", &self.key)
            .field("deadline", &self.deadline)
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
