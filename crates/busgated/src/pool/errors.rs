use std::fmt;
use std::io;

use thiserror::Error;

use super::Completion;

/// Failures reported by the worker pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool no longer accepts jobs.
    #[error("worker pool is stopped")]
    Stopped,
    /// A worker thread could not be created.
    #[error("failed to spawn worker thread: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },
}

/// A job the pool refused, handed back with its completion.
#[derive(Error)]
#[error("job rejected: {reason}")]
pub struct Rejected {
    /// Why the job was refused.
    #[source]
    pub reason: PoolError,
    completion: Box<dyn Completion>,
}

impl Rejected {
    pub(super) fn stopped(completion: Box<dyn Completion>) -> Self {
        Self {
            reason: PoolError::Stopped,
            completion,
        }
    }

    /// The completion of the refused job, still owed an outcome.
    #[must_use]
    pub fn into_completion(self) -> Box<dyn Completion> {
        self.completion
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}
