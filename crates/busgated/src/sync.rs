//! Lock helpers shared by the engine components.

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Acquires `mutex`, recovering the guard if a previous holder panicked.
///
/// Every structure guarded this way is updated with single assignments or
/// map insert/remove calls, so a panic never leaves it half-modified.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
