//! Small data structures shared across the crate.

pub mod circular;
pub mod either;

pub use circular::CircularBuffer;
pub use either::Either;

use std::sync::{Mutex, MutexGuard};

/// Locks a mutex, recovering from poisoning. Graph state stays consistent
/// because every mutation completes or never started; a panicking user
/// closure must not wedge the whole graph.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
  mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
