//! Wall-clock seam for time-based operators.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Provider of "now" for trailing time windows and timestamp stamping.
/// Monotonic so window eviction never runs backwards.
pub trait Clock: Send + Sync {
  fn now(&self) -> Instant;
}

/// The process clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> Instant {
    Instant::now()
  }
}

/// A clock that only moves when told to. For tests.
#[derive(Clone)]
pub struct ManualClock {
  now: Arc<Mutex<Instant>>,
}

impl ManualClock {
  pub fn new() -> Self {
    Self {
      now: Arc::new(Mutex::new(Instant::now())),
    }
  }

  /// Moves the clock forward.
  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Default for ManualClock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock for ManualClock {
  fn now(&self) -> Instant {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn manual_clock_advances_only_on_request() {
    let clock = ManualClock::new();
    let start = clock.now();
    assert_eq!(clock.now(), start);
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), start + Duration::from_secs(5));
  }
}
