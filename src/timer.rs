//! Repeating `()` source on an injectable scheduling driver.
//!
//! `stop` cancels the schedule but leaves the stream active, so the timer can
//! be started again; `terminate` ends the stream and cancels for good.
//! Dropping the timer cancels the underlying schedule.

use crate::dispatch::Dispatcher;
use crate::event::{Event, EventKey, ReplayPolicy, StreamKind, Termination};
use crate::stream::{RoutePolicy, Stream};
use crate::support::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::trace;

/// Opaque handle to one scheduled timer.
pub type TimerToken = u64;

/// The scheduling seam. Production uses [`TokioTimerDriver`]; tests swap in
/// [`ManualTimerDriver`] and fire ticks by hand.
pub trait TimerDriver: Send + Sync {
  /// Schedules `fire` every `interval` (or once after it, when `repeats` is
  /// false) until cancelled.
  fn schedule(
    &self,
    interval: Duration,
    repeats: bool,
    fire: Arc<dyn Fn() + Send + Sync>,
  ) -> TimerToken;

  fn cancel(&self, token: TimerToken);
}

/// Spawned `tokio::time` loops; cancellation aborts the task. Scheduling
/// requires an ambient tokio runtime.
#[derive(Default)]
pub struct TokioTimerDriver {
  next: AtomicU64,
  tasks: Mutex<HashMap<TimerToken, tokio::task::JoinHandle<()>>>,
}

impl TokioTimerDriver {
  pub fn new() -> Self {
    Self::default()
  }
}

impl TimerDriver for TokioTimerDriver {
  fn schedule(
    &self,
    interval: Duration,
    repeats: bool,
    fire: Arc<dyn Fn() + Send + Sync>,
  ) -> TimerToken {
    let token = self.next.fetch_add(1, Ordering::Relaxed) + 1;
    let handle = tokio::spawn(async move {
      if repeats {
        let start = tokio::time::Instant::now() + interval;
        let mut ticks = tokio::time::interval_at(start, interval);
        loop {
          ticks.tick().await;
          fire();
        }
      } else {
        tokio::time::sleep(interval).await;
        fire();
      }
    });
    lock(&self.tasks).insert(token, handle);
    token
  }

  fn cancel(&self, token: TimerToken) {
    if let Some(handle) = lock(&self.tasks).remove(&token) {
      handle.abort();
    }
  }
}

/// Driver that only ticks when told to. For tests.
#[derive(Default)]
pub struct ManualTimerDriver {
  next: AtomicU64,
  scheduled: Mutex<HashMap<TimerToken, Arc<dyn Fn() + Send + Sync>>>,
}

impl ManualTimerDriver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Fires every scheduled timer once.
  pub fn tick(&self) {
    let fires: Vec<_> = lock(&self.scheduled).values().cloned().collect();
    for fire in fires {
      fire();
    }
  }

  /// Number of live schedules.
  pub fn scheduled_count(&self) -> usize {
    lock(&self.scheduled).len()
  }
}

impl TimerDriver for ManualTimerDriver {
  fn schedule(
    &self,
    _interval: Duration,
    _repeats: bool,
    fire: Arc<dyn Fn() + Send + Sync>,
  ) -> TimerToken {
    let token = self.next.fetch_add(1, Ordering::Relaxed) + 1;
    lock(&self.scheduled).insert(token, fire);
    token
  }

  fn cancel(&self, token: TimerToken) {
    lock(&self.scheduled).remove(&token);
  }
}

struct TimerShared {
  driver: Arc<dyn TimerDriver>,
  token: Mutex<Option<TimerToken>>,
  timer_active_tx: watch::Sender<bool>,
}

impl TimerShared {
  fn cancel(&self) {
    if let Some(token) = lock(&self.token).take() {
      self.driver.cancel(token);
      self.timer_active_tx.send_replace(false);
    }
  }
}

/// Repeating source of `()` values.
pub struct Timer {
  stream: Stream<()>,
  shared: Arc<TimerShared>,
  interval: Mutex<Duration>,
}

impl Timer {
  /// A timer on the tokio driver and its own calling-thread dispatcher.
  pub fn new(interval: Duration) -> Self {
    Self::with_driver(
      interval,
      Arc::new(TokioTimerDriver::new()),
      Dispatcher::calling_thread(),
    )
  }

  /// The injection hook: any driver, any dispatcher.
  pub fn with_driver(
    interval: Duration,
    driver: Arc<dyn TimerDriver>,
    dispatcher: Dispatcher,
  ) -> Self {
    let stream = Stream::<()>::source(
      StreamKind::Hot,
      dispatcher,
      RoutePolicy::Open,
      true,
      ReplayPolicy::None,
    );
    let (timer_active_tx, _) = watch::channel(false);
    let shared = Arc::new(TimerShared {
      driver,
      token: Mutex::new(None),
      timer_active_tx,
    });
    let on_end = shared.clone();
    stream
      .core
      .set_on_terminate(Box::new(move |_reason| on_end.cancel()));
    Self {
      stream,
      shared,
      interval: Mutex::new(interval),
    }
  }

  /// Starts firing after one interval. No-op while already running or once
  /// terminated.
  pub fn start(&self) {
    self.start_inner(true);
  }

  /// Starts firing, emitting one value synchronously before the schedule.
  pub fn start_immediate(&self) {
    self.start_inner(false);
  }

  fn start_inner(&self, delay_first: bool) {
    if self.stream.is_terminated() {
      return;
    }
    let mut token = lock(&self.shared.token);
    if token.is_some() {
      return;
    }
    if !delay_first {
      self.stream.inject(Event::Next(()));
    }
    let weak = Arc::downgrade(&self.stream.core);
    let dispatcher = self.stream.dispatcher();
    let fire: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
      let Some(core) = weak.upgrade() else { return };
      dispatcher.execute(move || core.push(Event::Next(()), EventKey::Broadcast));
    });
    let interval = *lock(&self.interval);
    *token = Some(self.shared.driver.schedule(interval, true, fire));
    self.shared.timer_active_tx.send_replace(true);
    trace!(interval_ms = interval.as_millis() as u64, "timer started");
  }

  /// Cancels the schedule; the stream stays active and `start` works again.
  pub fn stop(&self) {
    self.shared.cancel();
  }

  /// Stops, changes the interval, and starts again.
  pub fn restart(&self, interval: Duration) {
    self.stop();
    *lock(&self.interval) = interval;
    self.start();
  }

  /// Ends the stream and cancels the schedule for good.
  pub fn terminate(&self, reason: Termination) {
    self.shared.cancel();
    self.stream.terminate(reason);
  }

  /// Whether the stream is still usable (started or not).
  pub fn is_active(&self) -> bool {
    self.stream.is_active()
  }

  /// Whether a schedule is currently running.
  pub fn is_timer_active(&self) -> bool {
    lock(&self.shared.token).is_some()
  }

  /// Observable view of schedule activity.
  pub fn timer_activity(&self) -> watch::Receiver<bool> {
    self.shared.timer_active_tx.subscribe()
  }

  /// The node to chain operators on.
  pub fn stream(&self) -> &Stream<()> {
    &self.stream
  }

  /// Convenience: 1-indexed tick counter.
  pub fn counter(&self) -> Stream<usize> {
    self.stream.count()
  }
}

impl Drop for Timer {
  fn drop(&mut self) {
    self.shared.cancel();
  }
}
