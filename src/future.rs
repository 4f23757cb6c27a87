//! One-shot streams: at most one value, then completed.
//!
//! A future stream terminates on its first delivery. Its replay policy is
//! `Last(1)`, and attaching to an already-completed future replays the value
//! and the terminal on a later dispatcher tick, so late subscribers observe
//! the same two events as early ones, just asynchronously.

use crate::dispatch::Dispatcher;
use crate::error::{Delivery, StreamFault};
use crate::event::{Event, EventKey, ReplayPolicy, StreamKind, Termination};
use crate::stream::{Data, RoutePolicy, Stream};

fn future_node<T: Data>(dispatcher: Dispatcher) -> Stream<T> {
  Stream::source(
    StreamKind::Future,
    dispatcher,
    RoutePolicy::Open,
    false,
    ReplayPolicy::Last(1),
  )
}

fn settle<T: Data>(stream: &Stream<T>, result: Delivery<T>) {
  let core = stream.core.clone();
  stream.dispatcher().execute(move || match result {
    Ok(value) => {
      core.push(Event::Next(value), EventKey::Broadcast);
      core.push(
        Event::Terminate(Termination::Completed),
        EventKey::Broadcast,
      );
    }
    Err(fault) => {
      core.push(Event::Terminate(Termination::Error(fault)), EventKey::Broadcast);
    }
  });
}

/// One-shot completion handle. Consuming `complete` makes double completion
/// unrepresentable from safe code; a completion raced through clones of the
/// backing input is ignored by the node's terminal state instead.
pub struct FutureCompletion<T: Data> {
  stream: Stream<T>,
}

impl<T: Data> FutureCompletion<T> {
  /// Settles the future. A value emits `Next` then `Completed`; a failure
  /// terminates with an error.
  pub fn complete(self, result: Delivery<T>) {
    settle(&self.stream, result);
  }

  pub fn complete_value(self, value: T) {
    self.complete(Ok(value));
  }

  pub fn complete_error(self, fault: StreamFault) {
    self.complete(Err(fault));
  }
}

/// A stream guaranteed to emit at most one value before terminating.
pub struct Future<T: Data> {
  stream: Stream<T>,
}

impl<T: Data> Future<T> {
  /// Runs `task` with a one-shot completion handle. The task may complete
  /// synchronously or hand the completion to other code.
  pub fn new(task: impl FnOnce(FutureCompletion<T>)) -> Self {
    Self::with_dispatcher(Dispatcher::calling_thread(), task)
  }

  /// Same as [`Future::new`] on a caller-supplied dispatcher.
  pub fn with_dispatcher(
    dispatcher: Dispatcher,
    task: impl FnOnce(FutureCompletion<T>),
  ) -> Self {
    let stream = future_node(dispatcher);
    task(FutureCompletion {
      stream: stream.clone(),
    });
    Self { stream }
  }

  /// A future that already holds its value.
  pub fn completed(value: T) -> Self {
    Self::new(move |completion| completion.complete_value(value))
  }

  /// A future that already failed.
  pub fn failed(fault: StreamFault) -> Self {
    Self::new(move |completion| completion.complete_error(fault))
  }

  /// The node to chain operators on.
  pub fn stream(&self) -> &Stream<T> {
    &self.stream
  }
}

impl<T: Data> Clone for Future<T> {
  fn clone(&self) -> Self {
    Self {
      stream: self.stream.clone(),
    }
  }
}

/// A future settled imperatively from outside. Completions after the first
/// are ignored.
pub struct FutureInput<T: Data> {
  stream: Stream<T>,
}

impl<T: Data> FutureInput<T> {
  pub fn new() -> Self {
    Self::with_dispatcher(Dispatcher::calling_thread())
  }

  pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
    Self {
      stream: future_node(dispatcher),
    }
  }

  pub fn stream(&self) -> &Stream<T> {
    &self.stream
  }

  /// Settles the future; later calls are dropped by the terminal state.
  pub fn complete(&self, result: Delivery<T>) {
    settle(&self.stream, result);
  }

  pub fn complete_value(&self, value: T) {
    self.complete(Ok(value));
  }

  pub fn complete_error(&self, fault: StreamFault) {
    self.complete(Err(fault));
  }
}

impl<T: Data> Default for FutureInput<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Data> Clone for FutureInput<T> {
  fn clone(&self) -> Self {
    Self {
      stream: self.stream.clone(),
    }
  }
}
