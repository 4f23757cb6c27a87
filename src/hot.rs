//! Hot broadcast sources with an imperative push surface.

use crate::dispatch::Dispatcher;
use crate::error::Delivery;
use crate::event::{Event, Termination};
use crate::stream::{Data, Stream};

/// A hot source driven by external code: values are pushed in, every attached
/// child sees them, late subscribers miss what came before (modulo the replay
/// policy on the node).
///
/// The input node is persistent: it does not cancel itself when its last
/// child goes away, since the producer driving it is still alive.
pub struct HotInput<T: Data> {
  stream: Stream<T>,
}

impl<T: Data> HotInput<T> {
  /// An input on its own calling-thread dispatcher.
  pub fn new() -> Self {
    Self::with_dispatcher(Dispatcher::calling_thread())
  }

  /// An input on the given dispatcher; use this to share one queue across
  /// several sources feeding the same graph.
  pub fn with_dispatcher(dispatcher: Dispatcher) -> Self {
    Self {
      stream: Stream::hot_on(dispatcher),
    }
  }

  /// The node to chain operators on.
  pub fn stream(&self) -> &Stream<T> {
    &self.stream
  }

  /// Broadcasts a value. Entries are re-posted through the dispatcher, so
  /// pushes from any thread serialize with the rest of the graph.
  pub fn push(&self, value: T) {
    self.stream.inject(Event::Next(value));
  }

  /// Broadcasts a producer result: a value passes through, a failure
  /// terminates the stream with an error.
  pub fn push_result(&self, result: Delivery<T>) {
    match result {
      Ok(value) => self.push(value),
      Err(fault) => self.terminate(Termination::Error(fault)),
    }
  }

  /// Ends the stream.
  pub fn terminate(&self, reason: Termination) {
    self.stream.terminate(reason);
  }
}

impl<T: Data> Default for HotInput<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Data> Clone for HotInput<T> {
  fn clone(&self) -> Self {
    Self {
      stream: self.stream.clone(),
    }
  }
}
