//! Annotation operators: pair values with derived marks, timestamps, counts.

use crate::event::Event;
use crate::stream::{Data, Emitter, Stream};
use crate::time::{Clock, SystemClock};
use std::sync::Arc;
use std::time::Instant;

fn forward_terminal<T: Data, U: Data>(event: &Event<T>, emit: &Emitter<U>) -> bool {
  if let Event::Terminate(reason) = event {
    emit.emit(Some(vec![Event::Terminate(reason.clone())]));
    return true;
  }
  false
}

impl<T: Data> Stream<T> {
  /// Pairs each value with `f(value)`.
  pub fn stamp<U: Data>(&self, mut f: impl FnMut(&T) -> U + Send + 'static) -> Stream<(T, U)> {
    self.transform(move |_prior, event, emit| {
      if forward_terminal(event, &emit) {
        return;
      }
      if let Event::Next(value) = event {
        let mark = f(value);
        emit.emit(Some(vec![Event::Next((value.clone(), mark))]));
      }
    })
  }

  /// Pairs each value with the clock's notion of now.
  pub fn time_stamp(&self) -> Stream<(T, Instant)> {
    self.time_stamp_with_clock(Arc::new(SystemClock))
  }

  /// [`Stream::time_stamp`] on an injectable clock.
  pub fn time_stamp_with_clock(&self, clock: Arc<dyn Clock>) -> Stream<(T, Instant)> {
    self.stamp(move |_| clock.now())
  }

  /// Emits a 1-indexed counter per incoming value, not the value itself.
  pub fn count(&self) -> Stream<usize> {
    let mut seen = 0usize;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(_) => {
        seen += 1;
        emit.emit(Some(vec![Event::Next(seen)]));
      }
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Pairs each value with its 1-indexed position.
  pub fn count_stamp(&self) -> Stream<(T, usize)> {
    let mut seen = 0usize;
    self.stamp(move |_| {
      seen += 1;
      seen
    })
  }
}
