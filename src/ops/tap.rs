//! Observation operators: pass everything through, invoke a handler.

use crate::event::{Event, Termination};
use crate::stream::{Data, Stream};

impl<T: Data> Stream<T> {
  /// Invokes `handler` for each value; events pass through unchanged.
  pub fn on(&self, mut handler: impl FnMut(&T) + Send + 'static) -> Stream<T> {
    self.transform(move |_prior, event, emit| {
      if let Event::Next(value) = event {
        handler(value);
      }
      emit.emit(Some(vec![event.clone()]));
    })
  }

  /// Invokes `handler` for every event, values and terminals alike.
  pub fn on_event(&self, mut handler: impl FnMut(&Event<T>) + Send + 'static) -> Stream<T> {
    self.transform(move |_prior, event, emit| {
      handler(event);
      emit.emit(Some(vec![event.clone()]));
    })
  }

  /// Invokes `handler` once, when the stream terminates.
  pub fn on_terminate(
    &self,
    mut handler: impl FnMut(&Termination) + Send + 'static,
  ) -> Stream<T> {
    self.transform(move |_prior, event, emit| {
      if let Event::Terminate(reason) = event {
        handler(reason);
      }
      emit.emit(Some(vec![event.clone()]));
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{Event, Termination};
  use crate::hot::HotInput;
  use std::sync::{Arc, Mutex};

  #[test]
  fn on_sees_values_and_passes_them_through() {
    let input = HotInput::<i32>::new();
    let first = Arc::new(Mutex::new(Vec::new()));
    let second = Arc::new(Mutex::new(Vec::new()));
    let a = first.clone();
    let b = second.clone();
    let _chain = input
      .stream()
      .on(move |v| a.lock().unwrap().push(*v))
      .on(move |v| b.lock().unwrap().push(*v));

    input.push(1);
    input.push(2);
    assert_eq!(*first.lock().unwrap(), vec![1, 2]);
    assert_eq!(*second.lock().unwrap(), vec![1, 2]);
  }

  #[test]
  fn on_event_sees_the_terminal() {
    let input = HotInput::<i32>::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _chain = input
      .stream()
      .on_event(move |e| sink.lock().unwrap().push(e.clone()));

    input.push(9);
    input.terminate(Termination::Completed);
    assert_eq!(
      *events.lock().unwrap(),
      vec![Event::Next(9), Event::Terminate(Termination::Completed)]
    );
  }

  #[test]
  fn on_terminate_fires_exactly_once() {
    let input = HotInput::<i32>::new();
    let ends = Arc::new(Mutex::new(Vec::new()));
    let sink = ends.clone();
    let _chain = input
      .stream()
      .on_terminate(move |t| sink.lock().unwrap().push(t.clone()));

    input.terminate(Termination::Cancelled);
    input.terminate(Termination::Completed);
    assert_eq!(*ends.lock().unwrap(), vec![Termination::Cancelled]);
  }
}
