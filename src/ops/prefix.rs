//! Operators that add values around the stream's own traffic.

use crate::event::Event;
use crate::stream::{Data, Stream};

impl<T: Data> Stream<T> {
  /// Emits `values` once, immediately before the first value of the stream.
  /// A stream that terminates without producing never emits the prefix.
  pub fn start_with(&self, values: Vec<T>) -> Stream<T> {
    let mut prefix = Some(values);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => match prefix.take() {
        Some(values) => {
          let mut out: Vec<Event<T>> = values.into_iter().map(Event::Next).collect();
          out.push(Event::Next(value.clone()));
          emit.emit(Some(out));
        }
        None => emit.emit(Some(vec![event.clone()])),
      },
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// On termination, emits `values` before forwarding the terminal.
  pub fn concat(&self, values: Vec<T>) -> Stream<T> {
    let mut suffix = Some(values);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(_) => emit.emit(Some(vec![event.clone()])),
      Event::Terminate(_) => {
        let mut out: Vec<Event<T>> = suffix
          .take()
          .unwrap_or_default()
          .into_iter()
          .map(Event::Next)
          .collect();
        out.push(event.clone());
        emit.emit(Some(out));
      }
    })
  }

  /// If the stream terminates without having emitted, emits `value` first.
  pub fn default_value(&self, value: T) -> Stream<T> {
    let mut fallback = Some(value);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(_) => {
        fallback = None;
        emit.emit(Some(vec![event.clone()]));
      }
      Event::Terminate(_) => match fallback.take() {
        Some(value) => emit.emit(Some(vec![Event::Next(value), event.clone()])),
        None => emit.emit(Some(vec![event.clone()])),
      },
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Termination;
  use crate::hot::HotInput;
  use crate::stream::{Data, Stream};
  use std::sync::{Arc, Mutex};

  fn collect<T: Data>(stream: &Stream<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _ = stream.on(move |v| sink.lock().unwrap().push(v.clone()));
    seen
  }

  #[test]
  fn start_with_prefixes_the_first_value_only() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().start_with(vec![-2, -1]));
    input.push(1);
    input.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![-2, -1, 1, 2]);
  }

  #[test]
  fn start_with_never_fires_without_a_value() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().start_with(vec![-1]));
    input.terminate(Termination::Completed);
    assert!(seen.lock().unwrap().is_empty());
  }

  #[test]
  fn concat_appends_before_the_terminal() {
    let input = HotInput::<i32>::new();
    let appended = input.stream().concat(vec![8, 9]);
    let seen = collect(&appended);
    let ends = Arc::new(Mutex::new(Vec::new()));
    let sink = ends.clone();
    let _done = appended.on_terminate(move |t| sink.lock().unwrap().push(t.clone()));

    input.push(1);
    input.terminate(Termination::Completed);
    assert_eq!(*seen.lock().unwrap(), vec![1, 8, 9]);
    assert_eq!(*ends.lock().unwrap(), vec![Termination::Completed]);
  }

  #[test]
  fn default_value_fills_an_empty_stream() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().default_value(42));
    input.terminate(Termination::Completed);
    assert_eq!(*seen.lock().unwrap(), vec![42]);
  }

  #[test]
  fn default_value_stays_quiet_once_values_flowed() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().default_value(42));
    input.push(7);
    input.terminate(Termination::Completed);
    assert_eq!(*seen.lock().unwrap(), vec![7]);
  }
}
