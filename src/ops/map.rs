//! Mapping operators: reshape each value into zero or more outputs.

use crate::error::Delivery;
use crate::event::{Event, Termination};
use crate::stream::{Data, Emitter, Stream};

/// One-shot completion handle for [`Stream::map_async`].
///
/// Consuming `complete` makes double completion unrepresentable; a completion
/// arriving after the downstream node terminated is silently dropped by the
/// emitter.
pub struct AsyncReply<U: Data> {
  emitter: Emitter<U>,
}

impl<U: Data> AsyncReply<U> {
  /// Finishes one async mapping: `None` suppresses the value, a failure
  /// terminates downstream with an error.
  pub fn complete(self, result: Option<Delivery<U>>) {
    match result {
      None => {}
      Some(Ok(value)) => self.emitter.emit(Some(vec![Event::Next(value)])),
      Some(Err(fault)) => self
        .emitter
        .emit(Some(vec![Event::Terminate(Termination::Error(fault))])),
    }
  }

  pub fn complete_value(self, value: U) {
    self.complete(Some(Ok(value)));
  }
}

impl<T: Data> Stream<T> {
  /// Emits `f(value)` for each value.
  pub fn map<U: Data>(&self, mut f: impl FnMut(T) -> U + Send + 'static) -> Stream<U> {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => emit.emit(Some(vec![Event::Next(f(value.clone()))])),
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Emits the mapped value when `f` returns one; `None` suppresses.
  pub fn filter_map<U: Data>(
    &self,
    mut f: impl FnMut(T) -> Option<U> + Send + 'static,
  ) -> Stream<U> {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => match f(value.clone()) {
        Some(mapped) => emit.emit(Some(vec![Event::Next(mapped)])),
        None => emit.emit(None),
      },
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Emits the mapped value on success; a failure terminates the stream with
  /// an error.
  pub fn try_map<U: Data>(
    &self,
    mut f: impl FnMut(T) -> Delivery<U> + Send + 'static,
  ) -> Stream<U> {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => match f(value.clone()) {
        Ok(mapped) => emit.emit(Some(vec![Event::Next(mapped)])),
        Err(fault) => emit.emit(Some(vec![Event::Terminate(Termination::Error(fault))])),
      },
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Hands each value and a one-shot [`AsyncReply`] to `f`; the reply may be
  /// completed from a later dispatcher task. Terminals forward immediately.
  pub fn map_async<U: Data>(
    &self,
    mut f: impl FnMut(T, AsyncReply<U>) + Send + 'static,
  ) -> Stream<U> {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => f(value.clone(), AsyncReply { emitter: emit }),
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Emits every element `f` yields, in order.
  pub fn flat_map<U: Data, I>(&self, mut f: impl FnMut(T) -> I + Send + 'static) -> Stream<U>
  where
    I: IntoIterator<Item = U>,
  {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        let out: Vec<Event<U>> = f(value.clone()).into_iter().map(Event::Next).collect();
        emit.emit(Some(out));
      }
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Flattens iterable values into their elements.
  pub fn flatten<U: Data>(&self) -> Stream<U>
  where
    T: IntoIterator<Item = U>,
  {
    self.flat_map(|value| value)
  }

  /// Emits the running accumulator for each value.
  pub fn scan<U: Data>(
    &self,
    initial: U,
    mut f: impl FnMut(U, T) -> U + Send + 'static,
  ) -> Stream<U> {
    let mut acc = initial;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        acc = f(acc.clone(), value.clone());
        emit.emit(Some(vec![Event::Next(acc.clone())]));
      }
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Folds the whole stream and emits the final accumulator on termination.
  pub fn reduce<U: Data>(
    &self,
    initial: U,
    f: impl FnMut(U, T) -> U + Send + 'static,
  ) -> Stream<U> {
    self.scan(initial, f).last()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::StreamFault;
  use crate::event::Termination;
  use crate::hot::HotInput;
  use crate::stream::{Data, Stream};
  use proptest::prelude::*;
  use std::sync::{Arc, Mutex};

  fn collect<T: Data>(stream: &Stream<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _ = stream.on(move |v| sink.lock().unwrap().push(v.clone()));
    seen
  }

  #[test]
  fn map_reshapes_each_value() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().map(|v| v * 2));
    input.push(1);
    input.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![2, 4]);
  }

  #[test]
  fn filter_map_suppresses_none() {
    let input = HotInput::<i32>::new();
    let seen = collect(
      &input
        .stream()
        .filter_map(|v| (v % 2 == 0).then(|| v * 10)),
    );
    for v in 1..=4 {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![20, 40]);
  }

  #[test]
  fn try_map_failure_terminates_with_error() {
    let input = HotInput::<i32>::new();
    let mapped = input.stream().try_map(|v| {
      if v < 10 {
        Ok(v)
      } else {
        Err(StreamFault::message("too big"))
      }
    });
    let seen = collect(&mapped);
    input.push(1);
    input.push(99);
    input.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert!(mapped.is_terminated());
  }

  #[test]
  fn map_async_completion_is_single_shot() {
    let input = HotInput::<i32>::new();
    let mapped = input
      .stream()
      .map_async(|v, reply: AsyncReply<i32>| reply.complete_value(v + 1));
    let seen = collect(&mapped);
    input.push(1);
    input.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![2, 3]);
  }

  #[test]
  fn map_async_none_suppresses() {
    let input = HotInput::<i32>::new();
    let mapped = input.stream().map_async(|v, reply: AsyncReply<i32>| {
      if v % 2 == 0 {
        reply.complete(Some(Ok(v)));
      } else {
        reply.complete(None);
      }
    });
    let seen = collect(&mapped);
    for v in 1..=4 {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![2, 4]);
  }

  #[test]
  fn flat_map_emits_elements_in_order() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().flat_map(|v| vec![v, v + 100]));
    input.push(1);
    input.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![1, 101, 2, 102]);
  }

  #[test]
  fn flatten_is_flat_map_identity() {
    let input = HotInput::<Vec<i32>>::new();
    let seen = collect(&input.stream().flatten());
    input.push(vec![1, 2]);
    input.push(vec![]);
    input.push(vec![3]);
    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
  }

  #[test]
  fn reduce_emits_the_final_fold_on_termination() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().reduce(0, |acc, v| acc + v));
    for v in 1..=4 {
      input.push(v);
    }
    assert!(seen.lock().unwrap().is_empty());
    input.terminate(Termination::Completed);
    assert_eq!(*seen.lock().unwrap(), vec![10]);
  }

  proptest! {
    #[test]
    fn scan_matches_prefix_folds(values in prop::collection::vec(-100i64..100, 0..32)) {
      let input = HotInput::<i64>::new();
      let seen = collect(&input.stream().scan(0i64, |acc, v| acc + v));
      for v in &values {
        input.push(*v);
      }
      let expected: Vec<i64> = values
        .iter()
        .scan(0i64, |acc, v| {
          *acc += *v;
          Some(*acc)
        })
        .collect();
      prop_assert_eq!(seen.lock().unwrap().clone(), expected);
    }
  }
}
