//! Arithmetic and ordering operators over the running stream.

use crate::event::Event;
use crate::stream::{Data, Stream};
use std::cmp::Ordering;
use std::ops::Add;

impl<T: Data> Stream<T> {
  /// Emits the running sum.
  pub fn sum(&self) -> Stream<T>
  where
    T: Add<Output = T> + Default,
  {
    self.scan(T::default(), |acc, value| acc + value)
  }

  /// Emits the running arithmetic mean.
  pub fn average(&self) -> Stream<f64>
  where
    T: Into<f64> + Copy,
  {
    let mut total = 0.0f64;
    let mut seen = 0usize;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        total += (*value).into();
        seen += 1;
        emit.emit(Some(vec![Event::Next(total / seen as f64)]));
      }
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Emits a value only when it is a new minimum under `cmp`. The first
  /// value always passes.
  pub fn min_by(&self, mut cmp: impl FnMut(&T, &T) -> Ordering + Send + 'static) -> Stream<T> {
    let mut best: Option<T> = None;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        let improved = match &best {
          None => true,
          Some(current) => cmp(value, current) == Ordering::Less,
        };
        if improved {
          best = Some(value.clone());
          emit.emit(Some(vec![event.clone()]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// Emits a value only when it is a new maximum under `cmp`. The first
  /// value always passes.
  pub fn max_by(&self, mut cmp: impl FnMut(&T, &T) -> Ordering + Send + 'static) -> Stream<T> {
    self.min_by(move |a, b| cmp(a, b).reverse())
  }

  /// Running minimum of an ordered stream.
  pub fn min(&self) -> Stream<T>
  where
    T: Ord,
  {
    self.min_by(|a, b| a.cmp(b))
  }

  /// Running maximum of an ordered stream.
  pub fn max(&self) -> Stream<T>
  where
    T: Ord,
  {
    self.max_by(|a, b| a.cmp(b))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
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
  fn sum_is_a_running_total() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().sum());
    for v in [1, 2, 3] {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![1, 3, 6]);
  }

  #[test]
  fn average_tracks_the_running_mean() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().average());
    for v in [1, 2, 3] {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![1.0, 1.5, 2.0]);
  }

  #[test]
  fn min_emits_only_new_minima() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().min());
    for v in [5, 7, 3, 3, 1] {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![5, 3, 1]);
  }

  #[test]
  fn max_emits_only_new_maxima() {
    let input = HotInput::<i32>::new();
    let seen = collect(&input.stream().max());
    for v in [5, 2, 7, 7, 9] {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec![5, 7, 9]);
  }

  #[test]
  fn max_by_orders_with_the_comparator() {
    let input = HotInput::<&'static str>::new();
    let seen = collect(&input.stream().max_by(|a, b| a.len().cmp(&b.len())));
    for v in ["by", "three", "four", "sixteen"] {
      input.push(v);
    }
    assert_eq!(*seen.lock().unwrap(), vec!["by", "three", "sixteen"]);
  }
}
