//! Selection operators: decide per value whether it passes.

use crate::event::Event;
use crate::stream::{Data, Stream};

impl<T: Data> Stream<T> {
  /// Passes values matching the predicate.
  pub fn filter(&self, mut pred: impl FnMut(&T) -> bool + Send + 'static) -> Stream<T> {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        if pred(value) {
          emit.emit(Some(vec![event.clone()]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// Passes the first value unconditionally; later values pass when the
  /// predicate, given the previous value seen on this edge and the new one,
  /// says they differ enough.
  pub fn distinct_by(
    &self,
    mut pred: impl FnMut(&T, &T) -> bool + Send + 'static,
  ) -> Stream<T> {
    self.transform(move |prior, event, emit| match event {
      Event::Next(value) => {
        let passes = match prior {
          None => true,
          Some(previous) => pred(previous, value),
        };
        if passes {
          emit.emit(Some(vec![event.clone()]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// Drops consecutive duplicates.
  pub fn distinct(&self) -> Stream<T>
  where
    T: PartialEq,
  {
    self.distinct_by(|previous, next| previous != next)
  }

  /// Passes every nth value: the nth, the 2nth, and so on.
  pub fn stride(&self, n: usize) -> Stream<T> {
    assert!(n >= 1, "stride requires n >= 1");
    let mut count = 0usize;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(_) => {
        count += 1;
        if count % n == 0 {
          emit.emit(Some(vec![event.clone()]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }
}
