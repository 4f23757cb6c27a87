//! Prefix/suffix operators and predicate-driven termination.

use crate::event::{Event, Termination};
use crate::stream::{Data, Stream};
use crate::support::CircularBuffer;

impl<T: Data> Stream<T> {
  /// Passes the first value, then terminates with `Cancelled`.
  pub fn first(&self) -> Stream<T> {
    self.take_then(1, Termination::Cancelled)
  }

  /// Passes the first `n` values, then terminates with `Cancelled`.
  pub fn take(&self, n: usize) -> Stream<T> {
    self.take_then(n, Termination::Cancelled)
  }

  /// Passes the first `n` values, then terminates with the given reason.
  pub fn take_then(&self, n: usize, termination: Termination) -> Stream<T> {
    let mut remaining = n;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(_) => {
        if remaining == 0 {
          emit.emit(Some(vec![Event::Terminate(termination.clone())]));
          return;
        }
        remaining -= 1;
        if remaining == 0 {
          emit.emit(Some(vec![
            event.clone(),
            Event::Terminate(termination.clone()),
          ]));
        } else {
          emit.emit(Some(vec![event.clone()]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// Drops the first `n` values.
  pub fn skip(&self, n: usize) -> Stream<T> {
    let mut skipped = 0usize;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(_) => {
        if skipped < n {
          skipped += 1;
        } else {
          emit.emit(Some(vec![event.clone()]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// Emits the final value (if any) when the stream terminates.
  pub fn last(&self) -> Stream<T> {
    let mut held: Option<T> = None;
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => held = Some(value.clone()),
      Event::Terminate(_) => match held.take() {
        Some(value) => emit.emit(Some(vec![Event::Next(value), event.clone()])),
        None => emit.emit(Some(vec![event.clone()])),
      },
    })
  }

  /// Emits the final `n` values on termination. With `partial` false, an
  /// under-filled buffer is dropped and only the terminal goes out.
  pub fn last_n(&self, n: usize, partial: bool) -> Stream<T> {
    let mut held = CircularBuffer::new(n);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        held.push(value.clone());
      }
      Event::Terminate(_) => {
        if !partial && !held.is_full() {
          held.clear();
        }
        let mut out: Vec<Event<T>> = held.to_vec().into_iter().map(Event::Next).collect();
        held.clear();
        out.push(event.clone());
        emit.emit(Some(out));
      }
    })
  }

  /// Passes values while the predicate holds; the first miss terminates with
  /// the given reason (without emitting the failing value).
  pub fn do_while(
    &self,
    mut pred: impl FnMut(&T) -> bool + Send + 'static,
    termination: Termination,
  ) -> Stream<T> {
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        if pred(value) {
          emit.emit(Some(vec![event.clone()]));
        } else {
          emit.emit(Some(vec![Event::Terminate(termination.clone())]));
        }
      }
      Event::Terminate(_) => emit.emit(Some(vec![event.clone()])),
    })
  }

  /// Passes values until the predicate trips; the triggering value is not
  /// emitted, the stream terminates with the given reason.
  pub fn until(
    &self,
    mut pred: impl FnMut(&T) -> bool + Send + 'static,
    termination: Termination,
  ) -> Stream<T> {
    self.do_while(move |value| !pred(value), termination)
  }
}
