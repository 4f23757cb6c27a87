//! Grouping operators: chunks, sliding windows, trailing time windows.

use crate::event::Event;
use crate::stream::{Data, Stream};
use crate::support::CircularBuffer;
use crate::time::{Clock, SystemClock};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

impl<T: Data> Stream<T> {
  /// Collects every `size` values into a list. On termination the partial
  /// chunk is flushed iff `partial`.
  pub fn buffer(&self, size: usize, partial: bool) -> Stream<Vec<T>> {
    assert!(size >= 1, "buffer requires size >= 1");
    let mut chunk: Vec<T> = Vec::with_capacity(size);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        chunk.push(value.clone());
        if chunk.len() == size {
          let full = std::mem::replace(&mut chunk, Vec::with_capacity(size));
          emit.emit(Some(vec![Event::Next(full)]));
        }
      }
      Event::Terminate(t) => {
        let mut out = Vec::new();
        if partial && !chunk.is_empty() {
          out.push(Event::Next(std::mem::take(&mut chunk)));
        }
        out.push(Event::Terminate(t.clone()));
        emit.emit(Some(out));
      }
    })
  }

  /// Sliding window of the last `size` values, emitted per incoming value.
  /// Under-filled windows are emitted iff `partial`.
  pub fn window(&self, size: usize, partial: bool) -> Stream<Vec<T>> {
    assert!(size >= 1, "window requires size >= 1");
    let mut held = CircularBuffer::new(size);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        held.push(value.clone());
        if partial || held.is_full() {
          emit.emit(Some(vec![Event::Next(held.to_vec())]));
        }
      }
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Per incoming value, emits everything received within the trailing
  /// wall-clock `width`, truncated to the newest `limit` when given.
  pub fn time_window(&self, width: Duration, limit: Option<usize>) -> Stream<Vec<T>> {
    self.time_window_with_clock(width, limit, Arc::new(SystemClock))
  }

  /// [`Stream::time_window`] on an injectable clock.
  pub fn time_window_with_clock(
    &self,
    width: Duration,
    limit: Option<usize>,
    clock: Arc<dyn Clock>,
  ) -> Stream<Vec<T>> {
    let mut held: VecDeque<(std::time::Instant, T)> = VecDeque::new();
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        let now = clock.now();
        held.push_back((now, value.clone()));
        while let Some((at, _)) = held.front() {
          if now.duration_since(*at) > width {
            held.pop_front();
          } else {
            break;
          }
        }
        if let Some(limit) = limit {
          while held.len() > limit {
            held.pop_front();
          }
        }
        let values: Vec<T> = held.iter().map(|(_, v)| v.clone()).collect();
        emit.emit(Some(vec![Event::Next(values)]));
      }
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }
}
