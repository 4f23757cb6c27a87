//! Deferred delivery through the dispatcher.

use crate::event::{Event, Termination};
use crate::stream::{Data, Stream};
use crate::support::lock;
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct DelayGate {
  in_flight: usize,
  held_terminal: Option<Termination>,
}

impl<T: Data> Stream<T> {
  /// Re-emits each value `delay` later, scheduled through the dispatcher.
  /// A terminal waits for every delayed value to drain before it goes out;
  /// delayed values landing after the downstream node terminated are dropped
  /// by the emitter.
  pub fn delay(&self, delay: Duration) -> Stream<T> {
    let dispatcher = self.dispatcher();
    let gate = Arc::new(Mutex::new(DelayGate {
      in_flight: 0,
      held_terminal: None,
    }));
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => {
        lock(&gate).in_flight += 1;
        let gate = gate.clone();
        let value = value.clone();
        let emit = emit.clone();
        dispatcher.after(delay, move || {
          emit.emit(Some(vec![Event::Next(value)]));
          let drained_terminal = {
            let mut state = lock(&gate);
            state.in_flight -= 1;
            if state.in_flight == 0 {
              state.held_terminal.take()
            } else {
              None
            }
          };
          if let Some(reason) = drained_terminal {
            emit.emit(Some(vec![Event::Terminate(reason)]));
          }
        });
      }
      Event::Terminate(reason) => {
        let fire_now = {
          let mut state = lock(&gate);
          if state.in_flight == 0 {
            true
          } else {
            state.held_terminal = Some(reason.clone());
            false
          }
        };
        if fire_now {
          emit.emit(Some(vec![Event::Terminate(reason.clone())]));
        }
      }
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::Termination;
  use crate::hot::HotInput;
  use crate::stream::{Data, Stream};
  use std::sync::{Arc, Mutex as StdMutex};
  use std::time::Duration;

  fn collect<T: Data>(stream: &Stream<T>) -> Arc<StdMutex<Vec<T>>> {
    let seen = Arc::new(StdMutex::new(Vec::new()));
    let sink = seen.clone();
    let _ = stream.on(move |v| sink.lock().unwrap().push(v.clone()));
    seen
  }

  #[tokio::test]
  async fn values_arrive_after_the_delay() {
    let input = HotInput::<i32>::new();
    let delayed = input.stream().delay(Duration::from_millis(30));
    let seen = collect(&delayed);

    input.push(1);
    input.push(2);
    assert!(seen.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
  }

  #[tokio::test]
  async fn terminal_waits_for_delayed_values() {
    let input = HotInput::<i32>::new();
    let delayed = input.stream().delay(Duration::from_millis(30));
    let seen = collect(&delayed);
    let ends = Arc::new(StdMutex::new(Vec::new()));
    let sink = ends.clone();
    let _done = delayed.on_terminate(move |t| sink.lock().unwrap().push(t.clone()));

    input.push(1);
    input.terminate(Termination::Completed);
    assert!(ends.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(*ends.lock().unwrap(), vec![Termination::Completed]);
  }

  #[tokio::test]
  async fn immediate_terminal_passes_straight_through() {
    let input = HotInput::<i32>::new();
    let delayed = input.stream().delay(Duration::from_millis(30));
    let ends = Arc::new(StdMutex::new(Vec::new()));
    let sink = ends.clone();
    let _done = delayed.on_terminate(move |t| sink.lock().unwrap().push(t.clone()));

    input.terminate(Termination::Cancelled);
    assert_eq!(*ends.lock().unwrap(), vec![Termination::Cancelled]);
  }
}
