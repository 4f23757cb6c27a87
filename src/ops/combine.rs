//! Cross-parent operators: one child node fed by two parents.
//!
//! Both parents must share a dispatcher; mismatches are rejected at attach
//! time. The child carries one parent link per edge, so it is pruned only
//! after both sides let go.

use crate::dispatch::Dispatcher;
use crate::event::{Event, Termination};
use crate::stream::{attach, Data, Stream};
use crate::support::{lock, Either};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

fn assert_shared_dispatcher<A: Data, B: Data>(a: &Stream<A>, b: &Stream<B>) {
  assert!(
    Dispatcher::same(&a.dispatcher(), &b.dispatcher()),
    "combined streams must share a dispatcher"
  );
}

#[derive(Default)]
struct BothEnded {
  left: bool,
  right: bool,
}

impl BothEnded {
  fn mark(&mut self, left_side: bool) -> bool {
    if left_side {
      self.left = true;
    } else {
      self.right = true;
    }
    self.left && self.right
  }
}

struct ZipSide<T, U> {
  left: VecDeque<T>,
  right: VecDeque<U>,
  left_end: Option<Termination>,
  right_end: Option<Termination>,
  done: bool,
}

impl<T, U> ZipSide<T, U> {
  /// Once a terminated side has drained, no further pair can form.
  fn drained_end(&mut self) -> Option<Termination> {
    if self.done {
      return None;
    }
    if let Some(reason) = &self.left_end {
      if self.left.is_empty() {
        self.done = true;
        return Some(reason.clone());
      }
    }
    if let Some(reason) = &self.right_end {
      if self.right.is_empty() {
        self.done = true;
        return Some(reason.clone());
      }
    }
    None
  }

  fn pop_pair(&mut self) -> Option<(T, U)> {
    if self.left.front().is_some() && self.right.front().is_some() {
      self.left.pop_front().zip(self.right.pop_front())
    } else {
      None
    }
  }
}

struct CombineSlots<T, U> {
  last_left: Option<T>,
  last_right: Option<U>,
  fresh_left: Option<T>,
  fresh_right: Option<U>,
  ended: BothEnded,
  done: bool,
}

impl<T: Data> Stream<T> {
  /// Interleaves two same-typed parents into one child, in arrival order.
  /// The child terminates once both parents have terminated, with the later
  /// parent's reason.
  pub fn merge(&self, other: &Stream<T>) -> Stream<T> {
    assert_shared_dispatcher(self, other);
    let child = self.sibling_child::<T>();
    let ended = Arc::new(Mutex::new(BothEnded::default()));

    for (parent, left_side) in [(self, true), (other, false)] {
      let ended = ended.clone();
      attach(
        &parent.core,
        &child.core,
        Box::new(move |_prior, event: &Event<T>, emit| match event {
          Event::Next(_) => emit.emit(Some(vec![event.clone()])),
          Event::Terminate(_) => {
            if lock(&ended).mark(left_side) {
              emit.emit(Some(vec![event.clone()]));
            }
          }
        }),
      );
    }
    child
  }

  /// Interleaves two differently typed parents as an [`Either`] stream.
  pub fn merge_either<U: Data>(&self, other: &Stream<U>) -> Stream<Either<T, U>> {
    assert_shared_dispatcher(self, other);
    let child = self.sibling_child::<Either<T, U>>();
    let ended = Arc::new(Mutex::new(BothEnded::default()));

    {
      let ended = ended.clone();
      attach(
        &self.core,
        &child.core,
        Box::new(move |_prior, event: &Event<T>, emit| match event {
          Event::Next(value) => {
            emit.emit(Some(vec![Event::Next(Either::Left(value.clone()))]));
          }
          Event::Terminate(reason) => {
            if lock(&ended).mark(true) {
              emit.emit(Some(vec![Event::Terminate(reason.clone())]));
            }
          }
        }),
      );
    }
    attach(
      &other.core,
      &child.core,
      Box::new(move |_prior, event: &Event<U>, emit| match event {
        Event::Next(value) => {
          emit.emit(Some(vec![Event::Next(Either::Right(value.clone()))]));
        }
        Event::Terminate(reason) => {
          if lock(&ended).mark(false) {
            emit.emit(Some(vec![Event::Terminate(reason.clone())]));
          }
        }
      }),
    );
    child
  }

  /// Pairs the two parents by index. Buffers are unbounded unless `bound` is
  /// given, in which case the oldest value on the longer side is dropped on
  /// overflow. The child terminates once a terminated side's buffer drains.
  pub fn zip<U: Data>(&self, other: &Stream<U>, bound: Option<usize>) -> Stream<(T, U)> {
    assert_shared_dispatcher(self, other);
    let child = self.sibling_child::<(T, U)>();
    let state = Arc::new(Mutex::new(ZipSide::<T, U> {
      left: VecDeque::new(),
      right: VecDeque::new(),
      left_end: None,
      right_end: None,
      done: false,
    }));

    {
      let state = state.clone();
      attach(
        &self.core,
        &child.core,
        Box::new(move |_prior, event: &Event<T>, emit| {
          let (pair, end) = {
            let mut s = lock(&state);
            match event {
              Event::Next(value) => {
                s.left.push_back(value.clone());
                if let Some(bound) = bound {
                  while s.left.len() > bound {
                    s.left.pop_front();
                  }
                }
              }
              Event::Terminate(reason) => s.left_end = Some(reason.clone()),
            }
            let pair = s.pop_pair();
            (pair, s.drained_end())
          };
          let mut out = Vec::new();
          if let Some(pair) = pair {
            out.push(Event::Next(pair));
          }
          if let Some(reason) = end {
            out.push(Event::Terminate(reason));
          }
          emit.emit(Some(out));
        }),
      );
    }
    attach(
      &other.core,
      &child.core,
      Box::new(move |_prior, event: &Event<U>, emit| {
        let (pair, end) = {
          let mut s = lock(&state);
          match event {
            Event::Next(value) => {
              s.right.push_back(value.clone());
              if let Some(bound) = bound {
                while s.right.len() > bound {
                  s.right.pop_front();
                }
              }
            }
            Event::Terminate(reason) => s.right_end = Some(reason.clone()),
          }
          let pair = s.pop_pair();
          (pair, s.drained_end())
        };
        let mut out = Vec::new();
        if let Some(pair) = pair {
          out.push(Event::Next(pair));
        }
        if let Some(reason) = end {
          out.push(Event::Terminate(reason));
        }
        emit.emit(Some(out));
      }),
    );
    child
  }

  /// Emits a tuple whenever either side produces. With `latest` true, the
  /// other side's most recent value is reused (nothing goes out until both
  /// have produced once). With `latest` false, values pair one-for-one in
  /// arrival order and an unconsumed value is overwritten by a newer one.
  /// Terminates once both parents have.
  pub fn combine<U: Data>(&self, other: &Stream<U>, latest: bool) -> Stream<(T, U)> {
    assert_shared_dispatcher(self, other);
    let child = self.sibling_child::<(T, U)>();
    let state = Arc::new(Mutex::new(CombineSlots::<T, U> {
      last_left: None,
      last_right: None,
      fresh_left: None,
      fresh_right: None,
      ended: BothEnded::default(),
      done: false,
    }));

    {
      let state = state.clone();
      attach(
        &self.core,
        &child.core,
        Box::new(move |_prior, event: &Event<T>, emit| match event {
          Event::Next(value) => {
            let pair = {
              let mut s = lock(&state);
              if latest {
                s.last_left = Some(value.clone());
                s.last_right.clone().map(|r| (value.clone(), r))
              } else {
                match s.fresh_right.take() {
                  Some(r) => Some((value.clone(), r)),
                  None => {
                    s.fresh_left = Some(value.clone());
                    None
                  }
                }
              }
            };
            if let Some(pair) = pair {
              emit.emit(Some(vec![Event::Next(pair)]));
            }
          }
          Event::Terminate(reason) => {
            let finished = {
              let mut s = lock(&state);
              !s.done && s.ended.mark(true) && {
                s.done = true;
                true
              }
            };
            if finished {
              emit.emit(Some(vec![Event::Terminate(reason.clone())]));
            }
          }
        }),
      );
    }
    attach(
      &other.core,
      &child.core,
      Box::new(move |_prior, event: &Event<U>, emit| match event {
        Event::Next(value) => {
          let pair = {
            let mut s = lock(&state);
            if latest {
              s.last_right = Some(value.clone());
              s.last_left.clone().map(|l| (l, value.clone()))
            } else {
              match s.fresh_left.take() {
                Some(l) => Some((l, value.clone())),
                None => {
                  s.fresh_right = Some(value.clone());
                  None
                }
              }
            }
          };
          if let Some(pair) = pair {
            emit.emit(Some(vec![Event::Next(pair)]));
          }
        }
        Event::Terminate(reason) => {
          let finished = {
            let mut s = lock(&state);
            !s.done && s.ended.mark(false) && {
              s.done = true;
              true
            }
          };
          if finished {
            emit.emit(Some(vec![Event::Terminate(reason.clone())]));
          }
        }
      }),
    );
    child
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::dispatch::Dispatcher;
  use crate::event::Termination;
  use crate::hot::HotInput;
  use crate::stream::{Data, Stream};
  use crate::support::Either;
  use std::sync::{Arc, Mutex};

  fn pair_on_one_dispatcher() -> (HotInput<i32>, HotInput<i32>) {
    let dispatcher = Dispatcher::calling_thread();
    (
      HotInput::with_dispatcher(dispatcher.clone()),
      HotInput::with_dispatcher(dispatcher),
    )
  }

  fn collect<T: Data>(stream: &Stream<T>) -> Arc<Mutex<Vec<T>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _ = stream.on(move |v| sink.lock().unwrap().push(v.clone()));
    seen
  }

  #[test]
  fn merge_interleaves_in_arrival_order() {
    let (a, b) = pair_on_one_dispatcher();
    let merged = a.stream().merge(b.stream());
    let seen = collect(&merged);

    a.push(1);
    b.push(10);
    a.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![1, 10, 2]);
  }

  #[test]
  fn merge_terminates_only_after_both_parents() {
    let (a, b) = pair_on_one_dispatcher();
    let merged = a.stream().merge(b.stream());
    let seen = collect(&merged);

    a.terminate(Termination::Completed);
    assert!(merged.is_active());
    b.push(5);
    b.terminate(Termination::Completed);
    assert_eq!(*seen.lock().unwrap(), vec![5]);
    assert!(merged.is_terminated());
  }

  #[test]
  fn merge_either_tags_the_sides() {
    let dispatcher = Dispatcher::calling_thread();
    let numbers = HotInput::<i32>::with_dispatcher(dispatcher.clone());
    let names = HotInput::<&'static str>::with_dispatcher(dispatcher);
    let merged = numbers.stream().merge_either(names.stream());
    let seen = collect(&merged);

    numbers.push(1);
    names.push("one");
    assert_eq!(
      *seen.lock().unwrap(),
      vec![Either::Left(1), Either::Right("one")]
    );
  }

  #[test]
  fn zip_pairs_by_index() {
    let (a, b) = pair_on_one_dispatcher();
    let zipped = a.stream().zip(b.stream(), None);
    let seen = collect(&zipped);

    a.push(1);
    a.push(2);
    b.push(10);
    b.push(20);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 10), (2, 20)]);
  }

  #[test]
  fn zip_bound_drops_the_oldest_on_the_long_side() {
    let (a, b) = pair_on_one_dispatcher();
    let zipped = a.stream().zip(b.stream(), Some(2));
    let seen = collect(&zipped);

    for v in 1..=4 {
      a.push(v);
    }
    b.push(10);
    assert_eq!(*seen.lock().unwrap(), vec![(3, 10)]);
  }

  #[test]
  fn zip_terminates_once_a_drained_side_ended() {
    let (a, b) = pair_on_one_dispatcher();
    let zipped = a.stream().zip(b.stream(), None);
    let seen = collect(&zipped);

    a.push(1);
    a.terminate(Termination::Completed);
    assert!(zipped.is_active());
    b.push(10);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 10)]);
    assert!(zipped.is_terminated());
  }

  #[test]
  fn combine_latest_waits_for_both_then_reuses() {
    let (a, b) = pair_on_one_dispatcher();
    let combined = a.stream().combine(b.stream(), true);
    let seen = collect(&combined);

    a.push(1);
    assert!(seen.lock().unwrap().is_empty());
    b.push(10);
    a.push(2);
    assert_eq!(*seen.lock().unwrap(), vec![(1, 10), (2, 10)]);
  }

  #[test]
  fn combine_one_for_one_drops_unconsumed_excess() {
    let (a, b) = pair_on_one_dispatcher();
    let combined = a.stream().combine(b.stream(), false);
    let seen = collect(&combined);

    a.push(1);
    a.push(2);
    b.push(10);
    b.push(20);
    a.push(3);
    assert_eq!(*seen.lock().unwrap(), vec![(2, 10), (3, 20)]);
  }

  #[test]
  #[should_panic(expected = "share a dispatcher")]
  fn cross_dispatcher_merge_is_rejected() {
    let a = HotInput::<i32>::new();
    let b = HotInput::<i32>::new();
    let _ = a.stream().merge(b.stream());
  }
}
