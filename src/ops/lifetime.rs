//! Operators that tie a stream's lifetime to an external object.

use crate::event::{Event, Termination};
use crate::stream::{Data, Stream};
use std::fmt;
use std::sync::{Arc, Weak};

impl<T: Data> Stream<T> {
  /// Holds `object` weakly and emits `(object, value)` pairs while it is
  /// alive. The first value that finds the object gone terminates the stream
  /// with the given reason.
  pub fn using<O>(&self, object: &Arc<O>, termination: Termination) -> Stream<(Arc<O>, T)>
  where
    O: Send + Sync + fmt::Debug + 'static,
  {
    let weak: Weak<O> = Arc::downgrade(object);
    self.transform(move |_prior, event, emit| match event {
      Event::Next(value) => match weak.upgrade() {
        Some(object) => emit.emit(Some(vec![Event::Next((object, value.clone()))])),
        None => emit.emit(Some(vec![Event::Terminate(termination.clone())])),
      },
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    })
  }

  /// Passes values through only while `object` is alive, then terminates
  /// with the given reason.
  pub fn life_of<O>(&self, object: &Arc<O>, termination: Termination) -> Stream<T>
  where
    O: Send + Sync + fmt::Debug + 'static,
  {
    self.using(object, termination).map(|(_, value)| value)
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
  fn using_pairs_values_with_the_object() {
    let input = HotInput::<i32>::new();
    let owner = Arc::new("owner");
    let seen = collect(&input.stream().using(&owner, Termination::Cancelled).map(|(o, v)| (*o, v)));

    input.push(1);
    assert_eq!(*seen.lock().unwrap(), vec![("owner", 1)]);
  }

  #[test]
  fn life_of_terminates_once_the_object_is_gone() {
    let input = HotInput::<i32>::new();
    let owner = Arc::new(0u8);
    let scoped = input.stream().life_of(&owner, Termination::Cancelled);
    let seen = collect(&scoped);
    let ends = Arc::new(Mutex::new(Vec::new()));
    let sink = ends.clone();
    let _done = scoped.on_terminate(move |t| sink.lock().unwrap().push(t.clone()));

    input.push(1);
    drop(owner);
    input.push(2);
    input.push(3);

    assert_eq!(*seen.lock().unwrap(), vec![1]);
    assert_eq!(*ends.lock().unwrap(), vec![Termination::Cancelled]);
  }
}
