//! State observation for tasks serving a stream.
//!
//! Every node mirrors its [`StreamState`] into a `tokio::sync::watch`
//! channel. Cold tasks receive a [`StateWatch`] so long-running work can
//! notice that the node it serves has terminated and stop early.

use crate::event::{StreamState, Termination};
use tokio::sync::watch;

/// Read-only view of one node's lifecycle.
#[derive(Clone)]
pub struct StateWatch {
  rx: watch::Receiver<StreamState>,
}

impl StateWatch {
  pub(crate) fn new(rx: watch::Receiver<StreamState>) -> Self {
    Self { rx }
  }

  /// The state at this moment.
  pub fn current(&self) -> StreamState {
    self.rx.borrow().clone()
  }

  pub fn is_active(&self) -> bool {
    self.current().is_active()
  }

  pub fn is_terminated(&self) -> bool {
    self.current().is_terminated()
  }

  /// Waits for the next state change. Returns `false` once the node is gone
  /// and no further changes can arrive.
  pub async fn changed(&mut self) -> bool {
    self.rx.changed().await.is_ok()
  }

  /// Waits until the node terminates and returns the reason. Returns the last
  /// observed termination immediately if it already happened; `None` if the
  /// node was dropped while still active.
  pub async fn terminated(&mut self) -> Option<Termination> {
    loop {
      if let StreamState::Terminated(reason) = &*self.rx.borrow() {
        return Some(reason.clone());
      }
      if self.rx.changed().await.is_err() {
        return self.rx.borrow().termination().cloned();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::event::{StreamState, Termination};
  use tokio::sync::watch;

  #[tokio::test]
  async fn watch_sees_transitions() {
    let (tx, rx) = watch::channel(StreamState::Active);
    let mut watch = StateWatch::new(rx);
    assert!(watch.is_active());

    tx.send(StreamState::Terminated(Termination::Completed))
      .unwrap();
    assert!(watch.changed().await);
    assert!(watch.is_terminated());
    assert_eq!(watch.terminated().await, Some(Termination::Completed));
  }

  #[tokio::test]
  async fn dropped_sender_ends_the_watch() {
    let (tx, rx) = watch::channel(StreamState::Active);
    let mut watch = StateWatch::new(rx);
    drop(tx);
    assert!(!watch.changed().await);
    assert_eq!(watch.terminated().await, None);
  }
}
