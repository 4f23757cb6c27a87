//! Bridges between the push graph and the ambient pull ecosystem.

use crate::event::Event;
use crate::stream::{Data, Stream};
use tokio_stream::wrappers::UnboundedReceiverStream;

impl<T: Data> Stream<T> {
  /// Exposes this node as a pull stream. Values arriving after the call are
  /// forwarded into an unbounded channel; the channel closes when the node
  /// terminates, ending the pull side. The bridge node passes traffic through
  /// unchanged, so it can sit mid-chain.
  pub fn subscribe(&self) -> impl futures::Stream<Item = T> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let mut sender = Some(tx);
    let _bridge: Stream<T> = self.transform(move |_prior, event, emit| {
      match event {
        Event::Next(value) => {
          if let Some(tx) = &sender {
            let _ = tx.send(value.clone());
          }
        }
        Event::Terminate(_) => {
          sender = None;
        }
      }
      emit.emit(Some(vec![event.clone()]));
    });
    UnboundedReceiverStream::new(rx)
  }
}

#[cfg(test)]
mod tests {
  use crate::event::Termination;
  use crate::hot::HotInput;
  use futures::StreamExt;

  #[tokio::test]
  async fn subscribe_sees_pushes_until_termination() {
    let input = HotInput::<i32>::new();
    let pulled = input.stream().subscribe();

    input.push(1);
    input.push(2);
    input.terminate(Termination::Completed);

    let collected: Vec<i32> = pulled.collect().await;
    assert_eq!(collected, vec![1, 2]);
  }

  #[tokio::test]
  async fn dropped_receiver_does_not_disturb_the_graph() {
    let input = HotInput::<i32>::new();
    let pulled = input.stream().subscribe();
    drop(pulled);

    input.push(1);
    assert!(input.stream().is_active());
  }
}
