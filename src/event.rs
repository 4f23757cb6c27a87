//! Event, key, and state taxonomy carried through the stream graph.
//!
//! Every edge in the graph transports [`Event`]s tagged with an [`EventKey`].
//! Values ride in `Event::Next`; end-of-stream rides in `Event::Terminate`
//! with a [`Termination`] reason. Keys distinguish broadcast traffic from the
//! request/response routing used by cold streams.

use crate::error::StreamFault;
use std::fmt;
use uuid::Uuid;

/// Identifier for one in-flight cold request.
pub type RequestId = Uuid;

/// Identifier for one stream node.
pub type StreamId = Uuid;

/// A single unit of traffic on an edge: a value or a terminal marker.
#[derive(Clone, Debug, PartialEq)]
pub enum Event<T> {
  /// A produced value.
  Next(T),
  /// End of stream with the reason it ended.
  Terminate(Termination),
}

impl<T> Event<T> {
  /// Returns the carried value, if this is a `Next`.
  pub fn value(&self) -> Option<&T> {
    match self {
      Event::Next(v) => Some(v),
      Event::Terminate(_) => None,
    }
  }

  /// Returns the termination reason, if this is a `Terminate`.
  pub fn termination(&self) -> Option<&Termination> {
    match self {
      Event::Next(_) => None,
      Event::Terminate(t) => Some(t),
    }
  }

  /// True iff this is a terminal event.
  pub fn is_terminal(&self) -> bool {
    matches!(self, Event::Terminate(_))
  }
}

/// Why a stream ended. Terminal and absorbing.
#[derive(Clone, Debug)]
pub enum Termination {
  /// Natural finish.
  Completed,
  /// Explicit external cancellation, or upstream pruning.
  Cancelled,
  /// Fatal abort with an attached failure.
  Error(StreamFault),
}

impl Termination {
  /// Returns the attached failure for `Error` terminations.
  pub fn fault(&self) -> Option<&StreamFault> {
    match self {
      Termination::Error(fault) => Some(fault),
      _ => None,
    }
  }
}

impl PartialEq for Termination {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Termination::Completed, Termination::Completed) => true,
      (Termination::Cancelled, Termination::Cancelled) => true,
      (Termination::Error(a), Termination::Error(b)) => a == b,
      _ => false,
    }
  }
}

impl fmt::Display for Termination {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Termination::Completed => write!(f, "completed"),
      Termination::Cancelled => write!(f, "cancelled"),
      Termination::Error(fault) => write!(f, "error: {}", fault),
    }
  }
}

/// Routing token delivered alongside each event.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKey {
  /// Broadcast: every attached child may process the event.
  Broadcast,
  /// Routes only to children that inserted the id into their expected-key set.
  Keyed(RequestId),
  /// Routes to all children, but originally carried an id (a cold node in
  /// shared mode rebroadcasts responses this way).
  Shared(RequestId),
}

impl EventKey {
  /// Returns the request id for keyed and shared keys.
  pub fn request_id(&self) -> Option<RequestId> {
    match self {
      EventKey::Broadcast => None,
      EventKey::Keyed(id) | EventKey::Shared(id) => Some(*id),
    }
  }
}

/// Lifecycle of a stream node. `Active ↔ Paused` is the only reversible
/// transition; `Terminated` absorbs everything after it.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamState {
  Active,
  Paused,
  Terminated(Termination),
}

impl StreamState {
  pub fn is_active(&self) -> bool {
    matches!(self, StreamState::Active)
  }

  pub fn is_paused(&self) -> bool {
    matches!(self, StreamState::Paused)
  }

  pub fn is_terminated(&self) -> bool {
    matches!(self, StreamState::Terminated(_))
  }

  /// Returns the termination reason once terminated.
  pub fn termination(&self) -> Option<&Termination> {
    match self {
      StreamState::Terminated(t) => Some(t),
      _ => None,
    }
  }
}

/// Behavioral category of a node; consulted by pruning and replay policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
  /// Broadcast source producing regardless of subscribers.
  Hot,
  /// Request/response node with keyed routing.
  Cold,
  /// At-most-one value, then completed; replays to late subscribers.
  Future,
  /// Plain derived node.
  Base,
}

impl fmt::Display for StreamKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StreamKind::Hot => write!(f, "hot"),
      StreamKind::Cold => write!(f, "cold"),
      StreamKind::Future => write!(f, "future"),
      StreamKind::Base => write!(f, "base"),
    }
  }
}

/// What newly attached children receive from the buffer, synchronously, before
/// any new event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayPolicy {
  /// Nothing is buffered.
  None,
  /// The n most recent values, plus the terminal event once there is one.
  Last(usize),
  /// Every value ever pushed.
  All,
}

/// Routing mode of a cold node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShareMode {
  /// Responses route only to the requesting branch. Default on cold roots.
  Keyed,
  /// Responses rebroadcast to every child.
  Shared,
  /// Forward the parent's routing verbatim. Default on cold-derived nodes.
  Inherit,
}
