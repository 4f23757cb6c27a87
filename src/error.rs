//! Cloneable failure payloads for events and terminations.

use chrono::{DateTime, Utc};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Result type used at source boundaries: a producer reports a value or a
/// failure. On most streams a failure converts to an error termination when
/// emitted; cold streams keep failures non-terminating (they ride the `Err`
/// side of the branch's data type until an `on_error` converts one).
pub type Delivery<T> = Result<T, StreamFault>;

/// A type-erased failure that can travel inside events.
///
/// Events are cloned across edges and into replay buffers, so the underlying
/// error is reference-counted rather than boxed. The capture timestamp records
/// when the fault entered the graph.
#[derive(Clone)]
pub struct StreamFault {
  at: DateTime<Utc>,
  source: Arc<dyn Error + Send + Sync>,
}

impl StreamFault {
  /// Wraps a concrete error.
  pub fn new<E>(source: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    Self {
      at: Utc::now(),
      source: Arc::new(source),
    }
  }

  /// Builds a fault from a bare message.
  pub fn message(text: impl Into<String>) -> Self {
    Self::new(FaultMessage(text.into()))
  }

  /// Wraps an already shared error.
  pub fn shared(source: Arc<dyn Error + Send + Sync>) -> Self {
    Self {
      at: Utc::now(),
      source,
    }
  }

  /// When the fault was captured.
  pub fn at(&self) -> DateTime<Utc> {
    self.at
  }

  /// The underlying error.
  pub fn cause(&self) -> &(dyn Error + 'static) {
    self.source.as_ref()
  }
}

impl fmt::Display for StreamFault {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.source)
  }
}

impl fmt::Debug for StreamFault {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StreamFault")
      .field("at", &self.at)
      .field("source", &self.source)
      .finish()
  }
}

impl Error for StreamFault {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    Some(self.source.as_ref())
  }
}

// Equality by rendered text; the wrapped error itself is type-erased.
impl PartialEq for StreamFault {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.source, &other.source) || self.to_string() == other.to_string()
  }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct FaultMessage(String);
