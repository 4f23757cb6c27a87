//! Id generation behind an injectable seam.
//!
//! Cold requests and stream nodes are identified by UUIDs in production;
//! tests that want stable ids swap in [`SequenceIds`].

use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Source of fresh ids for requests and nodes.
pub trait IdGenerator: Send + Sync {
  fn next_id(&self) -> Uuid;
}

/// Random v4 UUIDs. The default generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
  fn next_id(&self) -> Uuid {
    Uuid::new_v4()
  }
}

/// Monotonically increasing ids, embedded in the UUID's low bits. Collisions
/// with v4 ids are not a concern inside a single test graph.
#[derive(Debug, Default)]
pub struct SequenceIds {
  next: AtomicU64,
}

impl SequenceIds {
  pub fn new() -> Self {
    Self::default()
  }
}

impl IdGenerator for SequenceIds {
  fn next_id(&self) -> Uuid {
    let n = self.next.fetch_add(1, Ordering::Relaxed);
    Uuid::from_u128(u128::from(n) + 1)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use uuid::Uuid;

  #[test]
  fn uuid_ids_are_unique() {
    let ids = UuidIds;
    assert_ne!(ids.next_id(), ids.next_id());
  }

  #[test]
  fn sequence_ids_are_stable() {
    let ids = SequenceIds::new();
    let a = ids.next_id();
    let b = ids.next_id();
    assert_eq!(a, Uuid::from_u128(1));
    assert_eq!(b, Uuid::from_u128(2));
  }
}
