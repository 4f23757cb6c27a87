//! Two-sided sum type for merging differently typed parents.

use std::fmt;

/// One of two values. Produced by `merge_either` and used internally by the
/// combining operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Either<L, R> {
  Left(L),
  Right(R),
}

impl<L, R> Either<L, R> {
  pub fn is_left(&self) -> bool {
    matches!(self, Either::Left(_))
  }

  pub fn is_right(&self) -> bool {
    matches!(self, Either::Right(_))
  }

  pub fn left(self) -> Option<L> {
    match self {
      Either::Left(l) => Some(l),
      Either::Right(_) => None,
    }
  }

  pub fn right(self) -> Option<R> {
    match self {
      Either::Left(_) => None,
      Either::Right(r) => Some(r),
    }
  }

  pub fn map_left<T>(self, f: impl FnOnce(L) -> T) -> Either<T, R> {
    match self {
      Either::Left(l) => Either::Left(f(l)),
      Either::Right(r) => Either::Right(r),
    }
  }

  pub fn map_right<T>(self, f: impl FnOnce(R) -> T) -> Either<L, T> {
    match self {
      Either::Left(l) => Either::Left(l),
      Either::Right(r) => Either::Right(f(r)),
    }
  }

  /// Collapses both sides into one value.
  pub fn fold<T>(self, left: impl FnOnce(L) -> T, right: impl FnOnce(R) -> T) -> T {
    match self {
      Either::Left(l) => left(l),
      Either::Right(r) => right(r),
    }
  }
}

impl<L: fmt::Display, R: fmt::Display> fmt::Display for Either<L, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Either::Left(l) => write!(f, "{}", l),
      Either::Right(r) => write!(f, "{}", r),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sides_and_maps() {
    let l: Either<i32, &str> = Either::Left(2);
    assert!(l.is_left());
    assert_eq!(l.map_left(|v| v * 10), Either::Left(20));
    assert_eq!(l.left(), Some(2));

    let r: Either<i32, &str> = Either::Right("hi");
    assert!(r.is_right());
    assert_eq!(r.map_right(str::len), Either::Right(2));
    assert_eq!(r.fold(|v| v as usize, str::len), 2);
  }
}
