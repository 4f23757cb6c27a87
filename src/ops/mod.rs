//! The operator vocabulary, one family per module.
//!
//! Every operator is a thin shell over [`Stream::transform`]: it captures
//! whatever per-edge state it needs in the operator closure and emits zero or
//! more child events per incoming event. Operators that defer their emission
//! (async map, delay) clone the emitter into a later dispatcher task; the
//! emitter checks the child's state at delivery time.
//!
//! [`Stream::transform`]: crate::Stream::transform

mod buffer;
mod combine;
mod delay;
mod filter;
mod lifetime;
mod limit;
mod map;
mod math;
mod prefix;
mod stamp;
mod tap;

pub use map::AsyncReply;
