#![doc = include_str!("../README.md")]


pub mod adapters;
pub mod cold;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod future;
pub mod hot;
pub mod ident;
pub mod observe;
pub mod ops;
pub mod stream;
pub mod support;
pub mod time;
pub mod timer;

pub use cold::{Cold, Responder};
pub use dispatch::Dispatcher;
pub use error::{Delivery, StreamFault};
pub use event::{
  Event, EventKey, ReplayPolicy, RequestId, ShareMode, StreamId, StreamKind, StreamState,
  Termination,
};
pub use future::{Future, FutureCompletion, FutureInput};
pub use hot::HotInput;
pub use ident::{IdGenerator, SequenceIds, UuidIds};
pub use observe::StateWatch;
pub use ops::AsyncReply;
pub use stream::{Data, Emitter, Events, Stream};
pub use support::{CircularBuffer, Either};
pub use time::{Clock, ManualClock, SystemClock};
pub use timer::{ManualTimerDriver, Timer, TimerDriver, TimerToken, TokioTimerDriver};
