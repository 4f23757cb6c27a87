//! Cold streams: one response per explicit request, routed back to the
//! branch that asked.
//!
//! A cold root runs a task for every request. The request walks down from the
//! branch it was made on, inserting a fresh id into the expected-key set of
//! every node on the way to the root; the response then climbs back with a
//! keyed routing token that only those nodes admit. `share(true)` switches
//! the root to rebroadcast mode, where responses reach every child.
//!
//! Failures are non-terminating on cold branches: they travel as `Err`
//! deliveries through the same keyed route until an [`Cold::on_error`]
//! converts one into a termination (or nothing does, and consumers observe
//! them as failed deliveries).

use crate::dispatch::Dispatcher;
use crate::error::{Delivery, StreamFault};
use crate::event::{Event, ReplayPolicy, RequestId, ShareMode, StreamKind, Termination};
use crate::ident::{IdGenerator, UuidIds};
use crate::observe::StateWatch;
use crate::stream::{attach, Data, EdgeOp, RoutePolicy, Stream, StreamCore};
use crate::support::lock;
use std::sync::{Arc, Mutex, Weak};
use tracing::trace;

type RequestChain<Req> = Arc<dyn Fn(Req, RequestId) + Send + Sync>;

/// Single-use reply handle handed to a cold task.
///
/// `respond` consumes the handle; clones share one guard slot, so however the
/// task splits the work, only the first response per request is delivered.
pub struct Responder<Resp: Data> {
  slot: Arc<Mutex<Option<ResponderTarget<Resp>>>>,
}

struct ResponderTarget<Resp: Data> {
  core: Weak<StreamCore<Delivery<Resp>>>,
  id: RequestId,
}

impl<Resp: Data> Clone for Responder<Resp> {
  fn clone(&self) -> Self {
    Self {
      slot: self.slot.clone(),
    }
  }
}

impl<Resp: Data> Responder<Resp> {
  fn new(core: Weak<StreamCore<Delivery<Resp>>>, id: RequestId) -> Self {
    Self {
      slot: Arc::new(Mutex::new(Some(ResponderTarget { core, id }))),
    }
  }

  /// Delivers the response for this request. At most one response per
  /// request is accepted; the rest are dropped.
  pub fn respond(self, result: Delivery<Resp>) {
    let Some(target) = lock(&self.slot).take() else {
      trace!("duplicate cold response ignored");
      return;
    };
    let Some(core) = target.core.upgrade() else {
      return;
    };
    let id = target.id;
    let dispatcher = core.dispatcher.clone();
    dispatcher.execute(move || {
      let Some(key) = core.take_response_key(id) else {
        trace!(request = %id, "cold response for unknown request dropped");
        return;
      };
      core.push(Event::Next(result), key);
    });
  }

  pub fn respond_value(self, value: Resp) {
    self.respond(Ok(value));
  }

  pub fn respond_error(self, fault: StreamFault) {
    self.respond(Err(fault));
  }
}

/// A request/response stream. `Req` flows up to the task, `Resp` deliveries
/// flow back down the requesting branch.
pub struct Cold<Req, Resp>
where
  Req: Send + 'static,
  Resp: Data,
{
  stream: Stream<Delivery<Resp>>,
  chain: RequestChain<Req>,
  ids: Arc<dyn IdGenerator>,
}

impl<Req, Resp> Clone for Cold<Req, Resp>
where
  Req: Send + 'static,
  Resp: Data,
{
  fn clone(&self) -> Self {
    Self {
      stream: self.stream.clone(),
      chain: self.chain.clone(),
      ids: self.ids.clone(),
    }
  }
}

impl<Req, Resp> Cold<Req, Resp>
where
  Req: Send + 'static,
  Resp: Data,
{
  /// A cold root on its own calling-thread dispatcher.
  pub fn new(task: impl Fn(StateWatch, Req, Responder<Resp>) + Send + Sync + 'static) -> Self {
    Self::with_dispatcher(Dispatcher::calling_thread(), task)
  }

  /// A cold root on the given dispatcher.
  pub fn with_dispatcher(
    dispatcher: Dispatcher,
    task: impl Fn(StateWatch, Req, Responder<Resp>) + Send + Sync + 'static,
  ) -> Self {
    Self::with_id_generator(dispatcher, Arc::new(UuidIds), task)
  }

  /// Full-control constructor; tests inject a sequence generator here.
  pub fn with_id_generator(
    dispatcher: Dispatcher,
    ids: Arc<dyn IdGenerator>,
    task: impl Fn(StateWatch, Req, Responder<Resp>) + Send + Sync + 'static,
  ) -> Self {
    let stream = Stream::<Delivery<Resp>>::source(
      StreamKind::Cold,
      dispatcher,
      RoutePolicy::cold(ShareMode::Keyed),
      false,
      ReplayPolicy::None,
    );
    let core = stream.core.clone();
    let task = Arc::new(task);
    let chain: RequestChain<Req> = Arc::new(move |req, id| {
      if core.is_terminated() {
        return;
      }
      core.insert_key(id);
      let watch = core.state_watch();
      let responder = Responder::new(Arc::downgrade(&core), id);
      let task = task.clone();
      trace!(request = %id, "cold request dispatched");
      core.dispatcher.execute(move || task(watch, req, responder));
    });
    Self { stream, chain, ids }
  }

  /// Issues a request. The task runs on the dispatcher; its response routes
  /// back through this branch only (unless the root is shared).
  pub fn request(&self, req: Req) {
    let id = self.ids.next_id();
    (self.chain)(req, id);
  }

  /// Switches the root of this node between rebroadcast (`true`) and
  /// branch-keyed (`false`) response routing.
  pub fn share(&self, shared: bool) {
    self.stream.core.set_share_mode(if shared {
      ShareMode::Shared
    } else {
      ShareMode::Keyed
    });
  }

  /// Ends the stream; in-flight request ids are forgotten.
  pub fn terminate(&self, reason: Termination) {
    self.stream.terminate(reason);
  }

  pub fn is_active(&self) -> bool {
    self.stream.is_active()
  }

  pub fn is_terminated(&self) -> bool {
    self.stream.is_terminated()
  }

  pub fn state_watch(&self) -> StateWatch {
    self.stream.state_watch()
  }

  /// The raw delivery stream backing this node, for the full operator
  /// vocabulary. Children attached here are not on any request path, so with
  /// a keyed root they only observe shared and broadcast traffic.
  pub fn responses(&self) -> Stream<Delivery<Resp>> {
    self.stream.clone()
  }

  /// Attaches a derived cold node and extends the request chain through it.
  fn derive<U: Data>(&self, op: EdgeOp<Delivery<Resp>, Delivery<U>>) -> Cold<Req, U> {
    let node = self.derive_node(op);
    let core = node.core.clone();
    let parent_chain = self.chain.clone();
    let chain: RequestChain<Req> = Arc::new(move |req, id| {
      if core.is_terminated() {
        return;
      }
      core.insert_key(id);
      parent_chain(req, id);
    });
    Cold {
      stream: node,
      chain,
      ids: self.ids.clone(),
    }
  }

  fn derive_node<U: Data>(&self, op: EdgeOp<Delivery<Resp>, Delivery<U>>) -> Stream<Delivery<U>> {
    let node = Stream::source(
      StreamKind::Cold,
      self.stream.dispatcher(),
      RoutePolicy::cold(ShareMode::Inherit),
      false,
      self.stream.replay_policy(),
    );
    attach(&self.stream.core, &node.core, op);
    node
  }

  /// A requestable view that accepts `U`, forwarding `f(u)` to this node.
  pub fn map_request<U>(&self, f: impl Fn(U) -> Req + Send + Sync + 'static) -> Cold<U, Resp>
  where
    U: Send + 'static,
  {
    let node = self.derive_node(Box::new(
      |_prior, event: &Event<Delivery<Resp>>, emit| {
        emit.emit(Some(vec![event.clone()]));
      },
    ));
    let core = node.core.clone();
    let parent_chain = self.chain.clone();
    let chain: RequestChain<U> = Arc::new(move |req, id| {
      if core.is_terminated() {
        return;
      }
      core.insert_key(id);
      parent_chain(f(req), id);
    });
    Cold {
      stream: node,
      chain,
      ids: self.ids.clone(),
    }
  }

  /// Maps successful responses; failures and terminals pass through.
  pub fn map<U: Data>(&self, mut f: impl FnMut(Resp) -> U + Send + 'static) -> Cold<Req, U> {
    self.derive(Box::new(move |_prior, event, emit| match event {
      Event::Next(Ok(value)) => emit.emit(Some(vec![Event::Next(Ok(f(value.clone())))])),
      Event::Next(Err(fault)) => emit.emit(Some(vec![Event::Next(Err(fault.clone()))])),
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    }))
  }

  /// Maps successful responses through a fallible function; a failure stays a
  /// non-terminating failed delivery, like any other cold error.
  pub fn try_map<U: Data>(
    &self,
    mut f: impl FnMut(Resp) -> Delivery<U> + Send + 'static,
  ) -> Cold<Req, U> {
    self.derive(Box::new(move |_prior, event, emit| match event {
      Event::Next(Ok(value)) => emit.emit(Some(vec![Event::Next(f(value.clone()))])),
      Event::Next(Err(fault)) => emit.emit(Some(vec![Event::Next(Err(fault.clone()))])),
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    }))
  }

  /// Keeps successful responses matching the predicate; failures pass.
  pub fn filter(&self, mut pred: impl FnMut(&Resp) -> bool + Send + 'static) -> Cold<Req, Resp> {
    self.derive(Box::new(move |_prior, event, emit| match event {
      Event::Next(Ok(value)) => {
        if pred(value) {
          emit.emit(Some(vec![event.clone()]));
        }
      }
      other => emit.emit(Some(vec![other.clone()])),
    }))
  }

  /// Expands each successful response into zero or more values.
  pub fn flat_map<U: Data, I>(&self, mut f: impl FnMut(Resp) -> I + Send + 'static) -> Cold<Req, U>
  where
    I: IntoIterator<Item = U>,
  {
    self.derive(Box::new(move |_prior, event, emit| match event {
      Event::Next(Ok(value)) => {
        let out: Vec<Event<Delivery<U>>> = f(value.clone())
          .into_iter()
          .map(|u| Event::Next(Ok(u)))
          .collect();
        emit.emit(Some(out));
      }
      Event::Next(Err(fault)) => emit.emit(Some(vec![Event::Next(Err(fault.clone()))])),
      Event::Terminate(t) => emit.emit(Some(vec![Event::Terminate(t.clone())])),
    }))
  }

  /// Observes successful responses; everything passes through unchanged.
  pub fn on(&self, mut handler: impl FnMut(&Resp) + Send + 'static) -> Cold<Req, Resp> {
    self.derive(Box::new(move |_prior, event, emit| {
      if let Event::Next(Ok(value)) = event {
        handler(value);
      }
      emit.emit(Some(vec![event.clone()]));
    }))
  }

  /// Observes every event on this branch, failures included.
  pub fn on_event(
    &self,
    mut handler: impl FnMut(&Event<Delivery<Resp>>) + Send + 'static,
  ) -> Cold<Req, Resp> {
    self.derive(Box::new(move |_prior, event, emit| {
      handler(event);
      emit.emit(Some(vec![event.clone()]));
    }))
  }

  /// Observes termination of this branch.
  pub fn on_terminate(
    &self,
    mut handler: impl FnMut(&Termination) + Send + 'static,
  ) -> Cold<Req, Resp> {
    self.derive(Box::new(move |_prior, event, emit| {
      if let Event::Terminate(reason) = event {
        handler(reason);
      }
      emit.emit(Some(vec![event.clone()]));
    }))
  }

  /// Inspects failed deliveries. Returning a termination ends the branch;
  /// returning `None` lets the failure continue downstream, branch active.
  pub fn on_error(
    &self,
    mut handler: impl FnMut(&StreamFault) -> Option<Termination> + Send + 'static,
  ) -> Cold<Req, Resp> {
    self.derive(Box::new(move |_prior, event, emit| match event {
      Event::Next(Err(fault)) => match handler(fault) {
        Some(reason) => emit.emit(Some(vec![Event::Terminate(reason)])),
        None => emit.emit(Some(vec![event.clone()])),
      },
      other => emit.emit(Some(vec![other.clone()])),
    }))
  }
}
