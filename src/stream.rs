//! The stream node core: state machine, edge fan-out, replay, and pruning.
//!
//! A [`Stream`] is a cheap handle onto one node of the graph. Nodes hold their
//! children strongly (through edges) and their parents weakly, so a chain is
//! kept alive from the root down and pruning can release it from the leaves
//! up. Every operator in the crate is built on [`Stream::transform`]: an edge
//! operator `(prior, event, emit)` that may emit zero or more child events,
//! immediately or from a later dispatcher task.
//!
//! Delivery rules:
//!
//! - A terminated node silently rejects all further events.
//! - A paused node queues events (terminals included) and drains them in
//!   arrival order on `resume`.
//! - Terminal events always pass key admission; values are routed per the
//!   child's policy (broadcast for plain nodes, the share-mode table for cold
//!   nodes).
//! - Attaching a child replays the parent's buffer, before any new event;
//!   attaching to a terminated future replays on a later dispatcher tick.
//! - When a child terminates, each parent is notified through the dispatcher;
//!   a parent whose last edge disappears cancels itself unless persistent.
//!
//! Every entry into the graph (pushes, attaches, terminations, resumes) runs
//! as a dispatcher job; nested work queues behind the job in flight, so node
//! locks are only ever taken in parent-to-child order and never re-entered.

use crate::dispatch::Dispatcher;
use crate::event::{
  Event, EventKey, ReplayPolicy, RequestId, ShareMode, StreamId, StreamKind, StreamState,
  Termination,
};
use crate::observe::StateWatch;
use crate::support::{lock, CircularBuffer};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::watch;
use tracing::{debug, trace};
use uuid::Uuid;

/// Bound required of every payload type flowing through a graph. Blanket
/// implemented; never implement it by hand.
pub trait Data: Clone + Send + Sync + fmt::Debug + 'static {}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> Data for T {}

/// Zero or more events produced by one operator invocation. `None` and
/// `Some(vec![])` both suppress.
pub type Events<T> = Option<Vec<Event<T>>>;

/// Boxed edge operator: sees the previous parent value on this edge, the
/// incoming event, and an emitter bound to the child.
pub(crate) type EdgeOp<I, O> = Box<dyn FnMut(Option<&I>, &Event<I>, Emitter<O>) + Send>;

/// Hands operator output to a child node.
///
/// Holds the child weakly, so an emitter captured into a later dispatcher
/// task (async map, delay) silently drops its output once the child is gone
/// or terminated.
pub struct Emitter<T: Data> {
  target: Weak<StreamCore<T>>,
  key: EventKey,
}

impl<T: Data> Clone for Emitter<T> {
  fn clone(&self) -> Self {
    Self {
      target: self.target.clone(),
      key: self.key.clone(),
    }
  }
}

impl<T: Data> Emitter<T> {
  /// Delivers `events` to the child under this emitter's routing key.
  pub fn emit(&self, events: Events<T>) {
    let Some(events) = events else { return };
    let Some(core) = self.target.upgrade() else {
      return;
    };
    for event in events {
      core.push(event, self.key.clone());
    }
  }

  /// The routing key this emitter delivers under.
  pub fn key(&self) -> &EventKey {
    &self.key
  }
}

/// Routing policy applied when a node admits an incoming value.
pub(crate) enum RoutePolicy {
  /// Plain node: broadcast and shared traffic pass; keyed traffic belongs to
  /// a request path this node is not on, so it is dropped.
  Open,
  /// Cold node: the share-mode table decides, consuming matched ids.
  Cold {
    mode: ShareMode,
    keys: HashSet<RequestId>,
  },
}

impl RoutePolicy {
  pub(crate) fn cold(mode: ShareMode) -> Self {
    RoutePolicy::Cold {
      mode,
      keys: HashSet::new(),
    }
  }
}

/// One registered downstream processor: the child plus the edge operator and
/// the per-edge snapshot of the last parent value.
struct Edge<T: Data> {
  child_id: StreamId,
  process: Box<dyn FnMut(&Event<T>, &EventKey) + Send>,
}

fn make_edge<I: Data, O: Data>(child: Arc<StreamCore<O>>, mut op: EdgeOp<I, O>) -> Edge<I> {
  let child_id = child.id;
  let mut prior: Option<I> = None;
  Edge {
    child_id,
    process: Box::new(move |event, key| {
      let Some(out_key) = child.admit(event.is_terminal(), key) else {
        return;
      };
      let emitter = Emitter {
        target: Arc::downgrade(&child),
        key: out_key,
      };
      op(prior.as_ref(), event, emitter);
      if let Event::Next(value) = event {
        prior = Some(value.clone());
      }
    }),
  }
}

/// Bounded history of values for replay-on-attach.
struct ReplayBuffer<T: Data> {
  policy: ReplayPolicy,
  ring: CircularBuffer<(T, EventKey)>,
  all: Vec<(T, EventKey)>,
}

impl<T: Data> ReplayBuffer<T> {
  fn new(policy: ReplayPolicy) -> Self {
    let capacity = match policy {
      ReplayPolicy::Last(n) => n,
      _ => 0,
    };
    Self {
      policy,
      ring: CircularBuffer::new(capacity),
      all: Vec::new(),
    }
  }

  fn record(&mut self, event: &Event<T>, key: &EventKey) {
    let Event::Next(value) = event else { return };
    match self.policy {
      ReplayPolicy::None => {}
      ReplayPolicy::Last(_) => {
        self.ring.push((value.clone(), key.clone()));
      }
      ReplayPolicy::All => self.all.push((value.clone(), key.clone())),
    }
  }

  fn snapshot(&self) -> Vec<(T, EventKey)> {
    match self.policy {
      ReplayPolicy::None => Vec::new(),
      ReplayPolicy::Last(_) => self.ring.to_vec(),
      ReplayPolicy::All => self.all.clone(),
    }
  }
}

/// Upstream pressure sink: how a terminating child reaches its parents
/// without knowing their payload type.
pub(crate) trait PruneSink: Send + Sync {
  fn child_terminated(&self, child: StreamId);
}

struct StreamInner<T: Data> {
  state: StreamState,
  downstream: Vec<Edge<T>>,
  parents: Vec<Weak<dyn PruneSink>>,
  replay: ReplayBuffer<T>,
  pending: VecDeque<(Event<T>, EventKey)>,
  route: RoutePolicy,
  persistent: bool,
  report_upstream: bool,
  on_terminate: Option<Box<dyn FnOnce(&Termination) + Send>>,
}

pub(crate) struct StreamCore<T: Data> {
  pub(crate) id: StreamId,
  pub(crate) kind: StreamKind,
  pub(crate) dispatcher: Dispatcher,
  state_tx: watch::Sender<StreamState>,
  inner: Mutex<StreamInner<T>>,
}

impl<T: Data> StreamCore<T> {
  fn new(
    kind: StreamKind,
    dispatcher: Dispatcher,
    route: RoutePolicy,
    persistent: bool,
    replay: ReplayPolicy,
  ) -> Arc<Self> {
    let (state_tx, _) = watch::channel(StreamState::Active);
    Arc::new(Self {
      id: Uuid::new_v4(),
      kind,
      dispatcher,
      state_tx,
      inner: Mutex::new(StreamInner {
        state: StreamState::Active,
        downstream: Vec::new(),
        parents: Vec::new(),
        replay: ReplayBuffer::new(replay),
        pending: VecDeque::new(),
        route,
        persistent,
        report_upstream: true,
        on_terminate: None,
      }),
    })
  }

  /// Post-admission delivery: transition on terminals, record for replay,
  /// fan out to every edge, and release everything once terminated. Must run
  /// inside a dispatcher job.
  pub(crate) fn push(&self, event: Event<T>, key: EventKey) {
    let mut hook: Option<Box<dyn FnOnce(&Termination) + Send>> = None;
    let mut prune_links: Vec<Weak<dyn PruneSink>> = Vec::new();
    let reason: Option<Termination>;
    {
      let mut inner = lock(&self.inner);
      match &inner.state {
        StreamState::Terminated(_) => return,
        StreamState::Paused => {
          inner.pending.push_back((event, key));
          return;
        }
        StreamState::Active => {}
      }
      if let Event::Terminate(t) = &event {
        inner.state = StreamState::Terminated(t.clone());
        self.state_tx.send_replace(inner.state.clone());
        if let RoutePolicy::Cold { keys, .. } = &mut inner.route {
          keys.clear();
        }
        hook = inner.on_terminate.take();
        if inner.report_upstream {
          prune_links = std::mem::take(&mut inner.parents);
        }
        reason = Some(t.clone());
        trace!(stream = %self.id, kind = %self.kind, reason = %t, "stream terminated");
      } else {
        reason = None;
      }
      inner.replay.record(&event, &key);
      for edge in inner.downstream.iter_mut() {
        (edge.process)(&event, &key);
      }
      if reason.is_some() {
        inner.downstream.clear();
        inner.pending.clear();
      }
    }
    let Some(reason) = reason else { return };
    if let Some(hook) = hook {
      hook(&reason);
    }
    let id = self.id;
    for link in prune_links {
      self.dispatcher.execute(move || {
        if let Some(parent) = link.upgrade() {
          parent.child_terminated(id);
        }
      });
    }
  }

  /// Key admission, run on the receiving side of an edge. Terminals always
  /// pass. Returns the key the node fans out with, or `None` to reject.
  fn admit(&self, terminal: bool, key: &EventKey) -> Option<EventKey> {
    let mut inner = lock(&self.inner);
    if inner.state.is_terminated() {
      return None;
    }
    if terminal {
      return Some(key.clone());
    }
    match &mut inner.route {
      RoutePolicy::Open => match key {
        EventKey::Keyed(_) => None,
        other => Some(other.clone()),
      },
      RoutePolicy::Cold { mode, keys } => match (key, *mode) {
        (EventKey::Broadcast, _) => Some(EventKey::Broadcast),
        (EventKey::Keyed(id), ShareMode::Keyed | ShareMode::Inherit) => {
          keys.remove(id).then(|| EventKey::Keyed(*id))
        }
        (EventKey::Shared(id), ShareMode::Keyed) => keys.remove(id).then(|| EventKey::Keyed(*id)),
        (EventKey::Keyed(id) | EventKey::Shared(id), ShareMode::Shared) => {
          keys.remove(id);
          Some(EventKey::Shared(*id))
        }
        (EventKey::Shared(id), ShareMode::Inherit) => {
          keys.remove(id);
          Some(EventKey::Shared(*id))
        }
      },
    }
  }

  pub(crate) fn state(&self) -> StreamState {
    lock(&self.inner).state.clone()
  }

  pub(crate) fn is_terminated(&self) -> bool {
    self.state().is_terminated()
  }

  pub(crate) fn state_watch(&self) -> StateWatch {
    StateWatch::new(self.state_tx.subscribe())
  }

  /// Registers a fresh expected key; requests route their responses back
  /// through nodes that hold the id.
  pub(crate) fn insert_key(&self, id: RequestId) {
    let mut inner = lock(&self.inner);
    if inner.state.is_terminated() {
      return;
    }
    if let RoutePolicy::Cold { keys, .. } = &mut inner.route {
      keys.insert(id);
    }
  }

  /// Root-side admission of a cold response: consumes the id and yields the
  /// outgoing key per share mode. Stale or unknown ids are dropped.
  pub(crate) fn take_response_key(&self, id: RequestId) -> Option<EventKey> {
    let mut inner = lock(&self.inner);
    if inner.state.is_terminated() {
      return None;
    }
    match &mut inner.route {
      RoutePolicy::Cold { mode, keys } => {
        if !keys.remove(&id) {
          return None;
        }
        match mode {
          ShareMode::Shared => Some(EventKey::Shared(id)),
          _ => Some(EventKey::Keyed(id)),
        }
      }
      RoutePolicy::Open => None,
    }
  }

  pub(crate) fn set_share_mode(&self, new_mode: ShareMode) {
    let mut inner = lock(&self.inner);
    if let RoutePolicy::Cold { mode, .. } = &mut inner.route {
      *mode = new_mode;
    }
  }

  /// Installs the variant cleanup hook (timer cancellation and friends). If
  /// the node already terminated the hook runs immediately.
  pub(crate) fn set_on_terminate(&self, hook: Box<dyn FnOnce(&Termination) + Send>) {
    let mut inner = lock(&self.inner);
    if let Some(reason) = inner.state.termination().cloned() {
      drop(inner);
      hook(&reason);
      return;
    }
    inner.on_terminate = Some(hook);
  }
}

impl<T: Data> PruneSink for StreamCore<T> {
  fn child_terminated(&self, child: StreamId) {
    let prune = {
      let mut inner = lock(&self.inner);
      let before = inner.downstream.len();
      inner.downstream.retain(|edge| edge.child_id != child);
      if inner.downstream.len() == before {
        return;
      }
      debug!(stream = %self.id, %child, remaining = inner.downstream.len(), "edge pruned");
      inner.downstream.is_empty() && !inner.persistent && inner.state.is_active()
    };
    if prune {
      self.push(
        Event::Terminate(Termination::Cancelled),
        EventKey::Broadcast,
      );
    }
  }
}

/// Registers `child` as a downstream processor of `parent`. The registration
/// runs as a dispatcher job: the buffer replays through the new edge before
/// any event posted after this call. Dispatcher mismatches are rejected here.
pub(crate) fn attach<I: Data, O: Data>(
  parent: &Arc<StreamCore<I>>,
  child: &Arc<StreamCore<O>>,
  op: EdgeOp<I, O>,
) {
  assert!(
    Dispatcher::same(&parent.dispatcher, &child.dispatcher),
    "attached streams must share a dispatcher"
  );
  let parent = parent.clone();
  let child = child.clone();
  let dispatcher = parent.dispatcher.clone();
  dispatcher.execute(move || {
    {
      let parent_sink: Arc<dyn PruneSink> = parent.clone();
      let mut child_inner = lock(&child.inner);
      child_inner.parents.push(Arc::downgrade(&parent_sink));
    }
    let mut edge = make_edge(child, op);
    let ended = {
      let mut inner = lock(&parent.inner);
      match inner.state.termination().cloned() {
        Some(reason) => (inner.replay.snapshot(), reason),
        None => {
          for (value, key) in inner.replay.snapshot() {
            (edge.process)(&Event::Next(value), &key);
          }
          inner.downstream.push(edge);
          return;
        }
      }
    };
    // Parent already over: hand the new child what the buffer holds, then
    // the terminal. Futures do this on a later dispatcher tick (the
    // auto-replay observed by late subscribers); everything else delivers in
    // place.
    let (buffered, reason) = ended;
    let deliver = move || {
      let mut edge = edge;
      for (value, key) in buffered {
        (edge.process)(&Event::Next(value), &key);
      }
      (edge.process)(&Event::Terminate(reason), &EventKey::Broadcast);
    };
    if parent.kind == StreamKind::Future {
      parent.dispatcher.execute(move || deliver());
    } else {
      deliver();
    }
  });
}

/// Handle onto one node of a stream graph. Clones share the node.
pub struct Stream<T: Data> {
  pub(crate) core: Arc<StreamCore<T>>,
}

impl<T: Data> Clone for Stream<T> {
  fn clone(&self) -> Self {
    Self {
      core: self.core.clone(),
    }
  }
}

impl<T: Data> fmt::Debug for Stream<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Stream")
      .field("id", &self.core.id)
      .field("kind", &self.core.kind)
      .field("state", &self.core.state())
      .finish()
  }
}

impl<T: Data> Stream<T> {
  pub(crate) fn source(
    kind: StreamKind,
    dispatcher: Dispatcher,
    route: RoutePolicy,
    persistent: bool,
    replay: ReplayPolicy,
  ) -> Self {
    Self {
      core: StreamCore::new(kind, dispatcher, route, persistent, replay),
    }
  }

  /// A bare hot broadcast node on its own calling-thread dispatcher. Usually
  /// reached through [`crate::HotInput`]; useful directly as a merge target
  /// or a test fixture.
  pub fn hot() -> Self {
    Self::hot_on(Dispatcher::calling_thread())
  }

  /// A bare hot node on the given dispatcher.
  pub fn hot_on(dispatcher: Dispatcher) -> Self {
    Self::source(
      StreamKind::Hot,
      dispatcher,
      RoutePolicy::Open,
      true,
      ReplayPolicy::None,
    )
  }

  pub fn id(&self) -> StreamId {
    self.core.id
  }

  pub fn kind(&self) -> StreamKind {
    self.core.kind
  }

  pub fn state(&self) -> StreamState {
    self.core.state()
  }

  pub fn is_active(&self) -> bool {
    self.state().is_active()
  }

  pub fn is_terminated(&self) -> bool {
    self.core.is_terminated()
  }

  /// A watch over this node's lifecycle.
  pub fn state_watch(&self) -> StateWatch {
    self.core.state_watch()
  }

  /// The serialized queue this node runs on.
  pub fn dispatcher(&self) -> Dispatcher {
    self.core.dispatcher.clone()
  }

  /// Ends the stream. Idempotent; routed through the dispatcher so it lands
  /// after everything already posted.
  pub fn terminate(&self, reason: Termination) {
    self.inject(Event::Terminate(reason));
  }

  /// Queues incoming events until `resume`.
  pub fn pause(&self) {
    let mut inner = lock(&self.core.inner);
    if inner.state.is_active() {
      inner.state = StreamState::Paused;
      self.core.state_tx.send_replace(StreamState::Paused);
      trace!(stream = %self.core.id, "stream paused");
    }
  }

  /// Drains everything queued while paused, in arrival order.
  pub fn resume(&self) {
    let core = self.core.clone();
    self.core.dispatcher.execute(move || {
      let drained = {
        let mut inner = lock(&core.inner);
        if !inner.state.is_paused() {
          return;
        }
        inner.state = StreamState::Active;
        core.state_tx.send_replace(StreamState::Active);
        std::mem::take(&mut inner.pending)
      };
      trace!(stream = %core.id, drained = drained.len(), "stream resumed");
      for (event, key) in drained {
        core.push(event, key);
      }
    });
  }

  /// Marks this node persistent: it stays alive when its last child
  /// terminates instead of cancelling itself.
  pub fn persist(&self) -> Stream<T> {
    lock(&self.core.inner).persistent = true;
    self.clone()
  }

  /// Changes what newly attached children receive. Discards anything the
  /// previous policy had buffered.
  pub fn set_replay(&self, policy: ReplayPolicy) {
    let mut inner = lock(&self.core.inner);
    inner.replay = ReplayBuffer::new(policy);
  }

  /// Re-emits the replay buffer to every currently attached child.
  pub fn replay(&self) {
    let core = self.core.clone();
    self.core.dispatcher.execute(move || {
      let mut inner = lock(&core.inner);
      let buffered = inner.replay.snapshot();
      for (value, key) in buffered {
        let event = Event::Next(value);
        for edge in inner.downstream.iter_mut() {
          (edge.process)(&event, &key);
        }
      }
    });
  }

  pub(crate) fn replay_policy(&self) -> ReplayPolicy {
    lock(&self.core.inner).replay.policy
  }

  /// The operator primitive: attaches a new downstream node whose traffic is
  /// produced by `op`. The child inherits this node's dispatcher and replay
  /// policy; cold parents produce cold children so request routing carries
  /// through derived branches.
  pub fn transform<O: Data>(
    &self,
    op: impl FnMut(Option<&T>, &Event<T>, Emitter<O>) + Send + 'static,
  ) -> Stream<O> {
    let (kind, route) = match self.core.kind {
      StreamKind::Cold => (StreamKind::Cold, RoutePolicy::cold(ShareMode::Inherit)),
      _ => (StreamKind::Base, RoutePolicy::Open),
    };
    let child = Stream::source(
      kind,
      self.core.dispatcher.clone(),
      route,
      false,
      self.replay_policy(),
    );
    attach(&self.core, &child.core, Box::new(op));
    child
  }

  /// A detached node ready to be welded onto several parents (merge, zip,
  /// combine). Inherits this node's dispatcher and replay policy.
  pub(crate) fn sibling_child<O: Data>(&self) -> Stream<O> {
    Stream::source(
      StreamKind::Base,
      self.core.dispatcher.clone(),
      RoutePolicy::Open,
      false,
      self.replay_policy(),
    )
  }

  /// Feeds an externally produced event into this node through the
  /// dispatcher.
  pub(crate) fn inject(&self, event: Event<T>) {
    let core = self.core.clone();
    self.core.dispatcher.execute(move || {
      core.push(event, EventKey::Broadcast);
    });
  }
}
