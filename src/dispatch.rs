//! The serialized executor every graph runs on.
//!
//! All mutations of one stream graph funnel through a single [`Dispatcher`].
//! Two flavors exist:
//!
//! - `calling_thread()`: a trampoline queue drained on whichever thread
//!   posted first. Re-entrant posts (an operator scheduling follow-up work
//!   mid-delivery) enqueue instead of recursing, so delivery order stays FIFO
//!   and locks are never re-entered. Deterministic; the default.
//! - `background()`: an unbounded channel drained by a spawned tokio task,
//!   for graphs that should process off the pushing thread. Requires an
//!   ambient tokio runtime at construction.
//!
//! `after` schedules through tokio when a runtime is available and falls back
//! to a helper thread otherwise, so delay-style operators also work on plain
//! threads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

enum Flavor {
  CallingThread { queue: Mutex<Trampoline> },
  Background { tx: mpsc::UnboundedSender<Job> },
}

struct Trampoline {
  jobs: VecDeque<Job>,
  draining: bool,
}

/// Handle to a serialized job queue. Cheap to clone; clones share the queue.
#[derive(Clone)]
pub struct Dispatcher {
  flavor: Arc<Flavor>,
}

impl Dispatcher {
  /// Trampoline dispatcher: jobs run on the posting thread, re-entrant posts
  /// queue behind the job in flight.
  pub fn calling_thread() -> Self {
    Self {
      flavor: Arc::new(Flavor::CallingThread {
        queue: Mutex::new(Trampoline {
          jobs: VecDeque::new(),
          draining: false,
        }),
      }),
    }
  }

  /// Channel dispatcher drained by a spawned tokio task. Must be created
  /// inside a tokio runtime.
  pub fn background() -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    tokio::spawn(async move {
      while let Some(job) = rx.recv().await {
        job();
      }
    });
    Self {
      flavor: Arc::new(Flavor::Background { tx }),
    }
  }

  /// Runs `f` on the queue, after everything already posted.
  pub fn execute(&self, f: impl FnOnce() + Send + 'static) {
    match &*self.flavor {
      Flavor::Background { tx } => {
        if tx.send(Box::new(f)).is_err() {
          trace!("dispatcher drain task gone; job dropped");
        }
      }
      Flavor::CallingThread { queue } => {
        let drain_here = {
          let mut q = queue.lock().unwrap_or_else(|e| e.into_inner());
          q.jobs.push_back(Box::new(f));
          if q.draining {
            false
          } else {
            q.draining = true;
            true
          }
        };
        if drain_here {
          loop {
            let job = {
              let mut q = queue.lock().unwrap_or_else(|e| e.into_inner());
              match q.jobs.pop_front() {
                Some(job) => job,
                None => {
                  q.draining = false;
                  break;
                }
              }
            };
            job();
          }
        }
      }
    }
  }

  /// Runs `f` on the queue once `delay` has elapsed.
  pub fn after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) {
    let this = self.clone();
    let post = move || this.execute(f);
    match tokio::runtime::Handle::try_current() {
      Ok(handle) => {
        handle.spawn(async move {
          tokio::time::sleep(delay).await;
          post();
        });
      }
      Err(_) => {
        std::thread::spawn(move || {
          std::thread::sleep(delay);
          post();
        });
      }
    }
  }

  /// Whether two handles share one queue. Cross-parent operators refuse to
  /// weld graphs running on different queues.
  pub fn same(a: &Dispatcher, b: &Dispatcher) -> bool {
    Arc::ptr_eq(&a.flavor, &b.flavor)
  }
}

impl std::fmt::Debug for Dispatcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match &*self.flavor {
      Flavor::CallingThread { .. } => "calling_thread",
      Flavor::Background { .. } => "background",
    };
    f.debug_struct("Dispatcher").field("flavor", &name).finish()
  }
}
