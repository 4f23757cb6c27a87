//! End-to-end graph scenarios across sources, operators, and sinks.

use signalweave::{Cold, Future, FutureInput, HotInput, Responder, Termination, Timer};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn sink<T: Clone + Send + Sync + std::fmt::Debug + 'static>(
) -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send + 'static) {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let writer = seen.clone();
  (seen, move |v: &T| writer.lock().unwrap().push(v.clone()))
}

#[test]
fn hot_filter_count_chain() {
  let input = HotInput::<i32>::new();
  let (counts, tap) = sink();
  let _chain = input
    .stream()
    .filter(|v| v % 2 == 0)
    .count()
    .on(tap);

  for v in 1..=5 {
    input.push(v);
  }
  assert_eq!(*counts.lock().unwrap(), vec![1, 2]);
}

#[test]
fn future_ignores_the_second_completion() {
  let input = FutureInput::<i32>::new();
  let (values, value_tap) = sink();
  let (ends, end_tap) = sink();
  let tapped = input.stream().on(value_tap);
  let _done = tapped.on_terminate(end_tap);

  input.complete_value(0);
  input.complete_value(1);

  assert_eq!(*values.lock().unwrap(), vec![0]);
  assert_eq!(*ends.lock().unwrap(), vec![Termination::Completed]);
}

#[test]
fn precompleted_future_replays_to_every_late_subscriber() {
  let future = Future::completed(10);
  let (a, a_tap) = sink();
  let (b, b_tap) = sink();
  let _a = future.stream().on(a_tap);
  let _b = future.stream().on(b_tap);

  assert_eq!(*a.lock().unwrap(), vec![10]);
  assert_eq!(*b.lock().unwrap(), vec![10]);
}

#[tokio::test]
async fn timer_counts_ticks_until_terminated() {
  let timer = Timer::new(Duration::from_millis(100));
  let (counts, tap) = sink();
  let _chain = timer.counter().on(tap);

  timer.start();
  tokio::time::sleep(Duration::from_millis(150)).await;
  assert_eq!(counts.lock().unwrap().last().copied(), Some(1));

  tokio::time::sleep(Duration::from_millis(100)).await;
  assert_eq!(counts.lock().unwrap().last().copied(), Some(2));

  timer.terminate(Termination::Cancelled);
  tokio::time::sleep(Duration::from_millis(120)).await;
  assert_eq!(counts.lock().unwrap().last().copied(), Some(2));
  assert!(!timer.is_active());
  assert!(!timer.is_timer_active());
}

#[tokio::test]
async fn repeated_starts_do_not_stack_schedules() {
  let timer = Timer::new(Duration::from_millis(100));
  let (counts, tap) = sink();
  let _chain = timer.counter().on(tap);

  for _ in 0..4 {
    timer.start();
  }
  tokio::time::sleep(Duration::from_millis(150)).await;
  let fired = counts.lock().unwrap().len();
  assert!(fired < 5, "expected a single schedule, saw {fired} ticks");
  timer.terminate(Termination::Cancelled);
}

fn doubling_cold() -> Cold<i32, i32> {
  Cold::new(|_state, request: i32, reply: Responder<i32>| {
    reply.respond_value(request * 2);
  })
}

#[test]
fn cold_responses_stay_on_the_requesting_branch() {
  let cold = doubling_cold();
  let (a_seen, a_tap) = sink();
  let (b_seen, b_tap) = sink();
  let branch_a = cold.map(|v| v + 1).on(a_tap);
  let _branch_b = cold.map(|v| v + 10).on(b_tap);

  branch_a.request(3);

  assert_eq!(*a_seen.lock().unwrap(), vec![7]);
  assert!(b_seen.lock().unwrap().is_empty());
}

#[test]
fn shared_cold_rebroadcasts_to_every_branch() {
  let cold = doubling_cold();
  let (a_seen, a_tap) = sink();
  let (b_seen, b_tap) = sink();
  let branch_a = cold.map(|v| v + 1).on(a_tap);
  let _branch_b = cold.map(|v| v + 10).on(b_tap);

  cold.share(true);
  branch_a.request(3);

  assert_eq!(*a_seen.lock().unwrap(), vec![7]);
  assert_eq!(*b_seen.lock().unwrap(), vec![16]);
}

#[test]
fn terminating_operators_report_their_reason_downstream() {
  let input = HotInput::<i32>::new();
  let (ends, end_tap) = sink();
  let _chain = input
    .stream()
    .do_while(|v| *v < 3, Termination::Completed)
    .on_terminate(end_tap);

  for v in 1..=5 {
    input.push(v);
  }
  assert_eq!(*ends.lock().unwrap(), vec![Termination::Completed]);
  assert!(input.stream().is_active());
}

#[test]
fn buffer_partitions_the_whole_stream() {
  let input = HotInput::<i32>::new();
  let (chunks, tap) = sink();
  let _chain = input.stream().buffer(3, false).on(tap);

  for v in 1..=7 {
    input.push(v);
  }
  input.terminate(Termination::Completed);
  assert_eq!(
    *chunks.lock().unwrap(),
    vec![vec![1, 2, 3], vec![4, 5, 6]]
  );
}
