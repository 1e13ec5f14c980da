//! Debounce behavior driven on virtual time.

use quiesce::infrastructure::mocks::ManualTimerQueue;
use quiesce::{debounce, Edges, ExecutionKind, Invoker, InvokerBuilder};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

type Log<T> = Arc<Mutex<Vec<(u128, T)>>>;

/// Build a debounced invoker that logs `(elapsed_ms, args)` for each execution.
fn debounced<T: Send + 'static>(
    queue: &ManualTimerQueue,
    delay: Duration,
    edges: Edges,
) -> (Invoker<T>, Log<T>) {
    let log: Log<T> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let clock = queue.clone();
    let invoker = InvokerBuilder::debounce(delay)
        .with_edges(edges)
        .with_timer_queue(Arc::new(queue.clone()))
        .build(move |args: T| {
            sink.lock()
                .unwrap()
                .push((clock.elapsed().as_millis(), args));
        })
        .unwrap();
    (invoker, log)
}

#[test]
fn test_trailing_burst_executes_last_arguments_once() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(200), Edges::Trailing);

    invoker.run("a");
    invoker.run("b");
    invoker.run("c");
    queue.advance(ms(199));
    assert!(log.lock().unwrap().is_empty());

    queue.advance(ms(1));
    assert_eq!(*log.lock().unwrap(), vec![(200, "c")]);

    queue.advance(ms(1000));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_calls_spread_inside_delay_fire_after_last_call() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(200), Edges::Trailing);

    invoker.run(1);
    queue.advance(ms(50));
    invoker.run(2);
    queue.advance(ms(50));
    invoker.run(3);

    queue.advance(ms(199));
    assert!(log.lock().unwrap().is_empty());

    queue.advance(ms(1));
    assert_eq!(*log.lock().unwrap(), vec![(300, 3)]);
}

#[test]
fn test_separate_bursts_execute_separately() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(100), Edges::Trailing);

    invoker.run(1);
    invoker.run(2);
    queue.advance(ms(150));
    invoker.run(3);
    queue.advance(ms(150));

    assert_eq!(*log.lock().unwrap(), vec![(100, 2), (250, 3)]);
}

#[test]
fn test_leading_only_fires_once_per_quiet_window() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(100), Edges::Leading);

    invoker.run(1);
    assert_eq!(*log.lock().unwrap(), vec![(0, 1)]);

    for n in 2..=5 {
        queue.advance(ms(50));
        invoker.run(n);
    }
    queue.advance(ms(500));
    assert_eq!(log.lock().unwrap().len(), 1);
    assert_eq!(queue.pending(), 0);

    invoker.run(6);
    assert_eq!(*log.lock().unwrap(), vec![(0, 1), (700, 6)]);
}

#[test]
fn test_both_edges_single_call_executes_once() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(100), Edges::Both);

    invoker.run(1);
    queue.advance(ms(500));

    assert_eq!(*log.lock().unwrap(), vec![(0, 1)]);
    assert_eq!(invoker.metrics().executions_of(ExecutionKind::Leading), 1);
    assert_eq!(invoker.metrics().executions_of(ExecutionKind::Trailing), 0);
}

#[test]
fn test_both_edges_burst_executes_first_and_last() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(100), Edges::Both);

    invoker.run(1);
    queue.advance(ms(40));
    invoker.run(2);
    queue.advance(ms(40));
    invoker.run(3);
    queue.advance(ms(100));

    assert_eq!(*log.lock().unwrap(), vec![(0, 1), (180, 3)]);
    assert_eq!(invoker.metrics().coalesced(), 1);
}

#[test]
fn test_max_wait_forces_execution_during_continuous_burst() {
    let queue = ManualTimerQueue::new(Instant::now());
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let clock = queue.clone();
    let invoker = InvokerBuilder::debounce(ms(100))
        .with_edges(Edges::Trailing)
        .with_max_wait(ms(250))
        .with_timer_queue(Arc::new(queue.clone()))
        .build(move |n: u32| sink.lock().unwrap().push((clock.elapsed().as_millis(), n)))
        .unwrap();

    for n in 0..10 {
        invoker.run(n);
        queue.advance(ms(50));
    }
    queue.advance(ms(500));

    let log = log.lock().unwrap();
    assert_eq!(log.first(), Some(&(250, 4)));
    assert_eq!(log.last().map(|(_, n)| *n), Some(9));
}

#[test]
fn test_zero_delay_is_synchronous() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, Duration::ZERO, Edges::Trailing);

    invoker.run(1);
    invoker.run(2);

    assert_eq!(*log.lock().unwrap(), vec![(0, 1), (0, 2)]);
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_neither_edge_never_executes() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, ms(100), Edges::Neither);

    invoker.run(1);
    queue.advance(ms(500));
    assert!(!invoker.flush());

    assert!(log.lock().unwrap().is_empty());
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_adapter_defaults_to_both_edges() {
    let queue = ManualTimerQueue::new(Instant::now());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let invoker = debounce(Arc::new(queue.clone()), ms(100), move |n: u32| {
        sink.lock().unwrap().push(n)
    })
    .unwrap();

    invoker.run(1);
    invoker.run(2);
    queue.advance(ms(100));

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(invoker.kind(), "debounce");
}

#[test]
fn test_unbounded_delay_waits_for_flush() {
    let queue = ManualTimerQueue::new(Instant::now());
    let (invoker, log) = debounced(&queue, Duration::MAX, Edges::Both);

    invoker.run(1u32);
    invoker.run(2);
    invoker.run(3);
    queue.advance(Duration::MAX);

    assert_eq!(*log.lock().unwrap(), vec![(0, 1)]);
    assert_eq!(queue.pending(), 1);

    assert!(invoker.flush());
    assert_eq!(log.lock().unwrap().last().map(|(_, n)| *n), Some(3));
    assert_eq!(queue.pending(), 0);
}
