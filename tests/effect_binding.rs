//! Effect bindings: dependency changes coalesced into effect runs.

use quiesce::infrastructure::mocks::ManualTimerQueue;
use quiesce::{Cleanup, EffectBinding, Edges, InvokerBuilder};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

type Journal = Arc<Mutex<Vec<String>>>;

/// Effect that journals each run and its cleanup.
fn journaling_effect(journal: &Journal) -> impl FnMut() -> Option<Cleanup> + Send + 'static {
    let journal = Arc::clone(journal);
    let mut run = 0;
    move || {
        run += 1;
        journal.lock().unwrap().push(format!("run {run}"));
        let journal = Arc::clone(&journal);
        Some(Box::new(move || journal.lock().unwrap().push(format!("cleanup {run}"))) as Cleanup)
    }
}

#[test]
fn test_rapid_changes_run_effect_once() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::debounced(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    for dep in 0..5 {
        binding.update(dep);
        queue.advance(ms(10));
    }
    assert!(journal.lock().unwrap().is_empty());
    assert_eq!(binding.tick(), 0);

    queue.advance(ms(100));
    assert_eq!(*journal.lock().unwrap(), vec!["run 1"]);
    assert_eq!(binding.runs(), 1);
    assert_eq!(binding.tick(), 1);
}

#[test]
fn test_mount_never_runs_synchronously() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::debounced(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    binding.update("mounted");
    assert!(journal.lock().unwrap().is_empty());
    assert!(binding.is_pending());
}

#[test]
fn test_unchanged_dependencies_do_not_feed_coalescer() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::debounced(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    binding.update(1);
    queue.advance(ms(100));
    binding.update(1);
    binding.update(1);
    queue.advance(ms(500));

    assert_eq!(*journal.lock().unwrap(), vec!["run 1"]);
    assert_eq!(binding.metrics().calls(), 1);
}

#[test]
fn test_cleanup_runs_before_next_run_and_on_drop() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::debounced(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    binding.update(1);
    queue.advance(ms(100));
    binding.update(2);
    queue.advance(ms(100));
    drop(binding);

    assert_eq!(
        *journal.lock().unwrap(),
        vec!["run 1", "cleanup 1", "run 2", "cleanup 2"]
    );
}

#[test]
fn test_drop_cancels_pending_run() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::debounced(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    binding.update(1);
    queue.advance(ms(100));
    binding.update(2);
    drop(binding);
    queue.advance(ms(1000));

    assert_eq!(*journal.lock().unwrap(), vec!["run 1", "cleanup 1"]);
    assert_eq!(queue.pending(), 0);
}

#[test]
fn test_throttled_binding_runs_leading_and_trailing() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::throttled(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    binding.update(1);
    binding.update(2);
    binding.update(3);
    assert_eq!(*journal.lock().unwrap(), vec!["run 1"]);

    queue.advance(ms(100));
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["run 1", "cleanup 1", "run 2"]
    );
}

#[test]
fn test_flush_and_cancel() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = EffectBinding::debounced(
        journaling_effect(&journal),
        ms(100),
        Arc::new(queue.clone()),
    );

    binding.update(1);
    assert!(binding.flush());
    assert_eq!(binding.runs(), 1);

    binding.update(2);
    binding.cancel();
    queue.advance(ms(1000));
    binding.update(3);
    queue.advance(ms(1000));

    assert_eq!(binding.runs(), 1);
}

#[test]
fn test_built_from_builder() {
    let queue = ManualTimerQueue::new(Instant::now());
    let journal: Journal = Arc::default();
    let mut binding = InvokerBuilder::throttle(ms(100))
        .with_edges(Edges::Trailing)
        .with_timer_queue(Arc::new(queue.clone()))
        .build_effect(journaling_effect(&journal))
        .unwrap();

    binding.update(vec!["a"]);
    binding.update(vec!["a", "b"]);
    assert_eq!(binding.runs(), 0);

    queue.advance(ms(100));
    assert_eq!(binding.runs(), 1);
}
