use super::wait_until;
use bulkhead_guard::{Bulkhead, BulkheadError, OutcomeKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// C + Q + 1 simultaneous callers: C run, Q wait then run, one is turned away.
#[test]
fn capacity_plus_queue_plus_one() {
    let (capacity, queue) = (2, 3);
    let queued_events = Arc::new(AtomicUsize::new(0));
    let q = Arc::clone(&queued_events);

    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(capacity)
        .max_queued_calls(Some(queue))
        .on_call_queued(move |_| {
            q.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let callers = capacity + queue + 1;
    let start = Arc::new(Barrier::new(callers));
    let handles: Vec<_> = (0..callers)
        .map(|_| {
            let bulkhead = bulkhead.clone();
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let watcher = bulkhead.clone();
                bulkhead.run_blocking(move || {
                    wait_until(Duration::from_secs(5), || {
                        watcher.snapshot().rejected_queue_full == 1
                    });
                    Ok::<_, ()>(())
                })
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let count = |kind| outcomes.iter().filter(|o| o.kind() == kind).count();

    assert_eq!(count(OutcomeKind::Completed), capacity + queue);
    assert_eq!(count(OutcomeKind::RejectedQueueFull), 1);
    assert_eq!(queued_events.load(Ordering::SeqCst), queue);

    let snapshot = bulkhead.snapshot();
    assert_eq!(snapshot.queued, 0);
    assert_eq!(snapshot.in_flight, 0);
}

#[test]
fn queued_callers_are_granted_in_arrival_order() {
    let bulkhead = Bulkhead::new(1, Some(3));
    let held = bulkhead.try_enter().unwrap();

    let first = bulkhead.reserve().unwrap();
    let second = bulkhead.reserve().unwrap();
    let third = bulkhead.reserve().unwrap();
    assert_eq!(bulkhead.queued(), 3);
    assert!(first.is_waiting() && second.is_waiting() && third.is_waiting());

    held.complete(&Ok::<_, ()>(()));
    assert!(first.is_granted());
    assert!(second.is_waiting());

    let execution = first.wait_blocking().unwrap();
    drop(execution);
    assert!(second.is_granted());
    assert!(third.is_waiting());

    let execution = second.wait_blocking().unwrap();
    execution.complete(&Ok::<_, ()>(()));
    let execution = third.wait_blocking().unwrap();
    execution.complete(&Ok::<_, ()>(()));

    let snapshot = bulkhead.snapshot();
    assert_eq!(snapshot.completed, 3);
    // Only the first waiter's execution was dropped without completing.
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.in_flight, 0);
}

#[test]
fn try_enter_does_not_overtake_waiters() {
    let bulkhead = Bulkhead::new(1, Some(1));
    let held = bulkhead.try_enter().unwrap();
    let waiting = bulkhead.reserve().unwrap();

    drop(held);
    assert!(waiting.is_granted());
    assert!(bulkhead.try_enter().is_err());

    drop(waiting.wait_blocking().unwrap());
    assert!(bulkhead.try_enter().is_ok());
}

#[test]
fn zero_sized_queue_rejects_as_queue_full() {
    let bulkhead = Bulkhead::new(1, Some(0));
    let _held = bulkhead.try_enter().unwrap();

    let err = bulkhead.enter_blocking().unwrap_err();
    assert_eq!(err, BulkheadError::QueueFull { max_queued_calls: 0 });
    assert_eq!(bulkhead.snapshot().rejected_queue_full, 1);
}

#[test]
fn no_queue_rejects_on_capacity() {
    let bulkhead = Bulkhead::new(2, None);
    let _a = bulkhead.enter_blocking().unwrap();
    let _b = bulkhead.enter_blocking().unwrap();

    let outcome = bulkhead.run_blocking(|| Ok::<_, ()>(()));
    assert_eq!(outcome.kind(), OutcomeKind::RejectedCapacity);
    assert!(!outcome.was_admitted());
}

#[test]
fn wait_bound_expires_as_timeout() {
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(1)
        .max_queued_calls(Some(1))
        .max_wait_duration(Some(Duration::from_millis(20)))
        .build();
    let _held = bulkhead.try_enter().unwrap();

    let err = bulkhead.enter_blocking().unwrap_err();
    assert_eq!(err, BulkheadError::Timeout);

    let snapshot = bulkhead.snapshot();
    assert_eq!(snapshot.cancelled, 1);
    assert_eq!(snapshot.queued, 0);
}

#[test]
fn wait_bound_does_not_limit_execution_time() {
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(1)
        .max_wait_duration(Some(Duration::from_millis(5)))
        .build();

    let outcome = bulkhead.run_blocking(|| {
        thread::sleep(Duration::from_millis(30));
        Ok::<_, ()>("slow but admitted")
    });
    assert!(outcome.is_completed());
}
