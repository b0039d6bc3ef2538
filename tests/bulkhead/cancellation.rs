use super::wait_until_async;
use bulkhead_guard::{Bulkhead, BulkheadError};
use std::time::Duration;

/// A cancelled waiter frees its slot and the next release skips it.
#[tokio::test]
async fn cancelled_waiter_is_skipped_by_release() {
    let bulkhead = Bulkhead::new(1, Some(2));
    let held = bulkhead.try_enter().unwrap();

    let cancelled = bulkhead.reserve().unwrap();
    let next = bulkhead.reserve().unwrap();
    assert_eq!(bulkhead.queued(), 2);

    let handle = cancelled.cancel_handle();
    let waiting = tokio::spawn(cancelled.wait());
    assert!(handle.cancel());
    assert_eq!(waiting.await.unwrap().unwrap_err(), BulkheadError::Cancelled);
    assert_eq!(bulkhead.queued(), 1);

    // The freed slot can be used by a new caller.
    let late = bulkhead.reserve().unwrap();
    assert_eq!(bulkhead.queued(), 2);

    held.complete(&Ok::<_, ()>(()));
    assert!(next.is_granted());
    assert!(late.is_waiting());

    let execution = next.wait().await.unwrap();
    execution.complete(&Ok::<_, ()>(()));
    assert!(late.is_granted());
    late.wait().await.unwrap().complete(&Ok::<_, ()>(()));

    let snapshot = bulkhead.snapshot();
    assert_eq!(snapshot.cancelled, 1);
    assert_eq!(snapshot.completed, 3);
}

#[tokio::test]
async fn cancel_after_grant_passes_permit_on() {
    let bulkhead = Bulkhead::new(1, Some(2));
    let held = bulkhead.try_enter().unwrap();
    let granted_late = bulkhead.reserve().unwrap();
    let behind = bulkhead.reserve().unwrap();

    drop(held);
    assert!(granted_late.is_granted());
    assert!(!granted_late.cancel_handle().cancel());

    // Giving up a granted reservation hands the permit to the next waiter.
    assert!(!granted_late.cancel());
    assert!(behind.is_granted());
    assert_eq!(bulkhead.in_flight(), 1);

    drop(behind);
    assert_eq!(bulkhead.in_flight(), 0);
    assert_eq!(bulkhead.snapshot().cancelled, 2);
}

/// Dropping the waiting future (e.g. under an outer timeout) leaves the queue.
#[tokio::test]
async fn dropped_wait_leaves_queue() {
    let bulkhead = Bulkhead::new(1, Some(1));
    let _held = bulkhead.try_enter().unwrap();

    let result = tokio::time::timeout(Duration::from_millis(10), bulkhead.enter()).await;
    assert!(result.is_err());

    let snapshot = bulkhead.snapshot();
    assert_eq!(snapshot.queued, 0);
    assert_eq!(snapshot.cancelled, 1);
    assert!(bulkhead.reserve().is_ok());
}

#[tokio::test]
async fn wait_bound_expires_for_async_callers() {
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(1)
        .max_queued_calls(Some(4))
        .max_wait_duration(Some(Duration::from_millis(20)))
        .build();
    let _held = bulkhead.try_enter().unwrap();

    let outcome = bulkhead.run(|| async { Ok::<_, ()>(()) }).await;
    let err = outcome.into_result().unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(bulkhead.snapshot().cancelled, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_from_another_task() {
    let bulkhead = Bulkhead::new(1, Some(1));
    let _held = bulkhead.try_enter().unwrap();

    let reservation = bulkhead.reserve().unwrap();
    let handle = reservation.cancel_handle();
    let waiting = tokio::spawn(reservation.wait());

    wait_until_async(Duration::from_secs(5), || bulkhead.queued() == 1).await;
    tokio::spawn(async move { handle.cancel() }).await.unwrap();

    assert_eq!(waiting.await.unwrap().unwrap_err(), BulkheadError::Cancelled);
    assert_eq!(bulkhead.queued(), 0);
}

/// A bounded async wait only needs tokio's time driver, not a full runtime.
#[test]
fn bounded_wait_runs_on_a_time_only_runtime() {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(1)
        .max_queued_calls(Some(1))
        .max_wait_duration(Some(Duration::from_millis(20)))
        .build();
    let held = bulkhead.try_enter().unwrap();

    let err = runtime.block_on(bulkhead.enter()).unwrap_err();
    assert_eq!(err, BulkheadError::Timeout);
    assert_eq!(bulkhead.queued(), 0);

    held.complete(&Ok::<_, ()>(()));
    assert!(runtime.block_on(bulkhead.enter()).is_ok());
}

/// A free permit is handed out without arming a timer, so no runtime is needed.
#[test]
fn immediate_grant_needs_no_runtime() {
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(1)
        .max_queued_calls(Some(1))
        .max_wait_duration(Some(Duration::from_millis(20)))
        .build();

    let execution = futures::executor::block_on(bulkhead.enter()).unwrap();
    assert_eq!(bulkhead.in_flight(), 1);
    execution.complete(&Ok::<_, ()>(()));
    assert_eq!(bulkhead.snapshot().completed, 1);
}
