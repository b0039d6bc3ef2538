use super::wait_until_async;
use bulkhead_guard::{Bulkhead, BulkheadError, OutcomeKind};
use std::time::Duration;
use tokio::sync::oneshot;

/// Capacity + 1 deferred calls: the extra one is rejected until the first
/// deferred result resolves, long after the initiating calls returned.
#[tokio::test]
async fn permit_held_until_deferred_result_resolves() {
    let capacity = 2;
    let bulkhead = Bulkhead::new(capacity, None);

    let mut releases = Vec::new();
    let mut handles = Vec::new();
    for i in 0..capacity {
        let (tx, rx) = oneshot::channel::<()>();
        releases.push(tx);
        let handle = bulkhead
            .spawn(|| async move {
                rx.await.map_err(|_| "released without a signal")?;
                Ok::<_, &str>(i)
            })
            .await
            .unwrap();
        handles.push(handle);
    }

    // Every initiating call has returned; the permits are still held.
    assert_eq!(bulkhead.in_flight(), capacity);
    let extra = bulkhead.run(|| async { Ok::<_, ()>(()) }).await;
    assert_eq!(extra.kind(), OutcomeKind::RejectedCapacity);

    let first = releases.remove(0);
    first.send(()).unwrap();
    assert_eq!(handles.remove(0).await.unwrap(), Ok(0));

    let extra = bulkhead.run(|| async { Ok::<_, ()>(()) }).await;
    assert!(extra.is_completed());

    for tx in releases {
        tx.send(()).unwrap();
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
    assert_eq!(bulkhead.in_flight(), 0);
}

/// With a waiting area the extra call queues instead, and is admitted only
/// when the deferred result resolves.
#[tokio::test]
async fn queued_call_waits_for_deferred_completion() {
    let bulkhead = Bulkhead::new(1, Some(1));
    let (tx, rx) = oneshot::channel::<()>();

    let deferred = bulkhead
        .spawn(|| async move { rx.await.map_err(|_| ()) })
        .await
        .unwrap();

    let waiter = {
        let bulkhead = bulkhead.clone();
        tokio::spawn(async move { bulkhead.run(|| async { Ok::<_, ()>("second") }).await })
    };

    wait_until_async(Duration::from_secs(5), || bulkhead.queued() == 1).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());
    assert_eq!(bulkhead.queued(), 1);

    tx.send(()).unwrap();
    deferred.await.unwrap().unwrap();

    let outcome = waiter.await.unwrap();
    assert!(outcome.is_completed());
    assert_eq!(bulkhead.snapshot().completed, 2);
}

#[tokio::test]
async fn failed_deferred_result_releases_permit() {
    let bulkhead = Bulkhead::new(1, None);

    let pending = bulkhead
        .submit(|| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<(), _>("backend unavailable")
        })
        .await
        .unwrap();
    assert_eq!(bulkhead.in_flight(), 1);

    assert_eq!(pending.await, Err("backend unavailable"));

    let snapshot = bulkhead.snapshot();
    assert_eq!(snapshot.in_flight, 0);
    assert_eq!(snapshot.failed, 1);
}

#[tokio::test]
async fn operation_not_started_when_rejected() {
    let bulkhead = Bulkhead::new(1, None);
    let _held = bulkhead.try_enter().unwrap();

    let mut started = false;
    let result = bulkhead
        .submit(|| {
            started = true;
            async { Ok::<_, ()>(()) }
        })
        .await;

    assert_eq!(
        result.unwrap_err(),
        BulkheadError::BulkheadFull {
            max_concurrent_calls: 1
        }
    );
    assert!(!started);
}

#[test]
fn submit_blocking_hands_back_deferred_result() {
    let bulkhead = Bulkhead::new(1, Some(1));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();

    let pending = bulkhead
        .submit_blocking(|| async { Ok::<_, ()>(5) })
        .unwrap();
    assert!(bulkhead.try_submit(|| async { Ok::<_, ()>(6) }).is_err());

    assert_eq!(runtime.block_on(pending), Ok(5));
    assert_eq!(bulkhead.in_flight(), 0);
}
