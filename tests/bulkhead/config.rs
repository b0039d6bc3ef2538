use bulkhead_guard::{Bulkhead, BulkheadConfig, OutcomeKind};
use std::time::Duration;

#[test]
#[should_panic(expected = "max_concurrent_calls must be at least 1")]
fn zero_capacity_is_rejected_at_build() {
    let _ = BulkheadConfig::builder().max_concurrent_calls(0).build();
}

#[test]
fn single_permit_bulkhead_is_valid() {
    let bulkhead = Bulkhead::new(1, None);
    assert_eq!(bulkhead.pool().capacity(), 1);
    assert!(bulkhead.run_blocking(|| Ok::<_, ()>(())).is_completed());
}

#[test]
fn large_capacity_is_accepted() {
    let bulkhead = Bulkhead::new(10_000, Some(10_000));
    assert_eq!(bulkhead.pool().available_permits(), 10_000);
}

#[test]
fn builder_defaults_match_documentation() {
    let bulkhead = Bulkhead::builder().build();
    assert_eq!(bulkhead.config().max_concurrent_calls(), 25);
    assert_eq!(bulkhead.config().max_queued_calls(), None);
    assert_eq!(bulkhead.config().max_wait_duration(), None);
    assert_eq!(bulkhead.config().name(), "bulkhead");
}

#[test]
fn clones_share_one_pool() {
    let bulkhead = Bulkhead::new(1, None);
    let clone = bulkhead.clone();

    let _held = bulkhead.try_enter().unwrap();
    assert!(clone.try_enter().is_err());
    assert_eq!(clone.snapshot().rejected_capacity, 1);
}

/// A call that re-enters its own single-permit bulkhead is turned away.
#[test]
fn nested_call_without_queue_is_rejected() {
    let bulkhead = Bulkhead::new(1, None);
    let nested = bulkhead.clone();

    let outcome = bulkhead.run_blocking(|| {
        let inner = nested.run_blocking(|| Ok::<_, ()>(()));
        Ok::<_, ()>(inner.kind())
    });
    assert_eq!(outcome.into_result(), Ok(OutcomeKind::RejectedCapacity));
}

/// With a waiting area the nested call waits on its own caller and only a
/// wait bound gets it out.
#[test]
fn nested_call_with_queue_waits_on_itself() {
    let bulkhead = Bulkhead::builder()
        .max_concurrent_calls(1)
        .max_queued_calls(Some(1))
        .max_wait_duration(Some(Duration::from_millis(20)))
        .build();
    let nested = bulkhead.clone();

    let outcome = bulkhead.run_blocking(|| {
        let inner = nested.run_blocking(|| Ok::<_, ()>(()));
        Ok::<_, ()>(inner)
    });

    match outcome.into_result() {
        Ok(inner) => assert_eq!(inner.kind(), OutcomeKind::Cancelled),
        Err(err) => panic!("outer call should complete, got {:?}", err),
    }
    assert_eq!(
        bulkhead.snapshot().cancelled,
        1,
        "the nested call timed out in the queue"
    );
}

#[test]
fn named_bulkheads_report_their_name() {
    let bulkhead = Bulkhead::builder().name("inventory").build();
    assert_eq!(bulkhead.name(), "inventory");
    assert!(format!("{:?}", bulkhead).contains("inventory"));
}
