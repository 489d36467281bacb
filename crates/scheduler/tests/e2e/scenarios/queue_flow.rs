//! Local task queue E2E tests.
//!
//! Runs a bootstrap pass against the tokio task queue with paused time and
//! validates that registered tasks reach the engine on schedule.

use std::sync::Arc;
use std::time::Duration;

use vigil_scheduler::LocalTaskQueue;
use vigil_scheduler::exceptions::SOURCE_WATCH_TASK;

use crate::helpers::fixture::{Fixture, TechSpec};
use crate::helpers::journal::Event;
use crate::helpers::mocks::{FaultKind, FaultPlan};

fn snapshots(fixture: &Fixture) -> usize {
    fixture
        .journal
        .count(|e| matches!(e, Event::Snapshot { .. }))
}

/// The immediate watch runs right away and the periodic one after its interval.
#[tokio::test(start_paused = true)]
async fn test_e2e_bootstrap_on_local_queue_runs_watch_tasks() {
    // Given: iamrole every 15 minutes, bootstrapped onto a local queue
    let fixture = Fixture::new()
        .quiet_clocks()
        .tech(TechSpec::snapshot("iamrole").interval(15));
    let engine = fixture.engine();
    let queue = Arc::new(LocalTaskQueue::new(engine.task_handler(), 2).unwrap());
    let summary = engine
        .bootstrapper(queue.clone())
        .unwrap()
        .bootstrap()
        .await
        .unwrap();
    assert_eq!(summary.immediate, 1);

    // When: Letting the immediate task run
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Then: One watch and one alert
    assert_eq!(snapshots(&fixture), 1);
    assert_eq!(
        fixture
            .journal
            .count(|e| matches!(e, Event::Alerted { .. })),
        1
    );

    // When: One interval passes
    tokio::time::sleep(Duration::from_secs(15 * 60)).await;

    // Then: The periodic registration fired once
    assert_eq!(snapshots(&fixture), 2);

    // Periodic + audit clock + janitor clock remain
    assert_eq!(queue.pending_count(), 3);
    queue.shutdown().await;
}

/// A failing scheduled task exhausts its retries inside the worker.
#[tokio::test(start_paused = true)]
async fn test_e2e_local_queue_task_failure_is_recorded() {
    // Given: a watch that always fails
    let fixture = Fixture::new().quiet_clocks().tech(
        TechSpec::snapshot("iamrole").watch_fault(FaultPlan::always(FaultKind::Collect)),
    );
    let engine = fixture.engine();
    let queue = Arc::new(LocalTaskQueue::new(engine.task_handler(), 1).unwrap());

    // When: Bootstrapping and letting the immediate task run
    engine
        .bootstrapper(queue.clone())
        .unwrap()
        .bootstrap()
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Then: Three attempts were recorded and the queue keeps its schedules
    assert_eq!(fixture.store.count_source(SOURCE_WATCH_TASK), 3);
    assert_eq!(queue.pending_count(), 3);
    queue.shutdown().await;
}

/// Re-bootstrapping a live queue leaves exactly one set of registrations.
#[tokio::test(start_paused = true)]
async fn test_e2e_rebootstrap_on_local_queue_does_not_duplicate() {
    // Given: a bootstrapped queue
    let fixture = Fixture::new()
        .quiet_clocks()
        .tech(TechSpec::snapshot("iamrole"))
        .tech(TechSpec::snapshot("s3"));
    let engine = fixture.engine();
    let queue = Arc::new(LocalTaskQueue::new(engine.task_handler(), 2).unwrap());
    let bootstrapper = engine.bootstrapper(queue.clone()).unwrap();
    bootstrapper.bootstrap().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let after_first = queue.pending_count();

    // When: Bootstrapping again
    let summary = bootstrapper.bootstrap().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Then: The pending set was replaced, not doubled
    assert_eq!(summary.purged, after_first);
    assert_eq!(queue.pending_count(), after_first);

    // Two immediate watches per pass
    assert_eq!(snapshots(&fixture), 4);
    queue.shutdown().await;
}
