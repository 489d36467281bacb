//! Task retry E2E tests.
//!
//! Validates the bounded retry loop around scheduled task bodies: at most
//! three attempts, one exception record per failed attempt, and the
//! terminal error handed back to the queue.

use vigil_core::error::{SchedulerError, VigilError};
use vigil_scheduler::exceptions::{SOURCE_AUDIT_TASK, SOURCE_TASK_ACCOUNT_TECH, SOURCE_WATCH_TASK};

use crate::helpers::fixture::{ACCOUNT, Fixture, TechSpec};
use crate::helpers::journal::{Event, is_audit};
use crate::helpers::mocks::{FaultKind, FaultPlan};

fn is_snapshot(e: &Event) -> bool {
    matches!(e, Event::Snapshot { .. })
}

fn is_alert(e: &Event) -> bool {
    matches!(e, Event::Alerted { .. })
}

// ---------------------------------------------------------------------------
// Watch task
// ---------------------------------------------------------------------------

/// A watch body that always fails runs three times and then gives up.
#[tokio::test]
async fn test_e2e_watch_task_gives_up_after_three_attempts() {
    // Given: iamrole whose fetch always fails
    let fault = FaultPlan::always(FaultKind::Collect);
    let fixture = Fixture::new().tech(TechSpec::snapshot("iamrole").watch_fault(fault.clone()));
    let engine = fixture.engine();

    // When: Running the watch task
    let err = engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await
        .unwrap_err();

    // Then: Exactly three attempts, each recorded against prod/iamrole
    match err {
        VigilError::Scheduler(SchedulerError::RetriesExhausted { attempts, task, .. }) => {
            assert_eq!(attempts, 3);
            assert_eq!(task, "task_account_tech(prod/iamrole)");
        }
        other => panic!("expected RetriesExhausted, got {other}"),
    }
    assert_eq!(fault.tripped(), 3);
    assert_eq!(fixture.store.count_source(SOURCE_WATCH_TASK), 3);
    assert!(
        fixture
            .store
            .records()
            .iter()
            .all(|r| r.entity_id.as_deref() == Some("prod/iamrole") && r.error_kind == "collect")
    );

    // Not a storage fault, so the inner reporter does not record it
    assert_eq!(fixture.store.count_source(SOURCE_TASK_ACCOUNT_TECH), 0);
    assert_eq!(fixture.journal.count(is_alert), 0);
}

/// A body that fails once succeeds on the second attempt.
#[tokio::test]
async fn test_e2e_watch_task_recovers_on_retry() {
    // Given: a fetch that fails only the first time
    let fault = FaultPlan::times(FaultKind::Collect, 1);
    let fixture = Fixture::new().tech(TechSpec::snapshot("iamrole").watch_fault(fault.clone()));
    let engine = fixture.engine();

    // When: Running the watch task
    engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await
        .expect("second attempt should succeed");

    // Then: One failure recorded, one successful snapshot, alerts sent once
    assert_eq!(fault.tripped(), 1);
    assert_eq!(fixture.store.count_source(SOURCE_WATCH_TASK), 1);
    assert_eq!(fixture.journal.count(is_snapshot), 1);
    assert_eq!(fixture.journal.count(is_alert), 1);
}

/// A configured attempt limit below three is honored.
#[tokio::test]
async fn test_e2e_watch_task_honors_single_attempt_config() {
    // Given: max_attempts = 1
    let fault = FaultPlan::always(FaultKind::Collect);
    let fixture = Fixture::new()
        .max_attempts(1)
        .tech(TechSpec::snapshot("iamrole").watch_fault(fault.clone()));
    let engine = fixture.engine();

    // When: Running the watch task
    let result = engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await;

    // Then: One attempt only
    assert!(result.is_err());
    assert_eq!(fault.tripped(), 1);
    assert_eq!(fixture.store.count_source(SOURCE_WATCH_TASK), 1);
}

/// An alerting failure fails the watch attempt and is retried with it.
#[tokio::test]
async fn test_e2e_alert_failure_retries_whole_watch() {
    // Given: an alerter that fails once
    let fixture = Fixture::new()
        .alert_fault(FaultPlan::times(FaultKind::Collect, 1))
        .tech(TechSpec::snapshot("iamrole"));
    let engine = fixture.engine();

    // When: Running the watch task
    engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await
        .unwrap();

    // Then: The whole watch ran twice
    assert_eq!(fixture.journal.count(is_snapshot), 2);
    assert_eq!(fixture.journal.count(is_alert), 1);
    assert_eq!(fixture.store.count_source(SOURCE_WATCH_TASK), 1);
}

/// A transient storage fault in the watch is recorded by both layers and
/// every attempt releases a poisoned session.
#[tokio::test]
async fn test_e2e_transient_watch_fault_resets_session_each_attempt() {
    // Given: a fetch that always hits a transient storage fault
    let fixture = Fixture::new().tech(
        TechSpec::snapshot("iamrole").watch_fault(FaultPlan::always(FaultKind::Transient)),
    );
    let engine = fixture.engine();

    // When: Running the watch task
    let result = engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await;

    // Then: Three attempts, each recorded twice, sessions reset
    assert!(result.is_err());
    assert_eq!(fixture.store.count_source(SOURCE_TASK_ACCOUNT_TECH), 3);
    assert_eq!(fixture.store.count_source(SOURCE_WATCH_TASK), 3);
    assert!(fixture.store.session_resets() >= 3);
}

// ---------------------------------------------------------------------------
// Audit task
// ---------------------------------------------------------------------------

/// A non-transient audit failure is retried under the audit source tag.
#[tokio::test]
async fn test_e2e_audit_task_retries_non_transient_failure() {
    // Given: an auditor whose issue persistence fails permanently
    let fixture = Fixture::new()
        .tech(TechSpec::snapshot("iamrole").audit_fault(FaultPlan::always(FaultKind::Fatal)));
    let engine = fixture.engine();

    // When: Running the audit-only task
    let err = engine
        .executor()
        .run_audit_only(ACCOUNT, "iamrole")
        .await
        .unwrap_err();

    // Then: Three audits, three records tagged with the audit source
    assert!(matches!(
        err,
        VigilError::Scheduler(SchedulerError::RetriesExhausted { attempts: 3, .. })
    ));
    assert_eq!(fixture.journal.count(is_audit("iamrole")), 3);
    assert_eq!(fixture.store.count_source(SOURCE_AUDIT_TASK), 3);
}

/// A transient audit failure is absorbed inside the attempt, so no retry happens.
#[tokio::test]
async fn test_e2e_audit_task_absorbs_transient_failure() {
    // Given: an auditor whose issue persistence hits a transient fault
    let fixture = Fixture::new().tech(
        TechSpec::snapshot("iamrole").audit_fault(FaultPlan::always(FaultKind::Transient)),
    );
    let engine = fixture.engine();

    // When: Running the audit-only task
    engine
        .executor()
        .run_audit_only(ACCOUNT, "iamrole")
        .await
        .expect("transient audit faults are absorbed");

    // Then: One audit, no task-level record
    assert_eq!(fixture.journal.count(is_audit("iamrole")), 1);
    assert_eq!(fixture.store.count_source(SOURCE_AUDIT_TASK), 0);
}
