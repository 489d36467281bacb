//! Fault isolation E2E tests.
//!
//! Validates that a transient storage fault while auditing one monitor is
//! recorded, resets the data session, and does not stop the remaining
//! monitors, while any other failure aborts the audit.

use vigil_core::error::{StorageError, VigilError};
use vigil_scheduler::exceptions::{SOURCE_AUDIT_CHANGES, SOURCE_TASK_ACCOUNT_TECH};

use crate::helpers::fixture::{ACCOUNT, Fixture, TechSpec, prod, techs};
use crate::helpers::journal::{is_audit, is_reconcile};
use crate::helpers::mocks::{FaultKind, FaultPlan};

// ---------------------------------------------------------------------------
// Audit orchestrator
// ---------------------------------------------------------------------------

/// A transient fault on the first monitor does not stop the second.
#[tokio::test]
async fn test_e2e_transient_audit_fault_isolated_to_one_monitor() {
    // Given: "alpha" fails transiently, "beta" is healthy
    let fixture = Fixture::new()
        .tech(TechSpec::snapshot("alpha").audit_fault(FaultPlan::always(FaultKind::Transient)))
        .tech(TechSpec::snapshot("beta"));
    let engine = fixture.engine();

    // When: Auditing both
    engine
        .audit()
        .audit_changes(&prod(), &techs(&["alpha", "beta"]), false, false, false)
        .await
        .expect("transient faults are absorbed");

    // Then: One record for alpha, one reset, beta still audited
    assert_eq!(fixture.store.count_source(SOURCE_AUDIT_CHANGES), 1);
    let record = &fixture.store.records()[0];
    assert_eq!(record.entity_id.as_deref(), Some("prod/alpha"));
    assert_eq!(record.error_kind, "storage");
    assert_eq!(fixture.store.session_resets(), 1);
    assert_eq!(fixture.journal.count(is_audit("beta")), 1);
}

/// Any non-transient failure propagates and stops the audit.
#[tokio::test]
async fn test_e2e_non_transient_audit_fault_propagates() {
    // Given: "alpha" fails with a non-transient storage error
    let fixture = Fixture::new()
        .tech(TechSpec::snapshot("alpha").audit_fault(FaultPlan::always(FaultKind::Fatal)))
        .tech(TechSpec::snapshot("beta"));
    let engine = fixture.engine();

    // When: Auditing both
    let err = engine
        .audit()
        .audit_changes(&prod(), &techs(&["alpha", "beta"]), false, false, false)
        .await
        .unwrap_err();

    // Then: The error escapes, nothing recorded, beta never audited
    assert!(matches!(err, VigilError::Storage(StorageError::Query(_))));
    assert!(fixture.store.records().is_empty());
    assert_eq!(fixture.store.session_resets(), 0);
    assert_eq!(fixture.journal.count(is_audit("beta")), 0);
}

/// A transient fault while auditing one page does not stop the batch cycle.
#[tokio::test]
async fn test_e2e_transient_page_audit_fault_continues_batch() {
    // Given: the first page audit of s3 fails transiently
    let fixture = Fixture::new()
        .tech(TechSpec::batch("s3", &[10, 10]).audit_fault(FaultPlan::times(FaultKind::Transient, 1)));
    let engine = fixture.engine();

    // When: Finding changes for s3
    engine
        .change_finder()
        .find_changes(ACCOUNT, &techs(&["s3"]), false)
        .await
        .unwrap();

    // Then: Both pages audited, reconciled once, one record
    assert_eq!(fixture.journal.audits_of("s3"), vec![10, 10]);
    assert_eq!(fixture.journal.count(is_reconcile("s3")), 1);
    assert_eq!(fixture.store.count_source(SOURCE_AUDIT_CHANGES), 1);
}

// ---------------------------------------------------------------------------
// Watch task
// ---------------------------------------------------------------------------

/// A transient watch fault is recorded as a task-account-tech failure and retried.
#[tokio::test]
async fn test_e2e_transient_watch_fault_recorded_and_retried() {
    // Given: a fetch that hits one transient fault
    let fixture = Fixture::new().tech(
        TechSpec::snapshot("iamrole").watch_fault(FaultPlan::times(FaultKind::Transient, 1)),
    );
    let engine = fixture.engine();

    // When: Running the watch task
    engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await
        .expect("second attempt should succeed");

    // Then: The inner record names the account and technology
    assert_eq!(fixture.store.count_source(SOURCE_TASK_ACCOUNT_TECH), 1);
    let inner = fixture
        .store
        .records()
        .into_iter()
        .find(|r| r.source == SOURCE_TASK_ACCOUNT_TECH)
        .unwrap();
    assert_eq!(inner.entity_id.as_deref(), Some("prod/iamrole"));
    assert!(fixture.store.session_resets() >= 1);
    assert!(fixture.store.session_closes() >= 1);
}

/// A healthy run only closes sessions, never resets them.
#[tokio::test]
async fn test_e2e_healthy_run_closes_sessions() {
    // Given: a healthy technology
    let fixture = Fixture::new().tech(TechSpec::snapshot("iamrole"));
    let engine = fixture.engine();

    // When: Running the watch task
    engine
        .executor()
        .run_account_technology(ACCOUNT, "iamrole")
        .await
        .unwrap();

    // Then: Sessions were closed, none reset, nothing recorded
    assert_eq!(fixture.store.session_resets(), 0);
    assert!(fixture.store.session_closes() >= 1);
    assert!(fixture.store.records().is_empty());
}
