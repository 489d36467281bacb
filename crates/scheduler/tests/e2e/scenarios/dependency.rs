//! Audit dependency E2E tests.
//!
//! Validates that a watch of one technology audits every technology that
//! transitively depends on it, each exactly once.

use crate::helpers::fixture::{ACCOUNT, Fixture, TechSpec, prod, techs};
use crate::helpers::journal::{is_audit, is_reconcile, is_report};

fn role_chain() -> Fixture {
    Fixture::new()
        .tech(TechSpec::snapshot("iamrole"))
        .tech(TechSpec::audit_only("policy").depends_on("iamrole"))
        .tech(TechSpec::audit_only("exposure").depends_on("policy"))
        .tech(TechSpec::snapshot("s3"))
}

/// Watching iamrole audits iamrole, policy, and exposure but not s3.
#[tokio::test]
async fn test_e2e_watch_audits_transitive_dependents() {
    // Given: exposure -> policy -> iamrole, and an unrelated s3
    let fixture = role_chain();
    let engine = fixture.engine();

    // When: Finding changes for iamrole
    engine
        .change_finder()
        .find_changes(ACCOUNT, &techs(&["iamrole"]), false)
        .await
        .unwrap();

    // Then: The whole chain is audited once, s3 is untouched
    let journal = &fixture.journal;
    assert_eq!(journal.count(is_audit("iamrole")), 1);
    assert_eq!(journal.count(is_audit("policy")), 1);
    assert_eq!(journal.count(is_audit("exposure")), 1);
    assert_eq!(journal.count(is_audit("s3")), 0);

    // The watch itself never sends reports
    assert_eq!(journal.count(is_report("iamrole")), 0);
}

/// A dependent shared by two requested technologies is audited once.
#[tokio::test]
async fn test_e2e_shared_dependent_audited_once() {
    // Given: "access" depends on both iamrole and s3
    let fixture = Fixture::new()
        .tech(TechSpec::snapshot("iamrole"))
        .tech(TechSpec::snapshot("s3"))
        .tech(
            TechSpec::audit_only("access")
                .depends_on("iamrole")
                .depends_on("s3"),
        );
    let engine = fixture.engine();

    // When: Auditing both technologies in one call
    engine
        .audit()
        .audit_changes(&prod(), &techs(&["iamrole", "s3"]), false, false, true)
        .await
        .unwrap();

    // Then: access ran once
    assert_eq!(fixture.journal.count(is_audit("access")), 1);
    assert_eq!(fixture.journal.count(is_audit("iamrole")), 1);
    assert_eq!(fixture.journal.count(is_audit("s3")), 1);
}

/// A non-batch dependent of a batch technology is audited after reconciliation.
#[tokio::test]
async fn test_e2e_batch_dependent_audited_after_reconcile() {
    // Given: bucketpolicy depends on the batch technology s3
    let fixture = Fixture::new()
        .tech(TechSpec::batch("s3", &[10, 10]))
        .tech(TechSpec::audit_only("bucketpolicy").depends_on("s3"));
    let engine = fixture.engine();

    // When: Finding changes for s3
    engine
        .change_finder()
        .find_changes(ACCOUNT, &techs(&["s3"]), false)
        .await
        .unwrap();

    // Then: s3 audited per page, bucketpolicy once after the reconcile
    let journal = &fixture.journal;
    assert_eq!(journal.audits_of("s3"), vec![10, 10]);
    assert_eq!(journal.count(is_audit("bucketpolicy")), 1);
    assert!(journal.first_position(is_audit("bucketpolicy")) > journal.last_position(is_reconcile("s3")));
}

/// The audit-only task reports on the technology and all of its dependents.
#[tokio::test]
async fn test_e2e_audit_task_reports_dependents() {
    // Given: the role chain
    let fixture = role_chain();
    let engine = fixture.engine();

    // When: Running the audit-only task for iamrole
    engine
        .executor()
        .run_audit_only(ACCOUNT, "iamrole")
        .await
        .unwrap();

    // Then: Every audited technology delivered a report
    let journal = &fixture.journal;
    assert_eq!(journal.count(is_report("iamrole")), 1);
    assert_eq!(journal.count(is_report("policy")), 1);
    assert_eq!(journal.count(is_report("exposure")), 1);
    assert_eq!(journal.count(is_report("s3")), 0);
    assert!(fixture.store.records().is_empty());
}
