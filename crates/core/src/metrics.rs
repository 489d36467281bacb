//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `vigil_`
//! - 컴포넌트명: `scheduler_`, `watch_`, `batch_`, `audit_`, `exception_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

use metrics::{describe_counter, describe_gauge, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 작업 종류 레이블 키 (task_account_tech, task_audit, clear_expired_exceptions)
pub const LABEL_TASK: &str = "task";

/// 기술 레이블 키
pub const LABEL_TECHNOLOGY: &str = "technology";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 예외 source 레이블 키
pub const LABEL_SOURCE: &str = "source";

// ─── Scheduler 메트릭 ──────────────────────────────────────────────

/// Scheduler: 등록된 스케줄 작업 수 (counter, label: task)
pub const SCHEDULER_REGISTRATIONS_TOTAL: &str = "vigil_scheduler_registrations_total";

/// Scheduler: 부트스트랩 패스 실행 수 (counter, label: result)
pub const SCHEDULER_BOOTSTRAPS_TOTAL: &str = "vigil_scheduler_bootstraps_total";

/// Scheduler: 실행된 작업 수 (counter, labels: task, result)
pub const SCHEDULER_TASKS_TOTAL: &str = "vigil_scheduler_tasks_total";

/// Scheduler: 재시도 수 (counter, label: task)
pub const SCHEDULER_TASK_RETRIES_TOTAL: &str = "vigil_scheduler_task_retries_total";

/// Scheduler: 재시도 소진으로 실패한 작업 수 (counter, label: task)
pub const SCHEDULER_TASK_FAILURES_TOTAL: &str = "vigil_scheduler_task_failures_total";

/// Scheduler: 작업 실행 시간 (histogram, 초, label: task)
pub const SCHEDULER_TASK_DURATION_SECONDS: &str = "vigil_scheduler_task_duration_seconds";

/// Scheduler: 대기 중인 스케줄 등록 수 (gauge)
pub const SCHEDULER_PENDING_REGISTRATIONS: &str = "vigil_scheduler_pending_registrations";

// ─── Watch / Batch 메트릭 ──────────────────────────────────────────

/// Watch: 수집된 아이템 수 (counter, label: technology)
pub const WATCH_ITEMS_TOTAL: &str = "vigil_watch_items_total";

/// Batch: 처리된 페이지 수 (counter, label: technology)
pub const BATCH_PAGES_TOTAL: &str = "vigil_batch_pages_total";

/// Batch: 전체 수집 실패로 중단된 주기 수 (counter, label: technology)
pub const BATCH_ABORTS_TOTAL: &str = "vigil_batch_aborts_total";

// ─── Audit 메트릭 ──────────────────────────────────────────────────

/// Audit: 실행된 auditor 수 (counter, label: technology)
pub const AUDIT_RUNS_TOTAL: &str = "vigil_audit_runs_total";

/// Audit: 생성된 이슈 수 (counter, label: technology)
pub const AUDIT_ISSUES_TOTAL: &str = "vigil_audit_issues_total";

// ─── Exception 메트릭 ──────────────────────────────────────────────

/// Exception: 기록된 예외 레코드 수 (counter, label: source)
pub const EXCEPTION_RECORDS_TOTAL: &str = "vigil_exception_records_total";

/// Exception: janitor가 삭제한 레코드 수 (counter)
pub const EXCEPTION_PURGED_TOTAL: &str = "vigil_exception_purged_total";

/// 모든 메트릭 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    describe_counter!(
        SCHEDULER_REGISTRATIONS_TOTAL,
        "Scheduled task registrations issued by the bootstrapper"
    );
    describe_counter!(
        SCHEDULER_BOOTSTRAPS_TOTAL,
        "Scheduler bootstrap passes by result"
    );
    describe_counter!(SCHEDULER_TASKS_TOTAL, "Executed tasks by kind and result");
    describe_counter!(SCHEDULER_TASK_RETRIES_TOTAL, "Task retry attempts");
    describe_counter!(
        SCHEDULER_TASK_FAILURES_TOTAL,
        "Tasks that exhausted their retry budget"
    );
    describe_histogram!(
        SCHEDULER_TASK_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of task executions"
    );
    describe_gauge!(
        SCHEDULER_PENDING_REGISTRATIONS,
        "Registrations currently held by the task queue"
    );
    describe_counter!(WATCH_ITEMS_TOTAL, "Items fetched by watchers");
    describe_counter!(BATCH_PAGES_TOTAL, "Batch pages fetched and audited");
    describe_counter!(
        BATCH_ABORTS_TOTAL,
        "Batch cycles aborted because every fetch scope failed"
    );
    describe_counter!(AUDIT_RUNS_TOTAL, "Auditor executions");
    describe_counter!(AUDIT_ISSUES_TOTAL, "Issues produced by auditors");
    describe_counter!(EXCEPTION_RECORDS_TOTAL, "Exception records written");
    describe_counter!(
        EXCEPTION_PURGED_TOTAL,
        "Expired exception records removed by the janitor"
    );
}
