//! 작업 큐 추상화 -- 스케줄 등록과 대기 작업 정리
//!
//! 부트스트래퍼는 [`TaskQueue`]에 세 종류의 주기(cadence)로 작업을 등록합니다.
//!
//! - 즉시 1회 실행: [`TaskQueue::schedule_once`]
//! - N초 간격 반복: [`TaskQueue::schedule_periodic`]
//! - 고정 시각(cron): [`TaskQueue::schedule_at_clock`]
//!
//! 큐는 등록된 작업이 실행될 때 [`TaskHandler`]에 [`TaskKind`]를 전달합니다.
//! 큐 구현은 프로세스 시작 시 한 번 생성되어 명시적으로 주입됩니다.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use vigil_core::error::{SchedulerError, VigilError};
use vigil_core::monitor::BoxFuture;

/// 작업 큐에 등록되는 작업 종류와 인자
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskKind {
    /// 계정/기술 watch 작업 (change finder + alert)
    AccountTechnology { account: String, technology: String },
    /// 감사 전용 작업
    AuditOnly { account: String, technology: String },
    /// 만료 예외 정리 작업
    ClearExpiredExceptions,
}

impl TaskKind {
    /// watch 작업을 생성합니다.
    pub fn account_technology(account: impl Into<String>, technology: impl Into<String>) -> Self {
        Self::AccountTechnology {
            account: account.into(),
            technology: technology.into(),
        }
    }

    /// 감사 전용 작업을 생성합니다.
    pub fn audit_only(account: impl Into<String>, technology: impl Into<String>) -> Self {
        Self::AuditOnly {
            account: account.into(),
            technology: technology.into(),
        }
    }

    /// 메트릭/로그용 작업 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::AccountTechnology { .. } => "task_account_tech",
            Self::AuditOnly { .. } => "task_audit",
            Self::ClearExpiredExceptions => "clear_expired_exceptions",
        }
    }

    /// 예외 레코드에 붙일 엔티티 식별자 (`account/technology`)
    pub fn entity_id(&self) -> Option<String> {
        match self {
            Self::AccountTechnology {
                account,
                technology,
            }
            | Self::AuditOnly {
                account,
                technology,
            } => Some(format!("{account}/{technology}")),
            Self::ClearExpiredExceptions => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity_id() {
            Some(entity) => write!(f, "{}({entity})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

/// 고정 시각 스케줄 (7필드 cron 표현식, UTC)
///
/// 형식: `sec min hour day-of-month month day-of-week year`
#[derive(Clone)]
pub struct ClockSpec {
    expression: String,
    schedule: cron::Schedule,
}

impl ClockSpec {
    /// cron 표현식을 파싱합니다.
    pub fn parse(expression: &str) -> Result<Self, VigilError> {
        let schedule =
            cron::Schedule::from_str(expression).map_err(|e| SchedulerError::InvalidSchedule {
                expression: expression.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_owned(),
            schedule,
        })
    }

    /// 원본 표현식
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// `now` 이후 다음 실행 시각
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&now).next()
    }

    /// `now`부터 다음 실행 시각까지 남은 시간
    pub fn until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_after(now)
            .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO))
    }
}

impl fmt::Debug for ClockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClockSpec").field(&self.expression).finish()
    }
}

impl PartialEq for ClockSpec {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

impl fmt::Display for ClockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

/// 등록 주기
#[derive(Debug, Clone, PartialEq)]
pub enum Cadence {
    /// 즉시 1회
    Once,
    /// 고정 간격 반복
    Every(Duration),
    /// 고정 시각
    Clock(ClockSpec),
}

/// 등록 식별자
pub type RegistrationId = Uuid;

/// 작업 큐 협력자
///
/// 등록 연산은 동기적으로 완료되며 실행은 큐가 결정합니다.
pub trait TaskQueue: Send + Sync {
    /// 작업을 즉시 1회 실행하도록 등록합니다.
    fn schedule_once(&self, task: TaskKind) -> Result<RegistrationId, VigilError>;

    /// 작업을 `interval` 간격으로 반복 실행하도록 등록합니다.
    fn schedule_periodic(
        &self,
        interval: Duration,
        task: TaskKind,
    ) -> Result<RegistrationId, VigilError>;

    /// 작업을 고정 시각에 실행하도록 등록합니다.
    fn schedule_at_clock(&self, spec: ClockSpec, task: TaskKind)
    -> Result<RegistrationId, VigilError>;

    /// 아직 실행되지 않은 모든 등록을 제거하고 제거 건수를 반환합니다.
    ///
    /// 이미 실행 중인 작업은 취소하지 않습니다.
    fn purge_all_pending(&self) -> usize;
}

/// 큐가 작업을 실행할 때 호출하는 처리기
pub trait TaskHandler: Send + Sync {
    /// 작업 하나를 실행합니다. 에러는 큐의 실패 경로로 전달됩니다.
    fn handle(&self, task: TaskKind) -> BoxFuture<'_, Result<(), VigilError>>;
}
