//! 알림 협력자: 변경 알림 전송과 외부 이슈 트래커 동기화

use crate::error::VigilError;
use crate::monitor::{BoxFuture, Monitor};

/// watch 주기 이후 변경 알림을 보내는 협력자
pub trait Alerter: Send + Sync {
    /// 모니터들이 기록한 변경 사항을 계정 단위로 알립니다.
    fn send_alerts<'a>(
        &'a self,
        monitors: &'a [Monitor],
        account: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>>;
}

/// 외부 이슈 트래커 동기화 협력자 (선택)
pub trait IssueTrackerSync: Send + Sync {
    /// 계정들의 특정 기술 이슈를 동기화합니다.
    fn sync_issues<'a>(
        &'a self,
        accounts: &'a [String],
        technology: &'a str,
    ) -> BoxFuture<'a, Result<(), VigilError>>;
}

