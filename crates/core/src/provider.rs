//! 계정/모니터 제공자: 스케줄러가 계정과 모니터를 조회하는 창구
//!
//! [`MonitorProvider`]는 외부 인벤토리와 기술 레지스트리를 감싸는 협력자입니다.
//! [`StaticMonitorProvider`]는 설정 파일에서 읽은 계정 목록과
//! [`TechnologyRegistry`]로 동작하는 기본 구현입니다.

use std::sync::Arc;

use crate::error::{RegistryError, VigilError};
use crate::monitor::{BoxFuture, Monitor};
use crate::registry::{MonitorContext, TechnologyRegistry};
use crate::types::Account;

/// 계정과 모니터를 제공하는 협력자
pub trait MonitorProvider: Send + Sync {
    /// 활성 상태의 1st-party 계정 목록을 반환합니다.
    fn list_active_first_party_accounts(&self) -> BoxFuture<'_, Result<Vec<Account>, VigilError>>;

    /// 계정에 대해 기술 필터에 맞는 모니터를 생성합니다.
    ///
    /// `technologies`가 `None`이면 등록된 모든 기술을 대상으로 합니다.
    fn resolve_monitors<'a>(
        &'a self,
        account: &'a str,
        technologies: Option<&'a [String]>,
        debug: bool,
    ) -> BoxFuture<'a, Result<Vec<Monitor>, VigilError>>;

    /// 요청 기술과 그 기술에 전이적으로 의존하는 모든 모니터를 생성합니다.
    fn resolve_monitors_with_dependencies<'a>(
        &'a self,
        account: &'a str,
        technologies: &'a [String],
        debug: bool,
    ) -> BoxFuture<'a, Result<Vec<Monitor>, VigilError>>;
}

/// 정적 계정 인벤토리 + 기술 레지스트리 기반 제공자
#[derive(Debug, Clone)]
pub struct StaticMonitorProvider {
    accounts: Vec<Account>,
    registry: Arc<TechnologyRegistry>,
}

impl StaticMonitorProvider {
    /// 계정 목록과 레지스트리로 제공자를 생성합니다.
    pub fn new(accounts: Vec<Account>, registry: Arc<TechnologyRegistry>) -> Self {
        Self { accounts, registry }
    }

    /// 레지스트리 참조
    pub fn registry(&self) -> &TechnologyRegistry {
        &self.registry
    }

    fn account(&self, name: &str) -> Result<&Account, VigilError> {
        self.accounts
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| RegistryError::UnknownAccount(name.to_owned()).into())
    }

    fn build(
        &self,
        account: &Account,
        technologies: &[String],
        debug: bool,
    ) -> Result<Vec<Monitor>, VigilError> {
        let ctx = MonitorContext { account, debug };
        technologies
            .iter()
            .map(|tech| {
                self.registry
                    .get(tech)
                    .ok_or_else(|| VigilError::from(RegistryError::UnknownTechnology(tech.clone())))
                    .and_then(|reg| reg.build(ctx))
            })
            .collect()
    }
}

impl MonitorProvider for StaticMonitorProvider {
    fn list_active_first_party_accounts(&self) -> BoxFuture<'_, Result<Vec<Account>, VigilError>> {
        Box::pin(async move {
            Ok(self
                .accounts
                .iter()
                .filter(|a| a.is_schedulable())
                .cloned()
                .collect())
        })
    }

    fn resolve_monitors<'a>(
        &'a self,
        account: &'a str,
        technologies: Option<&'a [String]>,
        debug: bool,
    ) -> BoxFuture<'a, Result<Vec<Monitor>, VigilError>> {
        Box::pin(async move {
            let account = self.account(account)?;
            let selected: Vec<String> = match technologies {
                Some(filter) => filter.to_vec(),
                None => self.registry.technologies().map(str::to_owned).collect(),
            };
            self.build(account, &selected, debug)
        })
    }

    fn resolve_monitors_with_dependencies<'a>(
        &'a self,
        account: &'a str,
        technologies: &'a [String],
        debug: bool,
    ) -> BoxFuture<'a, Result<Vec<Monitor>, VigilError>> {
        Box::pin(async move {
            let account = self.account(account)?;
            let closure = self.registry.dependency_closure(technologies);
            self.build(account, &closure, debug)
        })
    }
}
