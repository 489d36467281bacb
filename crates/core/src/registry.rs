//! 기술 레지스트리: 기술 식별자에서 watcher/auditor 생성자로의 정적 매핑
//!
//! 모든 기술은 프로세스 시작 시 [`TechnologyRegistry::register`]로 명시적으로
//! 등록됩니다. 런타임 모듈 탐색은 하지 않습니다.
//!
//! # 사용 예시
//! ```ignore
//! let mut registry = TechnologyRegistry::new();
//! registry.register(
//!     TechnologyRegistration::new("s3", watcher_factory)
//!         .batch(true)
//!         .auditor(auditor_factory),
//! )?;
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use crate::error::{RegistryError, VigilError};
use crate::monitor::{Auditor, Monitor, Watcher};
use crate::types::Account;

/// watcher/auditor 생성 시 전달되는 컨텍스트
#[derive(Debug, Clone, Copy)]
pub struct MonitorContext<'a> {
    /// 대상 계정
    pub account: &'a Account,
    /// 디버그 로깅 여부
    pub debug: bool,
}

/// watcher 생성자
pub type WatcherFactory =
    Arc<dyn Fn(MonitorContext<'_>) -> Result<Box<dyn Watcher>, VigilError> + Send + Sync>;

/// auditor 생성자
pub type AuditorFactory =
    Arc<dyn Fn(MonitorContext<'_>) -> Result<Box<dyn Auditor>, VigilError> + Send + Sync>;

/// 클로저를 [`WatcherFactory`]로 감쌉니다.
pub fn watcher_factory<F>(factory: F) -> WatcherFactory
where
    F: Fn(MonitorContext<'_>) -> Result<Box<dyn Watcher>, VigilError> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// 클로저를 [`AuditorFactory`]로 감쌉니다.
pub fn auditor_factory<F>(factory: F) -> AuditorFactory
where
    F: Fn(MonitorContext<'_>) -> Result<Box<dyn Auditor>, VigilError> + Send + Sync + 'static,
{
    Arc::new(factory)
}

/// 기술 하나의 등록 정보
#[derive(Clone)]
pub struct TechnologyRegistration {
    /// 기술 식별자
    pub technology: String,
    /// 배치 수집 지원 여부
    pub batch_support: bool,
    /// 이 기술의 auditor가 소비하는 다른 기술 목록
    pub dependencies: Vec<String>,
    /// watcher 생성자 (없으면 감사 전용 기술)
    pub watcher: Option<WatcherFactory>,
    /// auditor 생성자 목록
    pub auditors: Vec<AuditorFactory>,
}

impl TechnologyRegistration {
    /// watcher 생성자로 등록 정보를 생성합니다.
    pub fn new(technology: impl Into<String>, watcher: WatcherFactory) -> Self {
        Self {
            technology: technology.into(),
            batch_support: false,
            dependencies: Vec::new(),
            watcher: Some(watcher),
            auditors: Vec::new(),
        }
    }

    /// watcher 없이 auditor만 가진 등록 정보를 생성합니다.
    pub fn audit_only(technology: impl Into<String>) -> Self {
        Self {
            technology: technology.into(),
            batch_support: false,
            dependencies: Vec::new(),
            watcher: None,
            auditors: Vec::new(),
        }
    }

    /// 배치 지원 여부를 설정합니다.
    pub fn batch(mut self, batch_support: bool) -> Self {
        self.batch_support = batch_support;
        self
    }

    /// 의존 기술을 추가합니다.
    pub fn depends_on(mut self, technology: impl Into<String>) -> Self {
        self.dependencies.push(technology.into());
        self
    }

    /// auditor 생성자를 추가합니다.
    pub fn auditor(mut self, factory: AuditorFactory) -> Self {
        self.auditors.push(factory);
        self
    }

    /// 주어진 계정에 대한 모니터를 생성합니다.
    pub fn build(&self, ctx: MonitorContext<'_>) -> Result<Monitor, VigilError> {
        let watcher = match &self.watcher {
            Some(factory) => Some(factory(ctx)?),
            None => None,
        };
        let auditors = self
            .auditors
            .iter()
            .map(|factory| factory(ctx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Monitor {
            technology: self.technology.clone(),
            watcher,
            auditors,
            dependencies: self.dependencies.clone(),
            batch_support: self.batch_support,
        })
    }
}

impl fmt::Debug for TechnologyRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TechnologyRegistration")
            .field("technology", &self.technology)
            .field("batch_support", &self.batch_support)
            .field("dependencies", &self.dependencies)
            .field("has_watcher", &self.watcher.is_some())
            .field("auditors", &self.auditors.len())
            .finish()
    }
}

/// 기술 레지스트리
///
/// 식별자 순으로 정렬된 맵이므로 모니터 생성 순서가 결정적입니다.
#[derive(Debug, Default, Clone)]
pub struct TechnologyRegistry {
    entries: BTreeMap<String, TechnologyRegistration>,
}

impl TechnologyRegistry {
    /// 빈 레지스트리를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기술을 등록합니다. 같은 식별자가 이미 있으면 거부합니다.
    pub fn register(&mut self, registration: TechnologyRegistration) -> Result<(), VigilError> {
        if self.entries.contains_key(&registration.technology) {
            return Err(RegistryError::Duplicate(registration.technology).into());
        }
        tracing::debug!(
            technology = %registration.technology,
            batch_support = registration.batch_support,
            "technology registered"
        );
        self.entries
            .insert(registration.technology.clone(), registration);
        Ok(())
    }

    /// 등록 정보를 조회합니다.
    pub fn get(&self, technology: &str) -> Option<&TechnologyRegistration> {
        self.entries.get(technology)
    }

    /// 등록된 기술 식별자 목록
    pub fn technologies(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// 등록 정보 순회
    pub fn iter(&self) -> impl Iterator<Item = &TechnologyRegistration> {
        self.entries.values()
    }

    /// 등록된 기술 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 주어진 기술들과, 그 기술에 (전이적으로) 의존하는 모든 기술을 반환합니다.
    ///
    /// 반환 순서는 요청 기술이 먼저, 이후 발견 순서입니다.
    pub fn dependency_closure(&self, technologies: &[String]) -> Vec<String> {
        let mut closure: Vec<String> = Vec::new();
        let mut frontier: VecDeque<String> = technologies.iter().cloned().collect();

        while let Some(tech) = frontier.pop_front() {
            if closure.contains(&tech) {
                continue;
            }
            for dependent in self
                .entries
                .values()
                .filter(|r| r.dependencies.iter().any(|d| d == &tech))
            {
                if !closure.contains(&dependent.technology) {
                    frontier.push_back(dependent.technology.clone());
                }
            }
            closure.push(tech);
        }

        closure
    }
}
