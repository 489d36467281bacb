//! 도메인 타입: 계정, 리소스 아이템, 이슈, 예외 레코드
//!
//! watcher가 수집한 리소스 상태([`Item`])와 auditor가 생성한 결과([`Issue`]),
//! 그리고 모든 단계에서 실패 시 남기는 [`ExceptionRecord`]를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 계정 유형
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// AWS 계정
    #[default]
    Aws,
    /// GCP 프로젝트
    Gcp,
    /// GitHub 조직
    GitHub,
    /// 기타 사용자 정의 유형
    Other(String),
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aws => write!(f, "AWS"),
            Self::Gcp => write!(f, "GCP"),
            Self::GitHub => write!(f, "GitHub"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// 관리 대상 클라우드 계정
///
/// 외부 인벤토리 시스템이 생성/관리합니다.
/// 스케줄러는 `active && !third_party`인 계정만 읽습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// 계정 이름 (식별자)
    pub name: String,
    /// 계정 유형
    #[serde(default)]
    pub account_type: AccountType,
    /// 활성 여부
    #[serde(default = "default_true")]
    pub active: bool,
    /// 제3자 계정 여부
    #[serde(default)]
    pub third_party: bool,
}

fn default_true() -> bool {
    true
}

impl Account {
    /// 활성 상태의 1st-party 계정을 생성합니다.
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            name: name.into(),
            account_type,
            active: true,
            third_party: false,
        }
    }

    /// 스케줄링 대상인지 확인합니다.
    pub fn is_schedulable(&self) -> bool {
        self.active && !self.third_party
    }
}

/// 수집된 리소스 아이템
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// 기술 식별자 (예: `"s3"`)
    pub technology: String,
    /// 계정 이름
    pub account: String,
    /// 리전
    pub region: String,
    /// 리소스 이름
    pub name: String,
    /// 리소스 설정 원본
    pub config: serde_json::Value,
}

impl Item {
    /// 계정/기술 범위에서 아이템을 구분하는 키 (`region/name`)
    pub fn key(&self) -> String {
        format!("{}/{}", self.region, self.name)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.technology, self.account, self.region, self.name
        )
    }
}

/// 수집 범위 키
///
/// `(technology, account, region, name...)` 순서의 튜플입니다.
/// 세 번째 요소가 있으면 리전으로 해석합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScopeKey(pub Vec<String>);

impl ScopeKey {
    /// 문자열 조각들로 범위 키를 생성합니다.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// 리전 요소를 반환합니다 (세 번째 요소).
    pub fn region(&self) -> Option<&str> {
        self.0.get(2).map(String::as_str)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// 수집 범위별 예외 맵
pub type ExceptionMap = BTreeMap<ScopeKey, String>;

/// 한 번의 fetch 결과
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// 수집된 아이템
    pub items: Vec<Item>,
    /// 실패한 수집 범위
    pub exceptions: ExceptionMap,
}

impl FetchResult {
    /// 예외 없는 결과를 생성합니다.
    pub fn ok(items: Vec<Item>) -> Self {
        Self {
            items,
            exceptions: ExceptionMap::new(),
        }
    }
}

/// auditor가 생성한 보안 이슈
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    /// 기술 식별자
    pub technology: String,
    /// 계정 이름
    pub account: String,
    /// 대상 아이템 키
    pub item: String,
    /// 이슈 요약
    pub issue: String,
    /// 점수 (높을수록 심각)
    pub score: u32,
    /// 부가 설명
    pub notes: Option<String>,
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.score, self.item, self.issue)
    }
}

/// auditor 리포트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// 기술 식별자
    pub technology: String,
    /// 계정 이름
    pub account: String,
    /// 포함된 이슈 수
    pub issue_count: usize,
    /// 렌더링된 본문
    pub body: String,
}

/// 영속화된 실패 레코드
///
/// 어떤 단계에서든 실패가 포착되면 생성되고,
/// TTL이 지나면 exception janitor가 삭제합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionRecord {
    /// 실패 단계 태그 (예: `"scheduler-audit-changes"`)
    pub source: String,
    /// 관련 엔티티 식별자
    pub entity_id: Option<String>,
    /// 에러 종류
    pub error_kind: String,
    /// 에러 메시지
    pub message: String,
    /// 발생 시각
    pub occurred_at: DateTime<Utc>,
    /// 만료 시각
    pub expires_at: DateTime<Utc>,
}

impl ExceptionRecord {
    /// 현재 시각 기준으로 TTL을 적용한 레코드를 생성합니다.
    pub fn new(
        source: impl Into<String>,
        entity_id: Option<String>,
        error_kind: impl Into<String>,
        message: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let occurred_at = Utc::now();
        Self {
            source: source.into(),
            entity_id,
            error_kind: error_kind.into(),
            message: message.into(),
            occurred_at,
            expires_at: occurred_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// 주어진 시각 기준으로 만료되었는지 확인합니다.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
