//! 설정 관리: vigil.toml 파싱 및 런타임 설정
//!
//! [`VigilConfig`]는 데몬과 스케줄러가 사용하는 모든 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`VIGIL_SCHEDULER_MAX_ATTEMPTS=2` 형식)
//! 3. 설정 파일 (`vigil.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), vigil_core::error::VigilError> {
//! use vigil_core::config::VigilConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = VigilConfig::load("vigil.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = VigilConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, VigilError};
use crate::types::Account;

/// 작업 하나당 허용되는 최대 시도 횟수 (첫 시도 포함)
pub const MAX_TASK_ATTEMPTS: u32 = 3;

/// 예외 레코드 보존 기간 상한 (일)
pub const MAX_EXCEPTION_TTL_DAYS: u32 = 36_500;

/// 기술 수집 주기 상한 (분, 1년)
pub const MAX_INTERVAL_MINUTES: u64 = 525_600;

/// Vigil 통합 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 스케줄러 설정
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// 이슈 트래커 동기화 설정
    #[serde(default)]
    pub issue_sync: IssueSyncConfig,
    /// 계정 인벤토리
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// 기술 정의
    #[serde(default)]
    pub technologies: Vec<TechnologyConfig>,
}

impl VigilConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, VigilError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VigilError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                VigilError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, VigilError> {
        toml::from_str(toml_str).map_err(|e| {
            VigilError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `VIGIL_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "VIGIL_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "VIGIL_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "VIGIL_GENERAL_DATA_DIR");
        override_bool(&mut self.general.debug, "VIGIL_GENERAL_DEBUG");

        // Scheduler
        override_u32(
            &mut self.scheduler.max_attempts,
            "VIGIL_SCHEDULER_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.scheduler.retry_backoff_ms,
            "VIGIL_SCHEDULER_RETRY_BACKOFF_MS",
        );
        override_string(&mut self.scheduler.audit_cron, "VIGIL_SCHEDULER_AUDIT_CRON");
        override_string(
            &mut self.scheduler.janitor_cron,
            "VIGIL_SCHEDULER_JANITOR_CRON",
        );
        override_usize(
            &mut self.scheduler.worker_concurrency,
            "VIGIL_SCHEDULER_WORKER_CONCURRENCY",
        );
        override_u32(
            &mut self.scheduler.exception_ttl_days,
            "VIGIL_SCHEDULER_EXCEPTION_TTL_DAYS",
        );

        // Metrics
        override_bool(&mut self.metrics.enabled, "VIGIL_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "VIGIL_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "VIGIL_METRICS_PORT");

        // Issue sync
        override_bool(&mut self.issue_sync.enabled, "VIGIL_ISSUE_SYNC_ENABLED");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), VigilError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        self.scheduler.validate()?;

        // 계정 이름 중복 검증
        let mut account_names = BTreeSet::new();
        for account in &self.accounts {
            if account.name.is_empty() {
                return Err(invalid("accounts.name", "must not be empty".to_owned()));
            }
            if !account_names.insert(account.name.as_str()) {
                return Err(invalid(
                    "accounts.name",
                    format!("duplicate account '{}'", account.name),
                ));
            }
        }

        // 기술 정의 검증
        let declared: BTreeSet<&str> = self.technologies.iter().map(|t| t.name.as_str()).collect();
        if declared.len() != self.technologies.len() {
            return Err(invalid(
                "technologies.name",
                "technology names must be unique".to_owned(),
            ));
        }
        for tech in &self.technologies {
            if tech.name.is_empty() {
                return Err(invalid("technologies.name", "must not be empty".to_owned()));
            }
            if tech.interval_minutes == 0 || tech.interval_minutes > MAX_INTERVAL_MINUTES {
                return Err(invalid(
                    "technologies.interval_minutes",
                    format!(
                        "'{}' must have an interval of 1-{MAX_INTERVAL_MINUTES} minutes",
                        tech.name
                    ),
                ));
            }
            for dep in &tech.dependencies {
                if !declared.contains(dep.as_str()) {
                    return Err(invalid(
                        "technologies.dependencies",
                        format!("'{}' depends on undeclared technology '{dep}'", tech.name),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> VigilError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// watcher/auditor 디버그 모드
    pub debug: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/vigil".to_owned(),
            debug: false,
        }
    }
}

/// 스케줄러 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 작업 하나당 최대 시도 횟수 (첫 시도 포함, 1-3)
    pub max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초, 시도 횟수에 비례)
    pub retry_backoff_ms: u64,
    /// 감사 전용 안전망 실행 시각 (7필드 cron, UTC)
    pub audit_cron: String,
    /// 만료 예외 정리 시각 (7필드 cron, UTC)
    pub janitor_cron: String,
    /// 동시에 실행 가능한 작업 수
    pub worker_concurrency: usize,
    /// 예외 레코드 보존 기간 (일)
    pub exception_ttl_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_TASK_ATTEMPTS,
            retry_backoff_ms: 1_000,
            audit_cron: "0 0 10 * * Mon-Fri *".to_owned(),
            janitor_cron: "0 0 3 * * * *".to_owned(),
            worker_concurrency: 8,
            exception_ttl_days: 10,
        }
    }
}

impl SchedulerConfig {
    /// 스케줄러 설정을 검증합니다.
    pub fn validate(&self) -> Result<(), VigilError> {
        if self.max_attempts == 0 || self.max_attempts > MAX_TASK_ATTEMPTS {
            return Err(invalid(
                "scheduler.max_attempts",
                format!("must be 1-{MAX_TASK_ATTEMPTS}"),
            ));
        }
        if self.worker_concurrency == 0 {
            return Err(invalid(
                "scheduler.worker_concurrency",
                "must be greater than 0".to_owned(),
            ));
        }
        if self.exception_ttl_days == 0 || self.exception_ttl_days > MAX_EXCEPTION_TTL_DAYS {
            return Err(invalid(
                "scheduler.exception_ttl_days",
                format!("must be 1-{MAX_EXCEPTION_TTL_DAYS}"),
            ));
        }
        for (field, expr) in [
            ("scheduler.audit_cron", &self.audit_cron),
            ("scheduler.janitor_cron", &self.janitor_cron),
        ] {
            if let Err(e) = cron::Schedule::from_str(expr) {
                return Err(invalid(field, format!("invalid cron expression '{expr}': {e}")));
            }
        }
        Ok(())
    }
}

/// 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus 엔드포인트 활성화 여부
    pub enabled: bool,
    /// 바인딩 주소
    pub listen_addr: String,
    /// 포트
    pub port: u16,
    /// 엔드포인트 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9108,
            endpoint: "/metrics".to_owned(),
        }
    }
}

/// 이슈 트래커 동기화 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueSyncConfig {
    /// 동기화 활성화 여부
    pub enabled: bool,
}

/// 파일 기반 스냅샷 기술 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechnologyConfig {
    /// 기술 식별자
    pub name: String,
    /// 로그용 복수형 이름
    #[serde(default)]
    pub plural: String,
    /// 수집 주기 (분)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// 페이지 크기 (0이면 비배치 기술)
    #[serde(default)]
    pub batch_size: usize,
    /// 이 기술의 규칙이 소비하는 다른 기술
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// 아이템 JSON 파일 루트 (`<source_dir>/<account>/*.json`)
    #[serde(default)]
    pub source_dir: String,
    /// 감사 규칙
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

fn default_interval_minutes() -> u64 {
    15
}

impl TechnologyConfig {
    /// 배치 기술인지 확인합니다.
    pub fn is_batch(&self) -> bool {
        self.batch_size > 0
    }
}

/// 단순 동등 비교 감사 규칙
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// 검사할 설정 키 (최상위 JSON 키)
    pub key: String,
    /// 이 값과 같으면 이슈 생성
    pub equals: serde_json::Value,
    /// 이슈 점수
    #[serde(default = "default_score")]
    pub score: u32,
    /// 이슈 요약
    pub issue: String,
}

fn default_score() -> u32 {
    1
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    override_parsed(target, env_key, "bool");
}

fn override_usize(target: &mut usize, env_key: &str) {
    override_parsed(target, env_key, "usize");
}

fn override_u16(target: &mut u16, env_key: &str) {
    override_parsed(target, env_key, "u16");
}

fn override_u32(target: &mut u32, env_key: &str) {
    override_parsed(target, env_key, "u32");
}

fn override_u64(target: &mut u64, env_key: &str) {
    override_parsed(target, env_key, "u64");
}

fn override_parsed<T: FromStr>(target: &mut T, env_key: &str, type_name: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<T>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                expected = type_name,
                "failed to parse env var, ignoring"
            ),
        }
    }
}
