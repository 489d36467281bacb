//! 에러 타입: 도메인별 에러 정의
//!
//! [`VigilError`]는 모든 크레이트가 공유하는 최상위 에러입니다.
//! 스케줄러는 [`VigilError::is_transient_storage`]로 일시적 스토리지 장애를
//! 구분하여 세션 초기화 및 재시도 여부를 결정합니다.

/// Vigil 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum VigilError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 스토리지(영속성 계층) 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 리소스 수집(watcher) 에러
    #[error("collect error: {0}")]
    Collect(#[from] CollectError),

    /// 규칙 평가(auditor) 에러
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),

    /// 기술/모니터 레지스트리 에러
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// 스케줄러 에러
    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VigilError {
    /// 일시적 스토리지 장애(operational / connection / statement)인지 확인합니다.
    ///
    /// 이 분류에 해당하면 호출자는 반드시 세션을 폐기해야 합니다.
    pub fn is_transient_storage(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_transient())
    }

    /// 예외 기록에 사용할 짧은 에러 종류명을 반환합니다.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Collect(_) => "collect",
            Self::Audit(_) => "audit",
            Self::Registry(_) => "registry",
            Self::Scheduler(_) => "scheduler",
            Self::Io(_) => "io",
        }
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 스토리지 에러
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 운영 중 장애 (락 타임아웃, 서버 재시작 등)
    #[error("operational fault: {0}")]
    Operational(String),

    /// 연결 실패 또는 끊어진 연결
    #[error("connection failed: {0}")]
    Connection(String),

    /// 구문 실행 실패 (무효화된 트랜잭션 포함)
    #[error("statement failed: {0}")]
    Statement(String),

    /// 쿼리 실패 (재시도해도 같은 결과)
    #[error("query failed: {0}")]
    Query(String),

    /// 대상 레코드 없음
    #[error("record not found: {0}")]
    NotFound(String),
}

impl StorageError {
    /// 세션 폐기가 필요한 일시적 장애인지 확인합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Operational(_) | Self::Connection(_) | Self::Statement(_)
        )
    }
}

/// 리소스 수집 에러
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// 수집 실패
    #[error("fetch failed for {technology}: {reason}")]
    Fetch { technology: String, reason: String },

    /// 배치 수집을 지원하지 않는 watcher에 배치 연산 요청
    #[error("technology '{technology}' does not support batch fetching")]
    BatchUnsupported { technology: String },
}

/// 규칙 평가 에러
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// 규칙 평가 실패
    #[error("evaluation failed for {technology}: {reason}")]
    Evaluation { technology: String, reason: String },

    /// 리포트 생성/전송 실패
    #[error("report delivery failed for {technology}: {reason}")]
    Report { technology: String, reason: String },

    /// 외부 이슈 트래커 동기화 실패
    #[error("issue sync failed for {technology}: {reason}")]
    IssueSync { technology: String, reason: String },
}

/// 기술/모니터 레지스트리 에러
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// 등록되지 않은 기술
    #[error("unknown technology: {0}")]
    UnknownTechnology(String),

    /// 인벤토리에 없는 계정
    #[error("unknown account: {0}")]
    UnknownAccount(String),

    /// 중복 등록
    #[error("technology already registered: {0}")]
    Duplicate(String),

    /// watcher/auditor 생성 실패
    #[error("failed to construct {technology}: {reason}")]
    Construction { technology: String, reason: String },
}

/// 스케줄러 에러
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// 재시도 횟수 소진
    #[error("task {task} failed after {attempts} attempt(s): {reason}")]
    RetriesExhausted {
        task: String,
        attempts: u32,
        reason: String,
    },

    /// 유효하지 않은 시각 스케줄 표현식
    #[error("invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    /// 작업 등록 실패
    #[error("task registration failed: {0}")]
    Registration(String),

    /// 큐가 이미 종료됨
    #[error("task queue is closed")]
    QueueClosed,
}
