//! tracing 기반 로깅 초기화.
//!
//! 출력 형식은 세 가지입니다:
//! - **pretty**: 개발용
//! - **json**: 로그 수집기용
//! - **compact**: 한 줄 요약

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::Registry,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;
use crate::error::{MarketError, MarketResult};

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 사람이 읽기 쉬운 여러 줄 형식
    #[default]
    Pretty,
    /// JSON 한 줄 형식
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(MarketError::Config(format!("알 수 없는 로그 형식: {other}"))),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 필터 지시자 (예: "info", "market_sync=debug")
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// span 생성/종료 이벤트 기록 여부
    pub with_span_events: bool,
    /// 파일명/줄 번호 포함 여부
    pub with_file: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_file: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.with_span_events = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    /// 애플리케이션 설정의 `[logging]` 섹션에서 생성합니다.
    ///
    /// 형식 문자열이 잘못되면 pretty로 대체합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        Self {
            level: settings.level.clone(),
            format: settings.format.parse().unwrap_or_default(),
            ..Default::default()
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.with_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_file)
            .with_target(true)
            .with_span_events(self.span_events());

        match self.format {
            LogFormat::Pretty => base.pretty().boxed(),
            LogFormat::Json => base.json().boxed(),
            LogFormat::Compact => base.compact().boxed(),
        }
    }
}

/// 전역 subscriber를 설치합니다.
///
/// `RUST_LOG`가 설정되어 있으면 설정 파일의 레벨보다 우선합니다.
/// 이미 설치된 경우 에러를 반환합니다.
pub fn init_logging(config: LogConfig) -> MarketResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| MarketError::Config(format!("로그 필터 파싱 실패: {e}")))?;

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(filter)
        .try_init()
        .map_err(|e| MarketError::Config(format!("로깅 초기화 실패: {e}")))?;

    tracing::info!(format = ?config.format, level = %config.level, "로깅 초기화 완료");
    Ok(())
}

/// 심볼 동기화 작업용 span을 생성합니다.
///
/// 세대 번호를 넘기면 같은 심볼의 재구독을 로그에서 구분할 수 있습니다.
#[macro_export]
macro_rules! market_span {
    ($name:expr, $symbol:expr) => {
        tracing::info_span!($name, symbol = %$symbol)
    };
    ($name:expr, $symbol:expr, $generation:expr) => {
        tracing::info_span!($name, symbol = %$symbol, generation = $generation)
    };
}
