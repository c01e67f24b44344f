//! 시장 데이터 계층의 공통 에러 타입.

use thiserror::Error;

/// 핵심 도메인 에러.
#[derive(Debug, Error)]
pub enum MarketError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 잘못된 입력 (심볼, 간격 등)
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),
}

/// 도메인 작업을 위한 Result 타입.
pub type MarketResult<T> = Result<T, MarketError>;

impl MarketError {
    /// 호출자가 입력을 고쳐 다시 시도할 수 있는 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(self, MarketError::InvalidInput(_))
    }
}

impl From<serde_json::Error> for MarketError {
    fn from(err: serde_json::Error) -> Self {
        MarketError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for MarketError {
    fn from(err: config::ConfigError) -> Self {
        MarketError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error() {
        let err = MarketError::InvalidInput("interval".to_string());
        assert!(err.is_client_error());

        let err = MarketError::Config("missing".to_string());
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_from_serde_error() {
        let parse = serde_json::from_str::<u32>("not-a-number").unwrap_err();
        let err: MarketError = parse.into();
        assert!(matches!(err, MarketError::Serialization(_)));
    }
}
