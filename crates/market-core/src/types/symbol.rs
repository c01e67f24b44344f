//! 거래 심볼.
//!
//! 바이낸스 현물 심볼은 기준 자산과 호가 자산을 구분자 없이 붙인 대문자 문자열입니다
//! (예: `BTCUSDT`). 스트림 이름에는 소문자 형태를 사용합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MarketError;

/// 정규화된 거래 심볼.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// 문자열을 검증하고 대문자로 정규화합니다.
    ///
    /// 비어 있거나 영숫자 이외의 문자가 포함되면 에러를 반환합니다.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MarketError::InvalidInput("심볼이 비어 있습니다".to_string()));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MarketError::InvalidInput(format!("잘못된 심볼: {trimmed}")));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    /// 대문자 심볼 문자열.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 스트림 이름에 사용하는 소문자 형태 (예: `btcusdt`).
    pub fn stream_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// 주어진 호가 자산 중 하나로 끝나는지 확인합니다.
    pub fn quoted_in<S: AsRef<str>>(&self, quotes: &[S]) -> bool {
        quotes
            .iter()
            .any(|q| self.0.len() > q.as_ref().len() && self.0.ends_with(q.as_ref()))
    }
}

impl FromStr for Symbol {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Symbol {
    type Error = MarketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalizes_case() {
        let symbol = Symbol::parse(" btcusdt ").unwrap();
        assert_eq!(symbol.as_str(), "BTCUSDT");
        assert_eq!(symbol.stream_name(), "btcusdt");
        assert_eq!(symbol.to_string(), "BTCUSDT");
    }

    #[test]
    fn test_symbol_rejects_garbage() {
        assert!(Symbol::parse("").is_err());
        assert!(Symbol::parse("BTC/USDT").is_err());
        assert!(Symbol::parse("btc@trade").is_err());
    }

    #[test]
    fn test_quoted_in() {
        let symbol = Symbol::parse("ETHBTC").unwrap();
        assert!(symbol.quoted_in(&["USDT", "BTC"]));
        assert!(!symbol.quoted_in(&["USDT"]));
        // 호가 자산 자체는 심볼이 아님
        assert!(!Symbol::parse("BTC").unwrap().quoted_in(&["BTC"]));
    }

    #[test]
    fn test_serde_roundtrip_normalizes() {
        let symbol: Symbol = serde_json::from_str("\"solusdt\"").unwrap();
        assert_eq!(symbol.as_str(), "SOLUSDT");
        assert!(serde_json::from_str::<Symbol>("\"a b\"").is_err());
    }
}
