//! 차트용 캔들.

use serde::{Deserialize, Serialize};

use super::market::KlineBar;
use crate::error::{MarketError, MarketResult};

/// 차트 라이브러리가 소비하는 숫자형 캔들.
///
/// `time`은 epoch 초 단위입니다. 캔들 프록시 응답 행이면서
/// 진행 중 캔들의 "마지막 봉 갱신" 입력이기도 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandleBar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl CandleBar {
    /// 밀리초 시각과 문자열 OHLCV로 캔들을 만듭니다.
    pub fn from_parts(
        open_time_ms: i64,
        open: &str,
        high: &str,
        low: &str,
        close: &str,
        volume: &str,
    ) -> MarketResult<Self> {
        Ok(Self {
            time: open_time_ms / 1000,
            open: parse_number("open", open)?,
            high: parse_number("high", high)?,
            low: parse_number("low", low)?,
            close: parse_number("close", close)?,
            volume: parse_number("volume", volume)?,
        })
    }
}

fn parse_number(field: &str, raw: &str) -> MarketResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| MarketError::Serialization(format!("{field} 값을 숫자로 변환할 수 없음: {raw}")))
}

impl KlineBar {
    /// 진행 중 캔들을 차트용 숫자형 캔들로 변환합니다.
    pub fn to_candle(&self) -> MarketResult<CandleBar> {
        CandleBar::from_parts(
            self.start_time,
            &self.open,
            &self.high,
            &self.low,
            &self.close,
            &self.volume,
        )
    }
}
