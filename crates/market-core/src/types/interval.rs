//! 캔들 간격.
//!
//! 차트 UI는 축약형(`1`, `60`, `D`)과 이름형(`1m`, `1h`, `1d`)을 섞어 보내므로
//! 요청 파싱은 두 어휘를 모두 받아 바이낸스 간격으로 정규화합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 캔들스틱 간격.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1초봉 (스트림 전용)
    S1,
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
    /// 월봉
    MN1,
}

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

impl Interval {
    /// 간격의 길이. 월봉은 30일 근사값입니다.
    pub fn duration(&self) -> Duration {
        let secs = match self {
            Interval::S1 => 1,
            Interval::M1 => MINUTE,
            Interval::M3 => 3 * MINUTE,
            Interval::M5 => 5 * MINUTE,
            Interval::M15 => 15 * MINUTE,
            Interval::M30 => 30 * MINUTE,
            Interval::H1 => HOUR,
            Interval::H2 => 2 * HOUR,
            Interval::H4 => 4 * HOUR,
            Interval::H6 => 6 * HOUR,
            Interval::H8 => 8 * HOUR,
            Interval::H12 => 12 * HOUR,
            Interval::D1 => DAY,
            Interval::D3 => 3 * DAY,
            Interval::W1 => 7 * DAY,
            Interval::MN1 => 30 * DAY,
        };
        Duration::from_secs(secs)
    }

    /// 바이낸스 간격 문자열.
    pub fn to_binance_interval(&self) -> &'static str {
        match self {
            Interval::S1 => "1s",
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::H8 => "8h",
            Interval::H12 => "12h",
            Interval::D1 => "1d",
            Interval::D3 => "3d",
            Interval::W1 => "1w",
            Interval::MN1 => "1M",
        }
    }

    /// 바이낸스 간격 문자열에서 파싱합니다. 대소문자를 구분합니다 (`1m` ≠ `1M`).
    pub fn from_binance_interval(s: &str) -> Option<Self> {
        Some(match s {
            "1s" => Interval::S1,
            "1m" => Interval::M1,
            "3m" => Interval::M3,
            "5m" => Interval::M5,
            "15m" => Interval::M15,
            "30m" => Interval::M30,
            "1h" => Interval::H1,
            "2h" => Interval::H2,
            "4h" => Interval::H4,
            "6h" => Interval::H6,
            "8h" => Interval::H8,
            "12h" => Interval::H12,
            "1d" => Interval::D1,
            "3d" => Interval::D3,
            "1w" => Interval::W1,
            "1M" => Interval::MN1,
            _ => return None,
        })
    }

    /// 클라이언트 요청의 간격 값을 파싱합니다.
    ///
    /// 축약형(분 단위 숫자, `D`/`W`/`M`)과 이름형을 모두 받습니다.
    /// `1s` 요청은 과거 데이터가 빈약하므로 1분봉으로 대체합니다.
    pub fn parse_request(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let shorthand = match raw {
            "1" => Some(Interval::M1),
            "3" => Some(Interval::M3),
            "5" => Some(Interval::M5),
            "15" => Some(Interval::M15),
            "30" => Some(Interval::M30),
            "60" => Some(Interval::H1),
            "120" => Some(Interval::H2),
            "240" => Some(Interval::H4),
            "360" => Some(Interval::H6),
            "480" => Some(Interval::H8),
            "720" => Some(Interval::H12),
            "D" | "1D" => Some(Interval::D1),
            "3D" => Some(Interval::D3),
            "W" | "1W" => Some(Interval::W1),
            "M" => Some(Interval::MN1),
            "1s" => Some(Interval::M1),
            _ => None,
        };

        shorthand.or_else(|| Self::from_binance_interval(raw))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_binance_interval())
    }
}
