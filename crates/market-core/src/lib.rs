//! # Market Core
//!
//! 실시간 시세 대시보드의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 동기화 계층 전반에서 사용되는 기본 타입을 제공합니다:
//! - 심볼 단위 시장 뷰 모델 (24h 통계, 호가, 체결 테이프, 진행 중 캔들)
//! - 전체 시장 미니 티커 맵
//! - 연결 상태
//! - 캔들 간격 및 심볼 정의
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
