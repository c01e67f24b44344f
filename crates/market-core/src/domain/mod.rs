//! 시세 동기화 계층의 도메인 모델.

mod candle;
mod connection;
mod market;
mod ticker;

pub use candle::*;
pub use connection::*;
pub use market::*;
pub use ticker::*;
