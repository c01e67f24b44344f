//! 푸시 프로토콜과 재연결 소켓 채널.

pub mod backoff;
pub mod channel;
pub mod connection;
pub mod messages;

pub use backoff::{BackoffPolicy, ReconnectDecision, ReconnectState};
pub use channel::{ChannelExit, ChannelHandler, ReconnectingChannel};
pub use connection::{Connection, Transport, TungsteniteTransport};
pub use messages::*;
