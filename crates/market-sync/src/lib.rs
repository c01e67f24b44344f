//! # Market Sync
//!
//! 실시간 시세 동기화 계층.
//!
//! - [`MarketSynchronizer`]: 심볼 하나의 REST 스냅샷 + 결합 스트림을 하나의 뷰 모델로 유지
//! - [`TickerStream`]: 전체 시장 미니 티커를 구독 심볼 집합으로 걸러 재발행
//! - [`SubscriptionRegistry`]: 심볼당 동기화기 하나를 여러 소비자가 공유
//! - [`MarketPage`]: 활성 심볼 하나를 가진 페이지 단위 구독
//!
//! 모든 발행 값은 불변 스냅샷이며 `tokio::sync::watch`로 전달됩니다.

pub mod error;
pub mod publisher;
pub mod registry;
pub mod settings;
pub mod synchronizer;
pub mod ticker_stream;

pub use error::{SyncError, SyncResult};
pub use publisher::{FeedPublisher, MarketFeed};
pub use registry::{MarketHandle, MarketPage, SubscriptionRegistry};
pub use settings::{SyncDeps, SyncSettings};
pub use synchronizer::MarketSynchronizer;
pub use ticker_stream::{TickerFeed, TickerStream};
