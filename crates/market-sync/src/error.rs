//! 동기화 에러.
//!
//! 소비자에게는 표시 문자열만 전달됩니다 (`MarketFeed::error`).

use thiserror::Error;

use market_exchange::ExchangeError;

#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// 소켓을 열기 전 REST 스냅샷 실패. 재구독으로 복구 가능.
    #[error("초기 데이터를 가져오지 못했습니다: {0}")]
    SnapshotFetchFailed(String),

    /// 전송 계층 에러. 백오프에 따라 재연결합니다.
    #[error("연결 에러: {0}")]
    ChannelError(String),

    /// 재연결 한도 초과. 해당 구독은 종료됩니다.
    #[error("여러 번 재연결에 실패했습니다")]
    ChannelClosedPermanently,

    /// 페이로드 형식 오류. 해당 메시지만 버립니다.
    #[error("잘못된 메시지: {0}")]
    MalformedMessage(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// 재구독 없이는 복구되지 않는 에러인지 확인.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SnapshotFetchFailed(_) | SyncError::ChannelClosedPermanently
        )
    }

    pub fn snapshot(err: ExchangeError) -> Self {
        SyncError::SnapshotFetchFailed(err.to_string())
    }
}
