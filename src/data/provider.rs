use async_trait::async_trait;

use crate::{
    domain::{Candle, FetchWindow},
    error::Result,
};

/// Abstract interface for fetching market data.
///
/// One call is one klines request: at most `limit` candles inside `window`, in the order the
/// source returns them. Implementations do not retry.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_klines(&self, window: &FetchWindow, limit: i32) -> Result<Vec<Candle>>;
}
