//! Binance-specific configuration constants and types.

use std::time::Duration;

pub struct BinanceApiConfig {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

impl Default for BinanceApiConfig {
    fn default() -> Self {
        Self {
            timeout_ms: BINANCE.client.timeout_ms,
            retries: BINANCE.client.retries,
            backoff_ms: BINANCE.client.backoff_ms,
        }
    }
}

/// REST constraints: 1000 klines per call and how many window fetches may be in flight.
pub struct RestLimits {
    pub klines_limit: i32,
    pub concurrent_window_fetches: usize,
}

pub struct ClientDefaults {
    pub timeout_ms: u64,
    /// Zero: each window is fetched exactly once. Callers wanting retries wrap the client.
    pub retries: u32,
    pub backoff_ms: u64,
}

/// Quote assets we accept as a symbol suffix.
pub const BINANCE_QUOTE_ASSETS: &[&str] = &[
    "FDUSD", "USDT", "USDC", "TUSD", "BUSD", "BTC", "ETH", "BNB", "EUR", "TRY", "BRL", "JPY",
];

pub struct BinanceConfig {
    pub limits: RestLimits,
    pub client: ClientDefaults,
}

pub const BINANCE: BinanceConfig = BinanceConfig {
    limits: RestLimits {
        klines_limit: 1000,
        concurrent_window_fetches: 10,
    },
    client: ClientDefaults {
        timeout_ms: 5000,
        retries: 0,
        backoff_ms: 0,
    },
};

/// Runtime knobs for [`crate::data::MarketDataClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Max candles per request (Binance caps at 1000).
    pub limit: i32,
    pub max_concurrent: usize,
    /// Hard ceiling on a single window fetch, including the SDK's own timeout.
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            limit: BINANCE.limits.klines_limit,
            max_concurrent: BINANCE.limits.concurrent_window_fetches,
            request_timeout: Duration::from_millis(BINANCE.client.timeout_ms * 2),
        }
    }
}
