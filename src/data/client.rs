use std::{sync::Arc, time::Duration};

use {
    chrono::{DateTime, Utc},
    futures::future::join_all,
    serde::Serialize,
    tokio::sync::Semaphore,
};

use crate::{
    config::{ClientConfig, DF},
    data::{BinanceProvider, MarketDataProvider, assembler::assemble_candles},
    domain::{Candle, FetchWindow, Market, plan_windows},
    error::{KlineError, Result},
    models::Series,
    utils::now_timestamp_ms,
};

/// A sub-window that produced no data, and why.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingWindow {
    pub window: FetchWindow,
    pub reason: String,
}

/// Result of a windowed fetch: whatever could be assembled, plus the gaps.
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedFetch {
    pub series: Series,
    pub missing: Vec<MissingWindow>,
}

impl PaginatedFetch {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Klines client. Cheap to clone; clones share the provider and the in-flight request cap.
#[derive(Clone)]
pub struct MarketDataClient {
    provider: Arc<dyn MarketDataProvider>,
    config: ClientConfig,
    /// `config.max_concurrent` permits across every fetch made through this client.
    in_flight: Arc<Semaphore>,
}

impl MarketDataClient {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: ClientConfig) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            provider,
            config,
            in_flight,
        }
    }

    /// Client over the live Binance Spot API with default limits.
    pub fn binance() -> Result<Self> {
        Ok(Self::new(
            Arc::new(BinanceProvider::new()?),
            ClientConfig::default(),
        ))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// One request. With no bounds the exchange returns its most recent `limit` candles.
    pub async fn fetch(
        &self,
        symbol: &str,
        interval: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Series> {
        let market = Market::parse(symbol, interval)?;
        let start_ms = start.map(|t| t.timestamp_millis());
        let end_ms = end.map(|t| t.timestamp_millis());
        if let (Some(s), Some(e)) = (start_ms, end_ms)
            && s > e
        {
            return Err(KlineError::validation(format!(
                "start {} is after end {}",
                s, e
            )));
        }
        self.fetch_market(&market, start_ms, end_ms).await
    }

    pub async fn fetch_market(
        &self,
        market: &Market,
        start_ms: Option<i64>,
        end_ms: Option<i64>,
    ) -> Result<Series> {
        let window = FetchWindow::new(market.clone(), start_ms, end_ms);
        let candles = limited_fetch(
            self.provider.clone(),
            self.in_flight.clone(),
            window,
            self.config.limit,
            self.config.request_timeout,
        )
        .await?;
        assemble_candles(market.clone(), candles)
    }

    /// Everything from `start` up to `end` (or now), split into windows fetched concurrently.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<PaginatedFetch> {
        let market = Market::parse(symbol, interval)?;
        self.fetch_market_range(
            &market,
            start.timestamp_millis(),
            end.map(|t| t.timestamp_millis()),
        )
        .await
    }

    /// `fetch_range` up to now.
    pub async fn fetch_paginated(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
    ) -> Result<PaginatedFetch> {
        self.fetch_range(symbol, interval, start, None).await
    }

    pub async fn fetch_market_range(
        &self,
        market: &Market,
        start_ms: i64,
        end_ms: Option<i64>,
    ) -> Result<PaginatedFetch> {
        let windows = plan_windows(
            market,
            start_ms,
            end_ms,
            now_timestamp_ms(),
            self.config.limit,
        )?;
        if DF.log_windows {
            log::info!("{}: {} windows planned", market, windows.len());
        }

        let results = crate::trace_time!(&format!("Fetch windows [{}]", market), 2_000_000, {
            self.scatter(&windows).await
        });
        gather(market, windows, results)
    }

    /// One task per window. The client-wide semaphore bounds how many are in flight.
    async fn scatter(&self, windows: &[FetchWindow]) -> Vec<Result<Vec<Candle>>> {
        let handles = windows.iter().cloned().map(|window| {
            tokio::spawn(limited_fetch(
                Arc::clone(&self.provider),
                Arc::clone(&self.in_flight),
                window,
                self.config.limit,
                self.config.request_timeout,
            ))
        });

        join_all(handles)
            .await
            .into_iter()
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => Err(KlineError::data_source(None, format!("fetch task died: {}", e))),
            })
            .collect()
    }
}

/// Waits for a permit, then fetches. Time spent queued does not count against `timeout`.
async fn limited_fetch(
    provider: Arc<dyn MarketDataProvider>,
    in_flight: Arc<Semaphore>,
    window: FetchWindow,
    limit: i32,
    timeout: Duration,
) -> Result<Vec<Candle>> {
    let _permit = in_flight
        .acquire_owned()
        .await
        .map_err(|e| KlineError::data_source(None, e.to_string()))?;
    fetch_window(provider.as_ref(), &window, limit, timeout).await
}

async fn fetch_window(
    provider: &dyn MarketDataProvider,
    window: &FetchWindow,
    limit: i32,
    timeout: Duration,
) -> Result<Vec<Candle>> {
    match tokio::time::timeout(timeout, provider.fetch_klines(window, limit)).await {
        Ok(result) => result,
        Err(_) => Err(KlineError::data_source(
            None,
            format!("{} timed out after {:?}", window, timeout),
        )),
    }
}

/// Pair each window with its result and merge the successes. Fails only when nothing came back.
fn gather(
    market: &Market,
    windows: Vec<FetchWindow>,
    results: Vec<Result<Vec<Candle>>>,
) -> Result<PaginatedFetch> {
    let total = windows.len();
    let mut candles = Vec::new();
    let mut missing = Vec::new();
    let mut first_failure: Option<KlineError> = None;

    for (window, result) in windows.into_iter().zip(results) {
        match result {
            Ok(batch) => {
                if DF.log_windows {
                    log::info!("{} ok ({} candles)", window, batch.len());
                }
                candles.extend(batch);
            }
            Err(e) => {
                log::warn!("{} failed: {}", window, e);
                missing.push(MissingWindow {
                    window,
                    reason: e.to_string(),
                });
                first_failure.get_or_insert(e);
            }
        }
    }

    if missing.len() == total {
        let status = match &first_failure {
            Some(KlineError::DataSource { status, .. }) => *status,
            _ => None,
        };
        let cause = first_failure.map_or_else(String::new, |e| e.to_string());
        return Err(KlineError::data_source(
            status,
            format!("all {} windows for {} failed; first: {}", total, market, cause),
        ));
    }

    Ok(PaginatedFetch {
        series: assemble_candles(market.clone(), candles)?,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves a flat daily history starting at `t0` and honours window bounds.
    struct FlatDaily {
        t0: i64,
        fail_from: Option<i64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for FlatDaily {
        async fn fetch_klines(&self, window: &FetchWindow, limit: i32) -> Result<Vec<Candle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let day = window.market.interval_ms();
            if let (Some(fail), Some(start)) = (self.fail_from, window.start_ms)
                && start >= fail
            {
                return Err(KlineError::data_source(Some(503), "unavailable"));
            }
            let start = window.start_ms.unwrap_or(self.t0).max(self.t0);
            let end = window.end_ms.unwrap_or(start + (limit as i64 - 1) * day);
            let first = (start - self.t0 + day - 1) / day;
            Ok((0..limit as i64)
                .map(|i| self.t0 + (first + i) * day)
                .take_while(|&t| t <= end)
                .map(|t| Candle::new(t, 10.0, 11.0, 9.0, 10.0, 1.0))
                .collect())
        }
    }

    fn client(provider: FlatDaily, limit: i32) -> MarketDataClient {
        MarketDataClient::new(
            Arc::new(provider),
            ClientConfig {
                limit,
                ..ClientConfig::default()
            },
        )
    }

    fn provider(fail_from: Option<i64>) -> FlatDaily {
        FlatDaily {
            t0: 0,
            fail_from,
            calls: AtomicUsize::new(0),
        }
    }

    fn btc() -> Market {
        Market::new("BTCUSDT", Interval::D1).unwrap()
    }

    #[tokio::test]
    async fn windows_merge_without_gaps_or_duplicates() {
        let day = Interval::D1.duration_ms();
        let c = client(provider(None), 10);
        let fetched = c.fetch_market_range(&btc(), 0, Some(95 * day)).await.unwrap();
        assert!(fetched.is_complete());
        assert_eq!(fetched.series.klines(), 96);
        assert_eq!(fetched.series.missing_intervals(), 0);
        assert!(fetched.series.timestamps().windows(2).all(|w| w[1] - w[0] == day));
    }

    #[tokio::test]
    async fn partial_failure_reports_missing_windows() {
        let day = Interval::D1.duration_ms();
        let c = client(provider(Some(50 * day)), 10);
        let fetched = c.fetch_market_range(&btc(), 0, Some(95 * day)).await.unwrap();
        assert!(!fetched.is_complete());
        assert!(fetched.missing.iter().all(|m| m.window.start_ms >= Some(50 * day)));
        assert_eq!(fetched.series.last_timestamp_ms(), Some(54 * day));
    }

    #[tokio::test]
    async fn all_windows_failing_is_a_data_source_error() {
        let c = client(provider(Some(0)), 10);
        let err = c
            .fetch_market_range(&btc(), 0, Some(40 * Interval::D1.duration_ms()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            KlineError::DataSource {
                status: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_provider() {
        let p = Arc::new(provider(None));
        let c = MarketDataClient::new(p.clone(), ClientConfig::default());
        assert!(matches!(
            c.fetch("btcusdt", "1d", None, None).await,
            Err(KlineError::Validation(_))
        ));
        assert!(matches!(
            c.fetch("BTCUSDT", "2d", None, None).await,
            Err(KlineError::Validation(_))
        ));
        let later = Utc::now();
        let earlier = later - chrono::Duration::days(3);
        assert!(matches!(
            c.fetch("BTCUSDT", "1d", Some(later), Some(earlier)).await,
            Err(KlineError::Validation(_))
        ));
        assert_eq!(p.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unbounded_fetch_returns_at_most_limit() {
        let c = client(provider(None), 25);
        let series = c.fetch("BTCUSDT", "1d", None, None).await.unwrap();
        assert_eq!(series.klines(), 25);
    }

    /// Tracks how many requests are in flight at once.
    struct Busy {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for Busy {
        async fn fetch_klines(&self, window: &FetchWindow, _: i32) -> Result<Vec<Candle>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let start = window.start_ms.unwrap_or(0);
            Ok(vec![Candle::new(start, 1.0, 1.0, 1.0, 1.0, 1.0)])
        }
    }

    #[tokio::test]
    async fn concurrent_markets_share_one_request_cap() {
        let day = Interval::D1.duration_ms();
        let busy = Arc::new(Busy {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let c = MarketDataClient::new(
            busy.clone(),
            ClientConfig {
                limit: 5,
                max_concurrent: 3,
                ..ClientConfig::default()
            },
        );
        let markets: Vec<Market> = ["BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT"]
            .iter()
            .map(|s| Market::new(s, Interval::D1).unwrap())
            .collect();
        // One clone per market, as the cache and engine hold them.
        let clients: Vec<MarketDataClient> = markets.iter().map(|_| c.clone()).collect();
        let results = futures::future::join_all(
            markets
                .iter()
                .zip(&clients)
                .map(|(m, client)| client.fetch_market_range(m, 0, Some(100 * day))),
        )
        .await;

        assert!(results.iter().all(|r| r.is_ok()));
        let peak = busy.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight {peak}");
        assert!(peak >= 2);
    }

    struct Stalls;

    #[async_trait]
    impl MarketDataProvider for Stalls {
        async fn fetch_klines(&self, _: &FetchWindow, _: i32) -> Result<Vec<Candle>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn slow_window_times_out_as_data_source() {
        let c = MarketDataClient::new(
            Arc::new(Stalls),
            ClientConfig {
                request_timeout: Duration::from_millis(20),
                ..ClientConfig::default()
            },
        );
        let err = c.fetch_market(&btc(), Some(0), Some(0)).await.unwrap_err();
        assert!(matches!(err, KlineError::DataSource { status: None, .. }));
    }
}
