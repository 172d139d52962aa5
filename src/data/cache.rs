use std::{collections::HashMap, sync::Arc};

use {
    anyhow::Context,
    futures::future::join_all,
    tokio::sync::{Mutex, RwLock},
};

use crate::{
    config::DF,
    data::{MarketDataClient, MarketDataStorage, MissingWindow, assemble},
    domain::{FetchWindow, Market},
    error::{KlineError, Result},
    models::Series,
};

/// One assembled series and the windows that were missing when it was last fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub series: Arc<Series>,
    pub missing: Vec<MissingWindow>,
}

/// Per-market series, fetched on first use and shared read-only afterwards.
pub struct SeriesCache {
    client: MarketDataClient,
    storage: Option<Arc<dyn MarketDataStorage>>,
    history_start_ms: i64,
    entries: RwLock<HashMap<Market, CacheEntry>>,
    /// One load at a time per market.
    loading: Mutex<HashMap<Market, Arc<Mutex<()>>>>,
}

impl SeriesCache {
    pub fn new(
        client: MarketDataClient,
        storage: Option<Arc<dyn MarketDataStorage>>,
        history_start_ms: i64,
    ) -> Self {
        Self {
            client,
            storage,
            history_start_ms,
            entries: RwLock::new(HashMap::new()),
            loading: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, market: &Market) -> Result<CacheEntry> {
        if let Some(entry) = self.cached(market).await {
            if DF.log_cache {
                log::info!("cache hit {}", market);
            }
            return Ok(entry);
        }

        let guard = self.load_guard(market).await;
        let _loading = guard.lock().await;
        // Whoever held the guard before us may have loaded it already.
        if let Some(entry) = self.cached(market).await {
            return Ok(entry);
        }
        if DF.log_cache {
            log::info!("cache miss {}", market);
        }
        self.load(market).await
    }

    /// Eagerly load `markets`. Failures are logged and handed back, the rest stay cached.
    pub async fn populate(&self, markets: &[Market]) -> Vec<(Market, KlineError)> {
        let results = join_all(markets.iter().map(|m| self.get(m))).await;
        markets
            .iter()
            .zip(results)
            .filter_map(|(market, result)| match result {
                Ok(_) => None,
                Err(e) => {
                    log::error!("populate {} failed: {}", market, e);
                    Some((market.clone(), e))
                }
            })
            .collect()
    }

    /// Fetch again (incrementally when a store is configured) and replace the entry.
    pub async fn refresh(&self, market: &Market) -> Result<CacheEntry> {
        let guard = self.load_guard(market).await;
        let _loading = guard.lock().await;
        self.load(market).await
    }

    pub async fn invalidate(&self, market: &Market) -> bool {
        self.entries.write().await.remove(market).is_some()
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    pub async fn cached_markets(&self) -> Vec<Market> {
        let mut markets: Vec<Market> = self.entries.read().await.keys().cloned().collect();
        markets.sort();
        markets
    }

    async fn cached(&self, market: &Market) -> Option<CacheEntry> {
        self.entries.read().await.get(market).cloned()
    }

    async fn load_guard(&self, market: &Market) -> Arc<Mutex<()>> {
        self.loading
            .lock()
            .await
            .entry(market.clone())
            .or_default()
            .clone()
    }

    /// Caller holds the market's load guard.
    async fn load(&self, market: &Market) -> Result<CacheEntry> {
        let stored = self.load_stored(market).await.filter(|s| !s.is_empty());
        let Some(stored) = stored else {
            let fetched = self
                .client
                .fetch_market_range(market, self.history_start_ms, None)
                .await?;
            return Ok(self.keep(market, fetched.series, fetched.missing).await);
        };

        // Refetch the last stored candle too: it may have been open when it was written.
        let tail_from = stored.last_timestamp_ms().unwrap_or(self.history_start_ms);
        // Holes left by failed windows in an earlier session are asked for again.
        let gaps = stored.gaps();
        if DF.log_cache && !gaps.is_empty() {
            log::info!("{}: refetching {} stored gap(s)", market, gaps.len());
        }

        let (tail, patches) = tokio::join!(
            self.client.fetch_market_range(market, tail_from, None),
            join_all(gaps.iter().map(|&(before, after)| {
                self.client
                    .fetch_market_range(market, before, Some(after))
            })),
        );
        let tail = tail?;

        let mut parts = vec![tail.series];
        let mut missing = tail.missing;
        for ((before, after), patch) in gaps.into_iter().zip(patches) {
            match patch {
                Ok(patch) => {
                    parts.push(patch.series);
                    missing.extend(patch.missing);
                }
                Err(e) => {
                    log::warn!("{}: stored gap still unavailable: {}", market, e);
                    missing.push(MissingWindow {
                        window: FetchWindow::new(market.clone(), Some(before), Some(after)),
                        reason: e.to_string(),
                    });
                }
            }
        }
        parts.push(stored);

        let series = assemble(parts)?;
        Ok(self.keep(market, series, missing).await)
    }

    async fn keep(&self, market: &Market, series: Series, missing: Vec<MissingWindow>) -> CacheEntry {
        self.write_back(&series).await;
        let entry = CacheEntry {
            series: Arc::new(series),
            missing,
        };
        self.entries
            .write()
            .await
            .insert(market.clone(), entry.clone());
        entry
    }

    async fn load_stored(&self, market: &Market) -> Option<Series> {
        let storage = self.storage.as_ref()?;
        match storage
            .load_series(market, Some(self.history_start_ms))
            .await
            .with_context(|| format!("reading snapshot for {}", market))
        {
            Ok(series) => {
                if DF.log_cache {
                    log::info!("{} rows of {} from snapshot", series.klines(), market);
                }
                Some(series)
            }
            Err(e) => {
                log::warn!("{:#}", e);
                None
            }
        }
    }

    async fn write_back(&self, series: &Series) {
        let Some(storage) = self.storage.as_ref() else {
            return;
        };
        match storage
            .insert_series(series)
            .await
            .with_context(|| format!("writing snapshot for {}", series.market()))
        {
            Ok(rows) => {
                if DF.log_cache {
                    log::info!("stored {} rows of {}", rows, series.market());
                }
            }
            Err(e) => log::warn!("{:#}", e),
        }
    }
}
