use {
    crate::{
        config::PERSISTENCE,
        data::assembler::assemble_candles,
        domain::{Candle, Market},
        models::Series,
    },
    anyhow::{Context, Result},
    async_trait::async_trait,
    sqlx::{
        ConnectOptions, Pool, QueryBuilder, Row, Sqlite,
        sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    },
    std::{str::FromStr, time::Duration},
};

/// Best-effort on-disk snapshot of assembled series, one row per candle.
#[async_trait]
pub trait MarketDataStorage: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn get_last_candle_time(&self, market: &Market) -> Result<Option<i64>>;
    /// Upsert every row of `series`, log return included. Returns rows written.
    async fn insert_series(&self, series: &Series) -> Result<u64>;
    /// Rows with `open_time >= start_time`, ascending.
    async fn load_series(&self, market: &Market, start_time: Option<i64>) -> Result<Series>;
}

pub struct SqliteStorage {
    pool: Pool<Sqlite>,
}

impl SqliteStorage {
    pub async fn new(db_path: &str) -> Result<Self> {
        let connection_options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(60))
            .synchronous(SqliteSynchronous::Normal)
            .log_slow_statements(log::LevelFilter::Warn, Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connection_options)
            .await
            .with_context(|| format!("opening {}", db_path))?;

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection, since each one would get its own.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
            .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl MarketDataStorage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                symbol TEXT NOT NULL,
                interval TEXT NOT NULL,
                open_time INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                log_return REAL,
                PRIMARY KEY (symbol, interval, open_time)
            );
            "#,
            PERSISTENCE.kline.table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_last_candle_time(&self, market: &Market) -> Result<Option<i64>> {
        let result = sqlx::query(&format!(
            r#"
            SELECT MAX(open_time) as last_time
            FROM {}
            WHERE symbol = ? AND interval = ?
            "#,
            PERSISTENCE.kline.table
        ))
        .bind(market.symbol())
        .bind(market.interval().to_string())
        .fetch_one(&self.pool)
        .await?;

        let last_time: Option<i64> = result.try_get("last_time")?;
        Ok(last_time)
    }

    async fn insert_series(&self, series: &Series) -> Result<u64> {
        if series.is_empty() {
            return Ok(0);
        }
        let market = series.market();
        let interval = market.interval().to_string();
        let rows: Vec<(Candle, Option<f64>)> = series
            .candles()
            .zip(series.log_returns().iter().copied())
            .collect();

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(PERSISTENCE.kline.insert_chunk) {
            let mut query_builder = QueryBuilder::new(format!(
                "INSERT OR REPLACE INTO {} (symbol, interval, open_time, open, high, low, close, volume, log_return) ",
                PERSISTENCE.kline.table
            ));

            query_builder.push_values(chunk, |mut b, (c, log_return)| {
                b.push_bind(market.symbol())
                    .push_bind(interval.as_str())
                    .push_bind(c.open_time_ms)
                    .push_bind(c.open_price)
                    .push_bind(c.high_price)
                    .push_bind(c.low_price)
                    .push_bind(c.close_price)
                    .push_bind(c.volume)
                    .push_bind(*log_return);
            });

            query_builder.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        Ok(rows.len() as u64)
    }

    async fn load_series(&self, market: &Market, start_time: Option<i64>) -> Result<Series> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT open_time, open, high, low, close, volume
            FROM {}
            WHERE symbol = ? AND interval = ? AND open_time >= ?
            ORDER BY open_time ASC
            "#,
            PERSISTENCE.kline.table
        ))
        .bind(market.symbol())
        .bind(market.interval().to_string())
        .bind(start_time.unwrap_or(i64::MIN))
        .fetch_all(&self.pool)
        .await?;

        let candles = rows
            .iter()
            .map(|row| -> Result<Candle, sqlx::Error> {
                Ok(Candle::new(
                    row.try_get("open_time")?,
                    row.try_get("open")?,
                    row.try_get("high")?,
                    row.try_get("low")?,
                    row.try_get("close")?,
                    row.try_get("volume")?,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        assemble_candles(market.clone(), candles)
            .with_context(|| format!("stored rows for {} are inconsistent", market))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;

    fn series(symbol: &str, days: std::ops::Range<i64>) -> Series {
        let market = Market::new(symbol, Interval::D1).unwrap();
        let day = Interval::D1.duration_ms();
        let candles = days
            .map(|d| {
                let p = 100.0 + d as f64;
                Candle::new(d * day, p, p + 1.0, p - 1.0, p, 5.0)
            })
            .collect();
        Series::from_sorted_candles(market, candles)
    }

    async fn store() -> SqliteStorage {
        let store = SqliteStorage::in_memory().await.unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn round_trips_series_in_time_order() {
        let store = store().await;
        let s = series("BTCUSDT", 0..40);
        assert_eq!(store.insert_series(&s).await.unwrap(), 40);

        let loaded = store.load_series(s.market(), None).await.unwrap();
        assert_eq!(loaded, s);
        assert_eq!(
            store.get_last_candle_time(s.market()).await.unwrap(),
            s.last_timestamp_ms()
        );
    }

    #[tokio::test]
    async fn markets_are_isolated_and_upserts_replace() {
        let store = store().await;
        store.insert_series(&series("BTCUSDT", 0..10)).await.unwrap();
        store.insert_series(&series("BTCUSDT", 5..15)).await.unwrap();
        store.insert_series(&series("ETHUSDT", 0..3)).await.unwrap();

        let btc = Market::new("BTCUSDT", Interval::D1).unwrap();
        assert_eq!(store.load_series(&btc, None).await.unwrap().klines(), 15);

        let eth_weekly = Market::new("ETHUSDT", Interval::W1).unwrap();
        assert_eq!(store.get_last_candle_time(&eth_weekly).await.unwrap(), None);
        assert!(store.load_series(&eth_weekly, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn load_honours_start_time() {
        let store = store().await;
        let s = series("ETHUSDT", 0..20);
        store.insert_series(&s).await.unwrap();
        let day = Interval::D1.duration_ms();
        let tail = store.load_series(s.market(), Some(15 * day)).await.unwrap();
        assert_eq!(tail.first_timestamp_ms(), Some(15 * day));
        assert_eq!(tail.klines(), 5);
    }
}
