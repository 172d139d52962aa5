use {
    anyhow::{Context, Result},
    clap::Parser,
    kline_risk::{
        Interval, Market, MarketDataClient, SeriesCache, SqliteStorage,
        config::{ASSETS, PERSISTENCE},
        data::MarketDataStorage,
        utils::{epoch_ms_to_utc, parse_utc},
    },
    std::sync::Arc,
};

/// Pre-populate the SQLite kline snapshot so later queries only fetch the tail.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = PERSISTENCE.kline.db_path)]
    db: String,

    #[arg(short, long, default_value = "1d")]
    interval: String,

    /// Defaults to the configured snapshot pairs
    #[arg(short, long, value_delimiter = ',')]
    symbols: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let interval: Interval = args
        .interval
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown interval '{}'", args.interval))?;
    let symbols: Vec<String> = if args.symbols.is_empty() {
        ASSETS.snapshot.pairs.iter().map(|s| s.to_string()).collect()
    } else {
        args.symbols
    };
    let markets = symbols
        .iter()
        .map(|s| Market::new(s, interval))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!("Building kline snapshot in {}", args.db);
    log::info!("Interval: {}, pairs: {:?}", interval, symbols);

    let storage = SqliteStorage::new(&args.db)
        .await
        .with_context(|| format!("Failed to open SQLite DB {}", args.db))?;
    storage.initialize().await?;
    let storage = Arc::new(storage);

    let history_start = parse_utc(ASSETS.history_start)
        .context("history start is not a date")?
        .timestamp_millis();
    let client = MarketDataClient::binance().context("building the Binance client")?;
    let shared: Arc<dyn MarketDataStorage> = storage.clone();
    let cache = SeriesCache::new(client, Some(shared), history_start);

    let failures = cache.populate(&markets).await;
    for (market, e) in &failures {
        log::warn!("Skipped {}: {}", market, e);
    }

    for market in cache.cached_markets().await {
        let last = storage.get_last_candle_time(&market).await?;
        let entry = cache.get(&market).await?;
        log::info!(
            "{}: {} candles, last {}{}",
            market,
            entry.series.klines(),
            last.map_or_else(|| "-".to_string(), epoch_ms_to_utc),
            if entry.missing.is_empty() {
                String::new()
            } else {
                format!(", {} window(s) missing", entry.missing.len())
            }
        );
    }

    if failures.len() == markets.len() {
        anyhow::bail!("no pair could be fetched");
    }
    log::info!("Snapshot complete ({} of {} pairs)", markets.len() - failures.len(), markets.len());
    Ok(())
}
