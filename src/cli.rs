//! Command-line front end: risk reports, comparisons and raw candles as tables or JSON.

use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    clap::{Parser, Subcommand},
    tabled::{Table, Tabled},
};

use crate::{
    analysis::{BoxSummary, RiskReport},
    config::{ANALYSIS, ASSETS, PERSISTENCE},
    data::{MarketDataClient, MarketDataStorage, MissingWindow, SeriesCache, SqliteStorage},
    domain::Market,
    engine::{DateRange, GraphData, GraphEngine, GraphRequest, GraphResponse, Panel},
    utils::{epoch_ms_to_utc, parse_utc},
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Binance klines, log returns and Value-at-Risk", long_about = None)]
pub struct Cli {
    /// SQLite snapshot used to avoid refetching history
    #[arg(long, default_value = PERSISTENCE.kline.db_path)]
    pub db: String,

    /// Always fetch the full history from the API, without reading or writing the snapshot
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,

    /// Print the full response as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Earliest date requested from the exchange (UTC)
    #[arg(long, default_value = ASSETS.history_start)]
    pub history_start: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Descriptive statistics and VaR for one asset
    Report {
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(short, long, default_value = "1d")]
        interval: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long, default_value_t = ANALYSIS.default_confidence_level)]
        confidence: f64,
        #[arg(short, long, default_value_t = ANALYSIS.default_histogram_bins)]
        bins: usize,
    },
    /// Side-by-side statistics, VaR and quartiles for several assets
    Compare {
        /// Comma-separated symbols
        #[arg(short, long, value_delimiter = ',', default_values_t = ASSETS.dashboard.pairs.iter().map(|s| s.to_string()).collect::<Vec<_>>())]
        symbols: Vec<String>,
        #[arg(short, long, default_value = "1d")]
        interval: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(short, long, default_value_t = ANALYSIS.default_confidence_level)]
        confidence: f64,
        #[arg(short, long, default_value_t = ANALYSIS.default_histogram_bins)]
        bins: usize,
    },
    /// The most recent candles of one asset
    Candles {
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,
        #[arg(short, long, default_value = "1d")]
        interval: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Rows to print from the end of the range
        #[arg(long, default_value_t = 10)]
        tail: usize,
    },
}

#[derive(Tabled)]
struct RiskRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Returns")]
    count: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Std")]
    std: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Historical VaR")]
    historical: String,
    #[tabled(rename = "Normal VaR")]
    normal: String,
    #[tabled(rename = "Johnson-SU VaR")]
    johnson_su: String,
}

impl From<&RiskReport> for RiskRow {
    fn from(report: &RiskReport) -> Self {
        let f = |v: f64| format!("{:.5}", v);
        RiskRow {
            asset: report.market.to_string(),
            count: report.stats.count,
            mean: f(report.stats.mean),
            std: f(report.stats.std),
            min: f(report.stats.min),
            max: f(report.stats.max),
            historical: f(report.var.historical),
            normal: f(report.var.normal),
            johnson_su: match (&report.var.johnson_su, &report.var.fit_error) {
                (Some(v), _) => f(*v),
                (None, Some(e)) => format!("n/a ({})", e),
                (None, None) => "n/a".to_string(),
            },
        }
    }
}

#[derive(Tabled)]
struct BoxRow {
    #[tabled(rename = "Asset")]
    asset: String,
    #[tabled(rename = "Lower whisker")]
    lower: String,
    #[tabled(rename = "Q1")]
    q1: String,
    #[tabled(rename = "Median")]
    median: String,
    #[tabled(rename = "Q3")]
    q3: String,
    #[tabled(rename = "Upper whisker")]
    upper: String,
    #[tabled(rename = "Outliers")]
    outliers: usize,
}

impl BoxRow {
    fn new(market: &Market, b: &BoxSummary) -> Self {
        let f = |v: f64| format!("{:.5}", v);
        BoxRow {
            asset: market.to_string(),
            lower: f(b.lower_whisker),
            q1: f(b.q1),
            median: f(b.median),
            q3: f(b.q3),
            upper: f(b.upper_whisker),
            outliers: b.outliers.len(),
        }
    }
}

#[derive(Tabled)]
struct CandleRow {
    #[tabled(rename = "Open time")]
    open_time: String,
    #[tabled(rename = "Open")]
    open: f64,
    #[tabled(rename = "High")]
    high: f64,
    #[tabled(rename = "Low")]
    low: f64,
    #[tabled(rename = "Close")]
    close: f64,
    #[tabled(rename = "Volume")]
    volume: f64,
    #[tabled(rename = "Log return")]
    log_return: String,
}

fn date_range(start: &Option<String>, end: &Option<String>) -> Result<DateRange> {
    Ok(DateRange::from_dates(start.as_deref(), end.as_deref())?)
}

fn request(command: &Command) -> Result<GraphRequest> {
    Ok(match command {
        Command::Report {
            symbol,
            interval,
            start,
            end,
            confidence,
            bins,
        } => GraphRequest::Histogram {
            market: Market::parse(symbol, interval)?,
            range: date_range(start, end)?,
            confidence_level: *confidence,
            bins: *bins,
        },
        Command::Compare {
            symbols,
            interval,
            start,
            end,
            confidence,
            bins,
        } => GraphRequest::Comparative {
            markets: symbols
                .iter()
                .map(|s| Market::parse(s, interval))
                .collect::<Result<Vec<_>, _>>()?,
            range: date_range(start, end)?,
            confidence_level: *confidence,
            bins: *bins,
        },
        Command::Candles {
            symbol,
            interval,
            start,
            end,
            ..
        } => GraphRequest::Candlestick {
            market: Market::parse(symbol, interval)?,
            range: date_range(start, end)?,
            rangeslider: false,
        },
    })
}

async fn open_engine(args: &Cli) -> Result<GraphEngine> {
    let history_start = parse_utc(&args.history_start)
        .with_context(|| format!("unreadable --history-start '{}'", args.history_start))?
        .timestamp_millis();

    let storage: Option<Arc<dyn MarketDataStorage>> = if args.no_cache {
        None
    } else {
        let storage = SqliteStorage::new(&args.db)
            .await
            .with_context(|| format!("opening snapshot {}", args.db))?;
        storage.initialize().await?;
        let storage: Arc<dyn MarketDataStorage> = Arc::new(storage);
        Some(storage)
    };

    let client = MarketDataClient::binance().context("building the Binance client")?;
    Ok(GraphEngine::new(Arc::new(SeriesCache::new(
        client,
        storage,
        history_start,
    ))))
}

fn print_missing(market: &Market, missing: &[MissingWindow]) {
    if missing.is_empty() {
        return;
    }
    println!(
        "{}: {} window(s) could not be fetched, figures exclude them:",
        market,
        missing.len()
    );
    for m in missing {
        println!("  {} ({})", m.window, m.reason);
    }
}

fn render(command: &Command, response: &GraphResponse) -> Result<()> {
    match &response.data {
        GraphData::Histogram(Panel::Available(data)) => {
            println!("{}", Table::new([RiskRow::from(&data.report)]));
            let peak = data
                .histogram
                .counts
                .iter()
                .enumerate()
                .max_by_key(|(_, c)| **c)
                .map(|(i, _)| i);
            if let Some(i) = peak {
                println!(
                    "Modal bin: [{:.5}, {:.5}) of {} bins",
                    data.histogram.edges[i],
                    data.histogram.edges[i + 1],
                    data.histogram.counts.len()
                );
            }
            if data.missing_intervals > 0 {
                println!("{} candle(s) missing inside the range", data.missing_intervals);
            }
            print_missing(&data.report.market, &data.missing);
        }
        GraphData::Comparative(panels) => {
            let mut risk_rows = Vec::new();
            let mut box_rows = Vec::new();
            for p in panels {
                match &p.panel {
                    Panel::Available(data) => {
                        risk_rows.push(RiskRow::from(&data.report));
                        box_rows.push(BoxRow::new(&p.market, &data.box_summary));
                        if data.missing_intervals > 0 {
                            println!("{}: {} candle(s) missing", p.market, data.missing_intervals);
                        }
                        print_missing(&p.market, &data.missing);
                    }
                    Panel::Unavailable { reason } => {
                        println!("{}: data unavailable ({})", p.market, reason)
                    }
                }
            }
            if !risk_rows.is_empty() {
                println!("{}", Table::new(risk_rows));
                println!("{}", Table::new(box_rows));
            }
        }
        GraphData::Candlestick(Panel::Available(data)) => {
            let tail = match command {
                Command::Candles { tail, .. } => *tail,
                _ => 10,
            };
            let series = &data.series;
            let from = series.klines().saturating_sub(tail);
            let rows: Vec<CandleRow> = (from..series.klines())
                .map(|i| {
                    let c = series.get_candle(i);
                    CandleRow {
                        open_time: epoch_ms_to_utc(c.open_time_ms),
                        open: c.open_price,
                        high: c.high_price,
                        low: c.low_price,
                        close: c.close_price,
                        volume: c.volume,
                        log_return: series.log_returns()[i]
                            .map_or_else(|| "-".to_string(), |r| format!("{:.5}", r)),
                    }
                })
                .collect();
            println!("{}", Table::new(rows));
            if data.missing_intervals > 0 {
                println!("{} candle(s) missing inside the range", data.missing_intervals);
            }
            print_missing(series.market(), &data.missing);
        }
        GraphData::Histogram(Panel::Unavailable { reason })
        | GraphData::Candlestick(Panel::Unavailable { reason }) => {
            bail!("data unavailable: {}", reason)
        }
    }
    log::info!("query answered in {} ms", response.duration_ms);
    Ok(())
}

pub async fn run(args: Cli) -> Result<()> {
    let request = request(&args.command)?;
    let engine = open_engine(&args).await?;
    let response = engine.build_graph(request).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }
    render(&args.command, &response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report_with_defaults() {
        let cli = Cli::try_parse_from(["kline-risk", "report", "--symbol", "ETHUSDT"]).unwrap();
        assert!(!cli.json);
        let GraphRequest::Histogram {
            market,
            confidence_level,
            bins,
            range,
        } = request(&cli.command).unwrap()
        else {
            panic!("report maps to a histogram request");
        };
        assert_eq!(market.symbol(), "ETHUSDT");
        assert_eq!(confidence_level, 0.05);
        assert_eq!(bins, ANALYSIS.default_histogram_bins);
        assert_eq!(range, DateRange::default());
    }

    #[test]
    fn compare_splits_symbols() {
        let cli = Cli::try_parse_from([
            "kline-risk",
            "--json",
            "compare",
            "--symbols",
            "BTCUSDT,ETHUSDT,SOLUSDT",
            "--start",
            "2022-01-01",
        ])
        .unwrap();
        assert!(cli.json);
        let GraphRequest::Comparative { markets, range, .. } = request(&cli.command).unwrap() else {
            panic!("compare maps to a comparative request");
        };
        assert_eq!(markets.len(), 3);
        assert!(range.start_ms.is_some() && range.end_ms.is_none());
    }

    #[test]
    fn bad_symbol_is_rejected_before_any_fetch() {
        let cli = Cli::try_parse_from(["kline-risk", "report", "--symbol", "btc"]).unwrap();
        assert!(request(&cli.command).is_err());
    }
}
