use {
    async_trait::async_trait,
    binance_sdk::{
        config::ConfigurationRestApi,
        errors::{self, ConnectorError as connection_error},
        spot::{
            SpotRestApi,
            rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
        },
    },
};

use crate::{
    config::{BinanceApiConfig, DF},
    data::MarketDataProvider,
    domain::{Candle, FetchWindow, Interval},
    error::{KlineError, Result},
};

pub fn interval_to_bn(interval: Interval) -> KlinesIntervalEnum {
    match interval {
        Interval::S1 => KlinesIntervalEnum::Interval1s,
        Interval::Min1 => KlinesIntervalEnum::Interval1m,
        Interval::Min3 => KlinesIntervalEnum::Interval3m,
        Interval::Min5 => KlinesIntervalEnum::Interval5m,
        Interval::Min15 => KlinesIntervalEnum::Interval15m,
        Interval::Min30 => KlinesIntervalEnum::Interval30m,
        Interval::H1 => KlinesIntervalEnum::Interval1h,
        Interval::H2 => KlinesIntervalEnum::Interval2h,
        Interval::H4 => KlinesIntervalEnum::Interval4h,
        Interval::H6 => KlinesIntervalEnum::Interval6h,
        Interval::H8 => KlinesIntervalEnum::Interval8h,
        Interval::H12 => KlinesIntervalEnum::Interval12h,
        Interval::D1 => KlinesIntervalEnum::Interval1d,
        Interval::D3 => KlinesIntervalEnum::Interval3d,
        Interval::W1 => KlinesIntervalEnum::Interval1w,
        Interval::Month1 => KlinesIntervalEnum::Interval1M,
    }
}

fn malformed(row: usize, what: &str) -> KlineError {
    KlineError::data_source(None, format!("malformed kline row {}: {}", row, what))
}

fn price_field(item: Option<KlinesItemInner>, row: usize, name: &str) -> Result<f64> {
    match item {
        Some(KlinesItemInner::String(s)) => s
            .parse::<f64>()
            .map_err(|_| malformed(row, &format!("{} is not a number: {:?}", name, s))),
        Some(_) => Err(malformed(row, &format!("{} has the wrong type", name))),
        None => Err(malformed(row, &format!("{} is missing", name))),
    }
}

/// Fixed-position kline array -> Candle. Only the first six fields are kept
/// (open time, OHLC, base volume); close time, quote volume, trade count and taker volumes
/// are dropped.
fn parse_kline(row: usize, fields: Vec<KlinesItemInner>) -> Result<Candle> {
    let mut items = fields.into_iter();
    let open_time_ms = match items.next() {
        Some(KlinesItemInner::Integer(t)) => t,
        Some(_) => return Err(malformed(row, "open_time has the wrong type")),
        None => return Err(malformed(row, "empty array")),
    };

    let candle = Candle::new(
        open_time_ms,
        price_field(items.next(), row, "open")?,
        price_field(items.next(), row, "high")?,
        price_field(items.next(), row, "low")?,
        price_field(items.next(), row, "close")?,
        price_field(items.next(), row, "volume")?,
    );

    if !candle.is_well_formed() {
        return Err(malformed(row, &format!("inconsistent prices {:?}", candle)));
    }
    Ok(candle)
}

pub(crate) fn convert_klines(data: Vec<Vec<KlinesItemInner>>) -> Result<Vec<Candle>> {
    data.into_iter()
        .enumerate()
        .map(|(row, fields)| parse_kline(row, fields))
        .collect()
}

fn configure_binance_client() -> Result<RestApi> {
    let config = BinanceApiConfig::default();
    let rest_conf = ConfigurationRestApi::builder()
        .timeout(config.timeout_ms)
        .retries(config.retries)
        .backoff(config.backoff_ms)
        .build()
        .map_err(|e| KlineError::data_source(None, format!("client configuration: {}", e)))?;
    Ok(SpotRestApi::production(rest_conf))
}

/// Map the SDK error onto `DataSource`, keeping the HTTP status where the SDK exposes one.
fn connector_failure(window: &FetchWindow, e: anyhow::Error) -> KlineError {
    let Some(conn_err) = e.downcast_ref::<errors::ConnectorError>() else {
        log::error!("An unexpected error occurred for {}: {:#}", window, e);
        return KlineError::data_source(None, format!("{:#}", e));
    };

    let status = match conn_err {
        connection_error::ConnectorClientError(msg) => {
            log::error!("{} Client error: check request parameters. {}", window, msg);
            None
        }
        connection_error::TooManyRequestsError(msg) => {
            log::warn!("{} Rate limit exceeded. {}", window, msg);
            Some(429)
        }
        connection_error::RateLimitBanError(msg) => {
            log::error!("{} IP address banned due to excessive rate limits. {}", window, msg);
            Some(418)
        }
        errors::ConnectorError::ServerError { msg, status_code } => {
            log::error!("{} Server error: {} (status code: {:?})", window, msg, status_code);
            *status_code
        }
        errors::ConnectorError::NetworkError(msg) => {
            log::error!("{} Network error. {}", window, msg);
            None
        }
        errors::ConnectorError::NotFoundError(msg) => {
            log::error!("{} Resource not found. {}", window, msg);
            Some(404)
        }
        connection_error::BadRequestError(msg) => {
            log::warn!("{} Bad request. {}", window, msg);
            Some(400)
        }
        other => {
            log::error!("Unexpected ConnectionError variant: {:?}", other);
            None
        }
    };
    KlineError::data_source(status, conn_err.to_string())
}

/// Production provider: the Spot REST klines endpoint through the official SDK,
/// configured with zero retries.
pub struct BinanceProvider {
    rest_client: RestApi,
}

impl BinanceProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            rest_client: configure_binance_client()?,
        })
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    async fn fetch_klines(&self, window: &FetchWindow, limit: i32) -> Result<Vec<Candle>> {
        let params = KlinesParams::builder(
            window.market.symbol().to_string(),
            interval_to_bn(window.market.interval()),
        )
        .limit(limit)
        .start_time(window.start_ms)
        .end_time(window.end_ms)
        .build()
        .map_err(|e| KlineError::validation(format!("{}: {}", window, e)))?;

        let response = self
            .rest_client
            .klines(params)
            .await
            .map_err(|e| connector_failure(window, e))?;
        let data = response
            .data()
            .await
            .map_err(|e| KlineError::data_source(None, format!("unreadable body: {:#}", e)))?;

        let candles = convert_klines(data)?;
        if DF.log_windows {
            log::info!("{} -> {} candles", window, candles.len());
        }
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> KlinesItemInner {
        KlinesItemInner::String(v.to_string())
    }

    fn row(t: i64, o: &str, h: &str, l: &str, c: &str, v: &str) -> Vec<KlinesItemInner> {
        vec![
            KlinesItemInner::Integer(t),
            s(o),
            s(h),
            s(l),
            s(c),
            s(v),
            KlinesItemInner::Integer(t + 86_399_999),
            s("123.4"),
            KlinesItemInner::Integer(42),
            s("1.0"),
            s("2.0"),
            s("0"),
        ]
    }

    #[test]
    fn parses_fixed_position_rows() {
        let candles = convert_klines(vec![
            row(1_502_928_000_000, "4261.48", "4485.39", "4200.74", "4285.08", "795.15"),
            row(1_503_014_400_000, "4285.08", "4371.52", "3938.77", "4108.37", "1199.88"),
        ])
        .unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(
            candles[0],
            Candle::new(1_502_928_000_000, 4261.48, 4485.39, 4200.74, 4285.08, 795.15)
        );
    }

    #[test]
    fn rejects_unparsable_or_inconsistent_rows() {
        let bad_number = convert_klines(vec![row(0, "abc", "2", "1", "1.5", "1")]);
        assert!(matches!(bad_number, Err(KlineError::DataSource { .. })));

        let low_above_high = convert_klines(vec![row(0, "1.5", "1", "2", "1.5", "1")]);
        assert!(matches!(low_above_high, Err(KlineError::DataSource { .. })));

        let truncated = convert_klines(vec![vec![KlinesItemInner::Integer(0), s("1")]]);
        assert!(matches!(truncated, Err(KlineError::DataSource { .. })));

        let string_time = convert_klines(vec![vec![s("0"), s("1"), s("2"), s("1"), s("1"), s("1")]]);
        assert!(matches!(string_time, Err(KlineError::DataSource { .. })));
    }

    #[test]
    fn every_interval_maps_to_the_sdk() {
        use strum::IntoEnumIterator;
        for interval in Interval::iter() {
            let _ = interval_to_bn(interval);
        }
        assert!(matches!(
            interval_to_bn(Interval::Month1),
            KlinesIntervalEnum::Interval1M
        ));
    }
}
