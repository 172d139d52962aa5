use serde::{Deserialize, Serialize};

use crate::{
    analysis::{BoxSummary, DistributionCurves, Histogram, RiskReport},
    data::MissingWindow,
    domain::Market,
    error::{KlineError, Result},
    models::Series,
    utils::parse_utc,
};

/// Inclusive open-time filter. `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl DateRange {
    pub fn new(start_ms: Option<i64>, end_ms: Option<i64>) -> Result<Self> {
        if let (Some(s), Some(e)) = (start_ms, end_ms)
            && s > e
        {
            return Err(KlineError::validation("range start is after its end"));
        }
        Ok(Self { start_ms, end_ms })
    }

    /// From `YYYY-MM-DD` (or `YYYY-MM-DD HH:MM:SS`) strings, read as UTC.
    pub fn from_dates(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let parse = |text: Option<&str>| -> Result<Option<i64>> {
            text.map(|t| {
                parse_utc(t)
                    .map(|dt| dt.timestamp_millis())
                    .ok_or_else(|| KlineError::validation(format!("unreadable date '{}'", t)))
            })
            .transpose()
        };
        Self::new(parse(start)?, parse(end)?)
    }
}

/// One chart query from the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphRequest {
    Candlestick {
        market: Market,
        range: DateRange,
        rangeslider: bool,
    },
    Histogram {
        market: Market,
        range: DateRange,
        confidence_level: f64,
        bins: usize,
    },
    Comparative {
        markets: Vec<Market>,
        range: DateRange,
        confidence_level: f64,
        bins: usize,
    },
}

/// Either chart data or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Panel<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Panel<T> {
    pub fn from_result(result: Result<T>) -> Self {
        match result {
            Ok(data) => Panel::Available(data),
            Err(e) => Panel::Unavailable {
                reason: e.to_string(),
            },
        }
    }

    pub fn available(&self) -> Option<&T> {
        match self {
            Panel::Available(data) => Some(data),
            Panel::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandlestickData {
    pub series: Series,
    pub rangeslider: bool,
    /// Windows that failed when the series was fetched.
    pub missing: Vec<MissingWindow>,
    /// Candles absent inside the shown range.
    pub missing_intervals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramData {
    pub returns: Vec<f64>,
    pub histogram: Histogram,
    pub curves: DistributionCurves,
    pub report: RiskReport,
    pub missing: Vec<MissingWindow>,
    pub missing_intervals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativeData {
    pub histogram: Histogram,
    pub box_summary: BoxSummary,
    pub report: RiskReport,
    pub missing: Vec<MissingWindow>,
    pub missing_intervals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparativePanel {
    pub market: Market,
    pub panel: Panel<ComparativeData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum GraphData {
    Candlestick(Panel<CandlestickData>),
    Histogram(Panel<HistogramData>),
    Comparative(Vec<ComparativePanel>),
}

/// The result returned by the engine
#[derive(Debug, Clone, Serialize)]
pub struct GraphResponse {
    pub data: GraphData,
    pub duration_ms: u128,
}
