use std::sync::Arc;

use {futures::future::join_all, rayon::prelude::*};

use crate::{
    analysis::{box_summary, distribution_curves, histogram, risk_report},
    config::ANALYSIS,
    data::{CacheEntry, SeriesCache},
    domain::Market,
    error::{KlineError, Result},
    utils::AppInstant,
};

use super::messages::{
    CandlestickData, ComparativeData, ComparativePanel, DateRange, GraphData, GraphRequest,
    GraphResponse, HistogramData, Panel,
};

/// Resolves graph requests against the shared series cache.
#[derive(Clone)]
pub struct GraphEngine {
    cache: Arc<SeriesCache>,
}

impl GraphEngine {
    pub fn new(cache: Arc<SeriesCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &SeriesCache {
        &self.cache
    }

    pub async fn build_graph(&self, request: GraphRequest) -> GraphResponse {
        let start = AppInstant::now();
        let data = match request {
            GraphRequest::Candlestick {
                market,
                range,
                rangeslider,
            } => GraphData::Candlestick(Panel::from_result(
                self.get(&market)
                    .await
                    .and_then(|entry| candlestick(&entry, range, rangeslider)),
            )),
            GraphRequest::Histogram {
                market,
                range,
                confidence_level,
                bins,
            } => {
                let result = match self.get(&market).await {
                    Ok(entry) => tokio::task::spawn_blocking(move || {
                        histogram_data(&entry, range, confidence_level, bins)
                    })
                    .await
                    .unwrap_or_else(|e| Err(worker_died(e))),
                    Err(e) => Err(e),
                };
                GraphData::Histogram(Panel::from_result(result))
            }
            GraphRequest::Comparative {
                markets,
                range,
                confidence_level,
                bins,
            } => GraphData::Comparative(
                self.comparative(markets, range, confidence_level, bins)
                    .await,
            ),
        };
        GraphResponse {
            data,
            duration_ms: start.elapsed().as_millis(),
        }
    }

    async fn get(&self, market: &Market) -> Result<CacheEntry> {
        self.cache.get(market).await
    }

    async fn comparative(
        &self,
        markets: Vec<Market>,
        range: DateRange,
        confidence_level: f64,
        bins: usize,
    ) -> Vec<ComparativePanel> {
        let entries = join_all(markets.iter().map(|m| self.get(m))).await;
        let jobs: Vec<(Market, Result<CacheEntry>)> = markets.into_iter().zip(entries).collect();
        let fallback: Vec<Market> = jobs.iter().map(|(m, _)| m.clone()).collect();

        // Per-market statistics are independent; run them across the rayon pool.
        let computed = tokio::task::spawn_blocking(move || {
            jobs.into_par_iter()
                .map(|(market, entry)| {
                    let result = entry
                        .and_then(|entry| comparative_data(&entry, range, confidence_level, bins));
                    ComparativePanel {
                        market,
                        panel: Panel::from_result(result),
                    }
                })
                .collect::<Vec<_>>()
        })
        .await;

        computed.unwrap_or_else(|e| {
            let reason = worker_died(e).to_string();
            fallback
                .into_iter()
                .map(|market| ComparativePanel {
                    market,
                    panel: Panel::Unavailable {
                        reason: reason.clone(),
                    },
                })
                .collect()
        })
    }
}

fn worker_died(e: tokio::task::JoinError) -> KlineError {
    KlineError::Consistency(format!("statistics worker failed: {}", e))
}

fn candlestick(entry: &CacheEntry, range: DateRange, rangeslider: bool) -> Result<CandlestickData> {
    let series = entry.series.between(range.start_ms, range.end_ms);
    if series.is_empty() {
        return Err(KlineError::validation(format!(
            "no {} candles in the selected range",
            entry.series.market()
        )));
    }
    Ok(CandlestickData {
        missing_intervals: series.missing_intervals(),
        series,
        rangeslider,
        missing: entry.missing.clone(),
    })
}

fn histogram_data(
    entry: &CacheEntry,
    range: DateRange,
    confidence_level: f64,
    bins: usize,
) -> Result<HistogramData> {
    let series = entry.series.between(range.start_ms, range.end_ms);
    let report = risk_report(&series, confidence_level)?;
    let returns = series.returns();
    Ok(HistogramData {
        histogram: histogram(&returns, bins)?,
        curves: distribution_curves(
            &returns,
            report.var.johnson_su_params.as_ref(),
            ANALYSIS.curve_points,
        )?,
        returns,
        report,
        missing: entry.missing.clone(),
        missing_intervals: series.missing_intervals(),
    })
}

fn comparative_data(
    entry: &CacheEntry,
    range: DateRange,
    confidence_level: f64,
    bins: usize,
) -> Result<ComparativeData> {
    let series = entry.series.between(range.start_ms, range.end_ms);
    let report = risk_report(&series, confidence_level)?;
    let returns = series.returns();
    Ok(ComparativeData {
        histogram: histogram(&returns, bins)?,
        box_summary: box_summary(&returns)?,
        report,
        missing: entry.missing.clone(),
        missing_intervals: series.missing_intervals(),
    })
}
