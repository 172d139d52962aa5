use {
    serde::Serialize,
    statrs::{
        distribution::{ContinuousCDF, Normal},
        statistics::Statistics,
    },
};

use crate::{
    analysis::johnson_su::{JohnsonSu, johnson_su_var},
    domain::Market,
    error::{FitError, KlineError, Result},
    models::Series,
    utils::{percentile_sorted, sorted_copy},
};

/// Summary of a return sample. `std` is the sample (n - 1) standard deviation, 0 for n = 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Descriptive {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

/// The three VaR figures for one sample. When the Johnson-SU fit fails its figure is absent and
/// `fit_error` says why; the other two are always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarEstimates {
    pub historical: f64,
    pub normal: f64,
    pub johnson_su: Option<f64>,
    pub johnson_su_params: Option<JohnsonSu>,
    pub fit_error: Option<FitError>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub market: Market,
    pub confidence_level: f64,
    pub stats: Descriptive,
    pub var: VarEstimates,
}

fn require_sample(returns: &[f64]) -> Result<()> {
    if returns.is_empty() {
        return Err(KlineError::validation("return sample is empty"));
    }
    if returns.iter().any(|r| !r.is_finite()) {
        return Err(KlineError::validation("return sample contains non-finite values"));
    }
    Ok(())
}

pub(crate) fn require_confidence(confidence_level: f64) -> Result<()> {
    if confidence_level.is_finite() && confidence_level > 0.0 && confidence_level < 1.0 {
        Ok(())
    } else {
        Err(KlineError::validation(format!(
            "confidence level must be in (0, 1), got {}",
            confidence_level
        )))
    }
}

pub fn describe(returns: &[f64]) -> Result<Descriptive> {
    require_sample(returns)?;
    let count = returns.len();
    let std = if count < 2 { 0.0 } else { returns.std_dev() };
    Ok(Descriptive {
        count,
        mean: returns.mean(),
        std,
        // Iterator::min/max would clash with Statistics; fold instead.
        min: returns.iter().copied().fold(f64::INFINITY, f64::min),
        max: returns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    })
}

/// Empirical `confidence_level` percentile, linear interpolation between order statistics.
pub fn historical_var(returns: &[f64], confidence_level: f64) -> Result<f64> {
    require_sample(returns)?;
    require_confidence(confidence_level)?;
    percentile_sorted(&sorted_copy(returns), confidence_level)
        .ok_or_else(|| KlineError::validation("return sample is empty"))
}

/// `mean + std * z`, where `z` is the standard normal `confidence_level` quantile.
pub fn normal_var(returns: &[f64], confidence_level: f64) -> Result<f64> {
    require_confidence(confidence_level)?;
    let stats = describe(returns)?;
    Ok(normal_var_from(&stats, confidence_level))
}

fn normal_var_from(stats: &Descriptive, confidence_level: f64) -> f64 {
    match Normal::new(stats.mean, stats.std) {
        Ok(dist) if stats.std > 0.0 => dist.inverse_cdf(confidence_level),
        _ => stats.mean,
    }
}

pub fn value_at_risk(returns: &[f64], confidence_level: f64) -> Result<VarEstimates> {
    let stats = describe(returns)?;
    require_confidence(confidence_level)?;
    Ok(estimates(returns, &stats, confidence_level))
}

fn estimates(returns: &[f64], stats: &Descriptive, confidence_level: f64) -> VarEstimates {
    let historical = percentile_sorted(&sorted_copy(returns), confidence_level).unwrap_or(stats.mean);
    let normal = normal_var_from(stats, confidence_level);

    let (johnson_su_params, johnson_su, fit_error) = match johnson_su_var(returns, confidence_level) {
        Ok((params, q)) => (Some(params), Some(q), None),
        Err(e) => {
            log::warn!("Johnson-SU VaR unavailable: {}", e);
            (None, None, Some(e))
        }
    };

    VarEstimates {
        historical,
        normal,
        johnson_su,
        johnson_su_params,
        fit_error,
    }
}

/// Statistics and VaR over the series' defined log returns.
pub fn risk_report(series: &Series, confidence_level: f64) -> Result<RiskReport> {
    let returns = series.returns();
    if returns.is_empty() {
        return Err(KlineError::validation(format!(
            "{} has {} candles, too few for a return",
            series.market(),
            series.klines()
        )));
    }
    let stats = describe(&returns)?;
    require_confidence(confidence_level)?;
    let var = crate::trace_time!(&format!("VaR [{}]", series.market()), 50_000, {
        estimates(&returns, &stats, confidence_level)
    });
    Ok(RiskReport {
        market: series.market().clone(),
        confidence_level,
        stats,
        var,
    })
}
