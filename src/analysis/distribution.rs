use {
    serde::Serialize,
    statrs::{
        distribution::{Continuous, Normal},
        statistics::Statistics,
    },
};

use crate::{
    analysis::johnson_su::JohnsonSu,
    config::ANALYSIS,
    error::{KlineError, Result},
    utils::{linspace, percentile_sorted, sorted_copy},
};

/// Equal-width bins. `edges.len() == counts.len() + 1`; `density` integrates to 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub density: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Most extreme observations within `whisker_iqr` IQRs of the quartiles.
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

/// Density overlays sampled on `x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionCurves {
    pub x: Vec<f64>,
    pub normal: Option<Vec<f64>>,
    pub johnson_su: Option<Vec<f64>>,
}

pub fn histogram(returns: &[f64], bins: usize) -> Result<Histogram> {
    if returns.is_empty() {
        return Err(KlineError::validation("cannot bin an empty sample"));
    }
    if bins == 0 {
        return Err(KlineError::validation("histogram needs at least one bin"));
    }

    let mut lo = returns.iter().copied().fold(f64::INFINITY, f64::min);
    let mut hi = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !lo.is_finite() || !hi.is_finite() {
        return Err(KlineError::validation("sample contains non-finite values"));
    }
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }

    let width = (hi - lo) / bins as f64;
    let mut counts = vec![0usize; bins];
    for &r in returns {
        // The top edge belongs to the last bin.
        let idx = (((r - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    let n = returns.len() as f64;
    let density = counts.iter().map(|&c| c as f64 / (n * width)).collect();
    Ok(Histogram {
        edges: linspace(lo, hi, bins + 1),
        counts,
        density,
    })
}

pub fn box_summary(returns: &[f64]) -> Result<BoxSummary> {
    let sorted = sorted_copy(returns);
    let quartile = |p: f64| {
        percentile_sorted(&sorted, p).ok_or_else(|| KlineError::validation("empty sample"))
    };
    let (q1, median, q3) = (quartile(0.25)?, quartile(0.5)?, quartile(0.75)?);

    let reach = ANALYSIS.whisker_iqr * (q3 - q1);
    let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);
    let inside = || sorted.iter().copied().filter(move |&r| r >= lo_fence && r <= hi_fence);

    Ok(BoxSummary {
        q1,
        median,
        q3,
        lower_whisker: inside().fold(q1, f64::min),
        upper_whisker: inside().fold(q3, f64::max),
        outliers: sorted
            .iter()
            .copied()
            .filter(|&r| r < lo_fence || r > hi_fence)
            .collect(),
    })
}

/// Normal and Johnson-SU densities over the sample range. Either curve is absent when its
/// model is (zero variance, failed fit).
pub fn distribution_curves(
    returns: &[f64],
    johnson_su: Option<&JohnsonSu>,
    points: usize,
) -> Result<DistributionCurves> {
    if returns.is_empty() {
        return Err(KlineError::validation("cannot draw curves for an empty sample"));
    }
    let lo = returns.iter().copied().fold(f64::INFINITY, f64::min);
    let hi = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let x = linspace(lo, hi, points);

    let normal = if returns.len() > 1 {
        Normal::new(returns.mean(), returns.std_dev())
            .ok()
            .map(|dist| x.iter().map(|&v| dist.pdf(v)).collect())
    } else {
        None
    };
    let johnson_su = johnson_su.map(|dist| x.iter().map(|&v| dist.pdf(v)).collect());

    Ok(DistributionCurves {
        x,
        normal,
        johnson_su,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_counts_every_value_once() {
        let returns = [-2.0, -1.0, 0.0, 0.0, 1.0, 2.0];
        let h = histogram(&returns, 4).unwrap();
        assert_eq!(h.edges, vec![-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert_eq!(h.counts.iter().sum::<usize>(), returns.len());
        assert_eq!(h.counts, vec![1, 1, 2, 2]);
        let width = h.edges[1] - h.edges[0];
        let area: f64 = h.density.iter().map(|d| d * width).sum();
        assert!((area - 1.0).abs() < 1e-12);
    }

    #[test]
    fn histogram_of_constant_sample_has_one_full_bin() {
        let h = histogram(&[0.1; 7], 3).unwrap();
        assert_eq!(h.counts, vec![0, 7, 0]);
        assert!(histogram(&[], 3).is_err());
        assert!(histogram(&[1.0], 0).is_err());
    }

    #[test]
    fn box_summary_flags_outliers() {
        let mut returns: Vec<f64> = (1..=20).map(|i| i as f64 / 100.0).collect();
        returns.push(2.0);
        let b = box_summary(&returns).unwrap();
        assert_eq!(b.median, 0.11);
        assert_eq!(b.outliers, vec![2.0]);
        assert_eq!(b.upper_whisker, 0.2);
        assert_eq!(b.lower_whisker, 0.01);
        assert!(box_summary(&[]).is_err());
    }

    #[test]
    fn curves_cover_sample_range() {
        let returns: Vec<f64> = (0..50).map(|i| (i as f64 - 25.0) / 1000.0).collect();
        let params = JohnsonSu::new(0.0, 2.0, 0.0, 0.03).unwrap();
        let c = distribution_curves(&returns, Some(&params), 11).unwrap();
        assert_eq!(c.x.first(), Some(&-0.025));
        assert_eq!(c.x.len(), 11);
        assert_eq!(c.normal.as_ref().map(Vec::len), Some(11));
        assert_eq!(c.johnson_su.as_ref().map(Vec::len), Some(11));

        let flat = distribution_curves(&[0.5; 10], None, 5).unwrap();
        assert!(flat.normal.is_none());
        assert!(flat.johnson_su.is_none());
    }
}
