// Return statistics, VaR estimators and distribution summaries
pub mod distribution;
pub mod johnson_su;
pub mod risk;

pub use {
    distribution::{BoxSummary, DistributionCurves, Histogram, box_summary, distribution_curves, histogram},
    johnson_su::{JohnsonSu, fit_johnson_su, johnson_su_var},
    risk::{
        Descriptive, RiskReport, VarEstimates, describe, historical_var, normal_var, risk_report,
        value_at_risk,
    },
};
