#![allow(clippy::const_is_empty)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]
#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]

// Core modules
pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod models;
pub mod utils;

// Re-export commonly used types outside of crate (for the binaries and integration tests)
pub use analysis::{RiskReport, VarEstimates, risk_report, value_at_risk};
pub use cli::{Cli, run};
pub use data::{MarketDataClient, SeriesCache, SqliteStorage, assemble};
pub use domain::{Interval, Market};
pub use engine::{GraphEngine, GraphRequest, GraphResponse};
pub use error::{FitError, KlineError};
pub use models::Series;
