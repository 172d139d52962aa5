//! Configuration module for the kline-risk application.

// Can all be private now because we have a public re-export.
mod analysis;
mod assets;
mod binance;
mod debug;
mod persistence;

// Re-export commonly used items
pub use analysis::{ANALYSIS, AnalysisConfig, FitSettings};
pub use assets::ASSETS;
pub use binance::{BINANCE, BINANCE_QUOTE_ASSETS, BinanceApiConfig, ClientConfig};
pub use debug::{DF, LOG_PERFORMANCE};
pub use persistence::PERSISTENCE;
