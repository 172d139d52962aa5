// Domain types and value objects
mod candle;
mod fetch_window;
mod interval;
mod market;

pub use candle::{Candle, CandleType};
pub use fetch_window::{FetchWindow, plan_windows};
pub use interval::Interval;
pub use market::Market;
