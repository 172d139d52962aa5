use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq)]
pub enum CandleType {
    Bullish,
    Bearish,
}

/// One kline. `open_time_ms` is the series key; close time is implied by the interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ms: i64,

    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,

    pub volume: f64,
}

impl Candle {
    pub fn new(open_time_ms: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Candle {
            open_time_ms,
            open_price: open,
            high_price: high,
            low_price: low,
            close_price: close,
            volume,
        }
    }

    /// Positive finite prices, non-negative volume, and low <= {open, close} <= high.
    pub fn is_well_formed(&self) -> bool {
        let prices = [
            self.open_price,
            self.high_price,
            self.low_price,
            self.close_price,
        ];
        prices.iter().all(|p| p.is_finite() && *p > 0.0)
            && self.volume.is_finite()
            && self.volume >= 0.0
            && self.low_price <= self.open_price.min(self.close_price)
            && self.open_price.max(self.close_price) <= self.high_price
    }

    pub fn get_type(&self) -> CandleType {
        if self.close_price >= self.open_price {
            CandleType::Bullish
        } else {
            CandleType::Bearish
        }
    }

    // Returns the low and high of the candle body as a tuple
    pub fn body_range(&self) -> (f64, f64) {
        match self.get_type() {
            CandleType::Bullish => (self.open_price, self.close_price),
            CandleType::Bearish => (self.close_price, self.open_price),
        }
    }
}
