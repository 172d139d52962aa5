use serde::Serialize;

use crate::domain::{Candle, Market};

// ============================================================================
// Series: assembled, read-only candle table for one market
// ============================================================================

/// Column-oriented candles for one market, ascending by open time with unique keys.
///
/// Only [`crate::data::assemble`] (and the snapshot loader, through it) builds a non-empty
/// `Series`, so the ordering invariant holds for every value in circulation.
/// `log_returns[i] = ln(close[i] / close[i - 1])`; the first row has no return.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Series {
    market: Market,

    timestamps: Vec<i64>,

    // Prices
    open_prices: Vec<f64>,
    high_prices: Vec<f64>,
    low_prices: Vec<f64>,
    close_prices: Vec<f64>,

    volumes: Vec<f64>,

    log_returns: Vec<Option<f64>>,
}

impl Series {
    pub fn empty(market: Market) -> Self {
        Self::from_sorted_candles(market, Vec::new())
    }

    /// Caller guarantees `candles` is strictly ascending by open time.
    pub(crate) fn from_sorted_candles(market: Market, candles: Vec<Candle>) -> Self {
        let len = candles.len();

        // Pre-allocate everything
        let mut ts_vec = Vec::with_capacity(len);
        let mut open_vec = Vec::with_capacity(len);
        let mut high_vec = Vec::with_capacity(len);
        let mut low_vec = Vec::with_capacity(len);
        let mut close_vec = Vec::with_capacity(len);
        let mut vol_vec = Vec::with_capacity(len);
        let mut ret_vec = Vec::with_capacity(len);

        let mut prev_close: Option<f64> = None;
        for c in candles {
            ts_vec.push(c.open_time_ms);
            open_vec.push(c.open_price);
            high_vec.push(c.high_price);
            low_vec.push(c.low_price);
            close_vec.push(c.close_price);
            vol_vec.push(c.volume);
            ret_vec.push(prev_close.map(|prev| (c.close_price / prev).ln()));
            prev_close = Some(c.close_price);
        }

        Self {
            market,
            timestamps: ts_vec,
            open_prices: open_vec,
            high_prices: high_vec,
            low_prices: low_vec,
            close_prices: close_vec,
            volumes: vol_vec,
            log_returns: ret_vec,
        }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn klines(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn open_prices(&self) -> &[f64] {
        &self.open_prices
    }

    pub fn high_prices(&self) -> &[f64] {
        &self.high_prices
    }

    pub fn low_prices(&self) -> &[f64] {
        &self.low_prices
    }

    pub fn close_prices(&self) -> &[f64] {
        &self.close_prices
    }

    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// One entry per row; `None` where the return is undefined (first row).
    pub fn log_returns(&self) -> &[Option<f64>] {
        &self.log_returns
    }

    /// Defined log returns only, in time order. This is the statistics sample.
    pub fn returns(&self) -> Vec<f64> {
        self.log_returns.iter().flatten().copied().collect()
    }

    pub fn first_timestamp_ms(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp_ms(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    pub fn get_candle(&self, idx: usize) -> Candle {
        Candle::new(
            self.timestamps[idx],
            self.open_prices[idx],
            self.high_prices[idx],
            self.low_prices[idx],
            self.close_prices[idx],
            self.volumes[idx],
        )
    }

    pub fn candles(&self) -> impl Iterator<Item = Candle> + '_ {
        (0..self.klines()).map(|i| self.get_candle(i))
    }

    /// Rows with `start_ms <= open_time <= end_ms`. The sub-series' first return is undefined
    /// again, because its predecessor is outside the range.
    pub fn between(&self, start_ms: Option<i64>, end_ms: Option<i64>) -> Series {
        let lo = start_ms.map_or(0, |s| self.timestamps.partition_point(|&t| t < s));
        let hi = end_ms.map_or(self.klines(), |e| {
            self.timestamps.partition_point(|&t| t <= e)
        });
        if lo >= hi {
            return Series::empty(self.market.clone());
        }
        Series::from_sorted_candles(
            self.market.clone(),
            (lo..hi).map(|i| self.get_candle(i)).collect(),
        )
    }

    /// Whole intervals between two open times, rounded so calendar months (28..31 days) count
    /// as one step.
    fn steps(&self, from_ms: i64, to_ms: i64) -> i64 {
        let interval_ms = self.market.interval_ms();
        (to_ms - from_ms + interval_ms / 2) / interval_ms
    }

    /// Candles absent between the first and last row.
    pub fn missing_intervals(&self) -> usize {
        self.timestamps
            .windows(2)
            .map(|w| (self.steps(w[0], w[1]) - 1).max(0) as usize)
            .sum()
    }

    /// Open times of the rows on either side of each run of absent candles.
    pub fn gaps(&self) -> Vec<(i64, i64)> {
        self.timestamps
            .windows(2)
            .filter(|w| self.steps(w[0], w[1]) > 1)
            .map(|w| (w[0], w[1]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;

    fn daily(closes: &[f64]) -> Series {
        let market = Market::new("BTCUSDT", Interval::D1).unwrap();
        let day = Interval::D1.duration_ms();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64 * day, c, c * 1.01, c * 0.99, c, 1.0))
            .collect();
        Series::from_sorted_candles(market, candles)
    }

    #[test]
    fn first_return_is_undefined_rest_are_log_ratios() {
        let s = daily(&[100.0, 110.0, 99.0]);
        assert_eq!(s.log_returns()[0], None);
        assert_eq!(s.log_returns()[1], Some((110.0f64 / 100.0).ln()));
        assert_eq!(s.log_returns()[2], Some((99.0f64 / 110.0).ln()));
        assert_eq!(s.returns().len(), 2);
    }

    #[test]
    fn between_is_inclusive_and_resets_first_return() {
        let s = daily(&[100.0, 110.0, 99.0, 120.0]);
        let day = Interval::D1.duration_ms();
        let sub = s.between(Some(day), Some(2 * day));
        assert_eq!(sub.klines(), 2);
        assert_eq!(sub.timestamps(), &[day, 2 * day]);
        assert_eq!(sub.log_returns()[0], None);
        assert_eq!(sub.log_returns()[1], s.log_returns()[2]);

        assert_eq!(s.between(None, None), s);
        assert!(s.between(Some(10 * day), None).is_empty());
    }

    #[test]
    fn missing_intervals_counts_holes() {
        let market = Market::new("BTCUSDT", Interval::D1).unwrap();
        let day = Interval::D1.duration_ms();
        let candles = [0, 1, 4, 5, 7]
            .iter()
            .map(|&d| Candle::new(d * day, 1.0, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let s = Series::from_sorted_candles(market, candles);
        assert_eq!(s.missing_intervals(), 3);
        assert_eq!(s.gaps(), vec![(day, 4 * day), (5 * day, 7 * day)]);

        let complete = daily(&[1.0, 2.0, 3.0]);
        assert_eq!(complete.missing_intervals(), 0);
        assert!(complete.gaps().is_empty());
    }
}
