use itertools::Itertools;

use crate::{
    domain::Candle,
    error::{KlineError, Result},
    models::Series,
};

/// Merge `parts` (same market, any order, overlapping allowed) into one series.
///
/// Rows are concatenated in `parts` order, stably sorted by open time and deduplicated
/// keeping the first occurrence of each key. Log returns are recomputed over the merged rows.
pub fn assemble(parts: Vec<Series>) -> Result<Series> {
    let market = match parts.first() {
        Some(first) => first.market().clone(),
        None => return Err(KlineError::validation("nothing to assemble")),
    };
    if let Some(other) = parts.iter().find(|p| p.market() != &market) {
        return Err(KlineError::Consistency(format!(
            "cannot merge {} into {}",
            other.market(),
            market
        )));
    }

    let candles: Vec<Candle> = parts.iter().flat_map(|p| p.candles()).collect();
    assemble_candles(market, candles)
}

/// Same as [`assemble`] for raw rows already known to belong to `market`.
pub(crate) fn assemble_candles(
    market: crate::domain::Market,
    mut candles: Vec<Candle>,
) -> Result<Series> {
    // sort_by_key is stable, so dedup_by_key keeps the earliest part's row.
    candles.sort_by_key(|c| c.open_time_ms);
    candles.dedup_by_key(|c| c.open_time_ms);

    if let Some((a, b)) = candles
        .iter()
        .tuple_windows()
        .find(|(a, b)| a.open_time_ms >= b.open_time_ms)
    {
        return Err(KlineError::Consistency(format!(
            "{}: open time {} followed by {}",
            market, a.open_time_ms, b.open_time_ms
        )));
    }

    Ok(Series::from_sorted_candles(market, candles))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Interval, Market};

    const DAY: i64 = 86_400_000;

    fn market() -> Market {
        Market::new("ETHUSDT", Interval::D1).unwrap()
    }

    fn part(days: std::ops::Range<i64>, price_of: impl Fn(i64) -> f64) -> Series {
        let candles = days
            .map(|d| {
                let p = price_of(d);
                Candle::new(d * DAY, p, p, p, p, 1.0)
            })
            .collect();
        Series::from_sorted_candles(market(), candles)
    }

    fn price(d: i64) -> f64 {
        100.0 + (d as f64 * 0.7).sin() * 10.0
    }

    #[test]
    fn overlapping_splits_equal_direct_range() {
        let direct = part(0..30, price);
        let splits = [
            vec![part(0..10, price), part(9..20, price), part(19..30, price)],
            vec![part(19..30, price), part(0..20, price)],
            vec![part(0..30, price), part(5..6, price)],
            vec![part(0..1, price), part(0..30, price), part(29..30, price)],
        ];
        for parts in splits {
            let merged = assemble(parts).unwrap();
            assert_eq!(merged, direct);
        }
    }

    #[test]
    fn output_is_strictly_increasing_without_duplicates() {
        let merged = assemble(vec![
            part(10..20, price),
            part(0..12, price),
            part(15..25, price),
        ])
        .unwrap();
        assert_eq!(merged.klines(), 25);
        assert!(merged.timestamps().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn duplicates_keep_first_part() {
        let first = part(0..3, |_| 10.0);
        let second = part(1..4, |_| 20.0);
        let merged = assemble(vec![first, second]).unwrap();
        assert_eq!(merged.close_prices(), &[10.0, 10.0, 10.0, 20.0]);
    }

    #[test]
    fn log_returns_are_recomputed_across_parts() {
        let merged = assemble(vec![part(3..6, price), part(0..3, price)]).unwrap();
        assert_eq!(merged.log_returns()[0], None);
        for i in 1..merged.klines() {
            let expected = (merged.close_prices()[i] / merged.close_prices()[i - 1]).ln();
            assert_eq!(merged.log_returns()[i], Some(expected));
        }
    }

    #[test]
    fn rejects_empty_and_mixed_markets() {
        assert!(matches!(assemble(vec![]), Err(KlineError::Validation(_))));

        let btc = Market::new("BTCUSDT", Interval::D1).unwrap();
        let other = Series::from_sorted_candles(btc, vec![Candle::new(0, 1.0, 1.0, 1.0, 1.0, 1.0)]);
        let err = assemble(vec![part(0..2, price), other]).unwrap_err();
        assert!(matches!(err, KlineError::Consistency(_)));
    }

    #[test]
    fn empty_parts_assemble_to_empty_series() {
        let merged = assemble(vec![Series::empty(market())]).unwrap();
        assert!(merged.is_empty());
    }
}
