use {
    crate::{
        domain::Market,
        error::{KlineError, Result},
        utils::epoch_ms_to_utc,
    },
    serde::{Deserialize, Serialize},
};

/// One klines request. Bounds are inclusive epoch milliseconds; `None` leaves that side to the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchWindow {
    pub market: Market,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
}

impl FetchWindow {
    pub fn new(market: Market, start_ms: Option<i64>, end_ms: Option<i64>) -> Self {
        Self {
            market,
            start_ms,
            end_ms,
        }
    }

    /// Upper bound on candles this window can return, if both ends are set.
    pub fn max_candles(&self) -> Option<i64> {
        match (self.start_ms, self.end_ms) {
            (Some(start), Some(end)) if end >= start => {
                Some((end - start) / self.market.interval_ms() + 1)
            }
            (Some(_), Some(_)) => Some(0),
            _ => None,
        }
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let side = |ms: Option<i64>| ms.map(epoch_ms_to_utc).unwrap_or_else(|| "*".to_string());
        write!(
            f,
            "{} [{} .. {}]",
            self.market,
            side(self.start_ms),
            side(self.end_ms)
        )
    }
}

/// Split `[start_ms, min(end_ms, now_ms)]` into windows of at most `limit` candles.
///
/// Each hop is `(limit - 1)` intervals and the next window starts where the previous one
/// ended, so neighbours share exactly one boundary candle. The assembler drops the duplicate.
pub fn plan_windows(
    market: &Market,
    start_ms: i64,
    end_ms: Option<i64>,
    now_ms: i64,
    limit: i32,
) -> Result<Vec<FetchWindow>> {
    if limit < 2 {
        return Err(KlineError::validation(format!(
            "limit must be at least 2 to paginate, got {}",
            limit
        )));
    }
    let stop = end_ms.map_or(now_ms, |end| end.min(now_ms));
    if start_ms > stop {
        return Err(KlineError::validation(format!(
            "start {} is after end {}",
            epoch_ms_to_utc(start_ms),
            epoch_ms_to_utc(stop)
        )));
    }

    let hop = (limit as i64 - 1) * market.interval_ms();
    let mut windows = Vec::new();
    let mut cursor = start_ms;
    loop {
        let window_end = cursor.saturating_add(hop).min(stop);
        windows.push(FetchWindow::new(
            market.clone(),
            Some(cursor),
            Some(window_end),
        ));
        if window_end >= stop {
            break;
        }
        cursor = window_end;
    }
    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;
    use crate::utils::{TimeUtils, parse_utc};

    fn btc_daily() -> Market {
        Market::new("BTCUSDT", Interval::D1).unwrap()
    }

    #[test]
    fn no_window_exceeds_limit() {
        let start = parse_utc("2017-08-01").unwrap().timestamp_millis();
        let now = parse_utc("2026-10-19 13:37:00").unwrap().timestamp_millis();
        for limit in [2, 3, 10, 500, 1000] {
            for interval in [Interval::Min1, Interval::H1, Interval::D1, Interval::W1] {
                let market = Market::new("BTCUSDT", interval).unwrap();
                if interval == Interval::Min1 && limit < 500 {
                    continue; // millions of windows; the property is the same
                }
                let windows = plan_windows(&market, start, None, now, limit).unwrap();
                assert!(!windows.is_empty());
                for w in &windows {
                    assert!(w.max_candles().unwrap() <= limit as i64, "{w}");
                }
            }
        }
    }

    #[test]
    fn windows_chain_with_one_shared_boundary() {
        let start = parse_utc("2017-08-01").unwrap().timestamp_millis();
        let now = parse_utc("2026-10-19").unwrap().timestamp_millis();
        let windows = plan_windows(&btc_daily(), start, None, now, 1000).unwrap();

        assert_eq!(windows.first().unwrap().start_ms, Some(start));
        assert_eq!(windows.last().unwrap().end_ms, Some(now));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_ms, pair[1].start_ms);
        }
        // 3366 days of history, 999 new days per window
        let days = (now - start) / TimeUtils::MS_IN_D;
        assert_eq!(windows.len() as i64, (days + 998) / 999);
    }

    #[test]
    fn end_bound_is_respected() {
        let start = parse_utc("2020-01-01").unwrap().timestamp_millis();
        let end = parse_utc("2020-01-10").unwrap().timestamp_millis();
        let now = parse_utc("2026-01-01").unwrap().timestamp_millis();
        let windows = plan_windows(&btc_daily(), start, Some(end), now, 1000).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].end_ms, Some(end));
        assert_eq!(windows[0].max_candles(), Some(10));
    }

    #[test]
    fn end_in_future_is_clamped_to_now() {
        let now = parse_utc("2024-01-01").unwrap().timestamp_millis();
        let windows =
            plan_windows(&btc_daily(), now - TimeUtils::MS_IN_W, Some(i64::MAX), now, 1000)
                .unwrap();
        assert_eq!(windows.last().unwrap().end_ms, Some(now));
    }

    #[test]
    fn rejects_inverted_range_and_tiny_limit() {
        let now = 1_000_000_000_000;
        assert!(matches!(
            plan_windows(&btc_daily(), now + 1, None, now, 1000),
            Err(KlineError::Validation(_))
        ));
        assert!(matches!(
            plan_windows(&btc_daily(), 0, None, now, 1),
            Err(KlineError::Validation(_))
        ));
    }
}
