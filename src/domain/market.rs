use {
    crate::{
        config::BINANCE_QUOTE_ASSETS,
        domain::Interval,
        error::{KlineError, Result},
    },
    serde::{Deserialize, Serialize},
    std::str::FromStr,
};

/// A validated (symbol, interval) pair. Construction is the only validation point.
#[derive(Serialize, Deserialize, Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Market {
    symbol: String,
    interval: Interval,
}

impl Market {
    pub fn new(symbol: &str, interval: Interval) -> Result<Self> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(KlineError::validation("symbol is empty"));
        }
        if !symbol
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(KlineError::validation(format!(
                "symbol '{}' must be upper-case alphanumeric",
                symbol
            )));
        }
        match Self::get_base(symbol) {
            Some(base) if !base.is_empty() => Ok(Self {
                symbol: symbol.to_string(),
                interval,
            }),
            _ => Err(KlineError::validation(format!(
                "symbol '{}' does not end in a known quote asset",
                symbol
            ))),
        }
    }

    /// Validate both halves from their string forms, e.g. `("BTCUSDT", "1d")`.
    pub fn parse(symbol: &str, interval: &str) -> Result<Self> {
        let interval = Interval::from_str(interval.trim()).map_err(|_| {
            KlineError::validation(format!("unsupported interval '{}'", interval))
        })?;
        Self::new(symbol, interval)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval.duration_ms()
    }

    pub fn get_base(text: &str) -> Option<&str> {
        let quote = Self::get_quote(text)?;
        text.strip_suffix(quote)
    }

    pub fn get_quote(text: &str) -> Option<&str> {
        BINANCE_QUOTE_ASSETS
            .iter()
            .find(|&&ext| text.ends_with(ext))
            .copied()
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_pairs() {
        let m = Market::parse("BTCUSDT", "1d").unwrap();
        assert_eq!(m.symbol(), "BTCUSDT");
        assert_eq!(m.interval(), Interval::D1);
        assert_eq!(m.to_string(), "BTCUSDT@1d");
        assert_eq!(Market::get_base("ETHBTC"), Some("ETH"));
        assert_eq!(Market::get_quote("SOLFDUSD"), Some("FDUSD"));
    }

    #[test]
    fn rejects_bad_symbols_and_intervals() {
        for bad in ["", "   ", "btcusdt", "BTC-USDT", "USDT", "BTCXYZ"] {
            let err = Market::parse(bad, "1d").unwrap_err();
            assert!(matches!(err, KlineError::Validation(_)), "{bad:?}");
        }
        let err = Market::parse("BTCUSDT", "7d").unwrap_err();
        assert!(matches!(err, KlineError::Validation(_)));
    }
}
