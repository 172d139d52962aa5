pub struct AssetResources {
    pub pairs: &'static [&'static str],
}

pub struct AssetConfig {
    /// Pairs offered by the asset selector when nothing else is configured.
    pub dashboard: AssetResources,
    /// Pairs the snapshot binary pre-populates.
    pub snapshot: AssetResources,
    /// Earliest date we ask Binance for (first day of BTCUSDT spot history).
    pub history_start: &'static str,
}

pub const ASSETS: AssetConfig = AssetConfig {
    dashboard: AssetResources {
        pairs: &["ETHUSDT", "BTCUSDT"],
    },
    snapshot: AssetResources {
        pairs: &[
            "BTCUSDT", "ETHUSDT", "BNBUSDT", "XRPUSDT", "ADAUSDT", "DOGEUSDT", "TRXUSDT",
            "SOLUSDT", "LTCUSDT", "DOTUSDT", "MATICUSDT", "BCHUSDT", "AVAXUSDT", "SHIBUSDT",
            "LINKUSDT", "ATOMUSDT", "XMRUSDT", "UNIUSDT", "VETUSDT", "FILUSDT",
        ],
    },
    history_start: "2017-08-01",
};
