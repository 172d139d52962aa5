//! File persistence configuration

/// Configuration for the kline snapshot store
pub struct KlinePersistenceConfig {
    /// Default SQLite database path
    pub db_path: &'static str,
    /// Table holding one row per candle
    pub table: &'static str,
    /// Rows per INSERT statement, keeps us under SQLite's 32k bound-parameter limit
    pub insert_chunk: usize,
}

pub struct PersistenceConfig {
    pub kline: KlinePersistenceConfig,
}

pub const PERSISTENCE: PersistenceConfig = PersistenceConfig {
    kline: KlinePersistenceConfig {
        db_path: "klines.sqlite",
        table: "klines",
        insert_chunk: 3000,
    },
};
