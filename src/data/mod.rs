mod assembler;
mod cache;
mod client;
mod provider;
mod storage;
mod timeseries;

pub use {
    assembler::assemble,
    cache::{CacheEntry, SeriesCache},
    client::{MarketDataClient, MissingWindow, PaginatedFetch},
    provider::MarketDataProvider,
    storage::{MarketDataStorage, SqliteStorage},
    timeseries::BinanceProvider,
};
