// The Binance kline loader
pub mod bn_kline;

pub use bn_kline::BinanceProvider;
