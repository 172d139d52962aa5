mod core;
mod messages;

pub use core::GraphEngine;

pub use messages::{
    CandlestickData, ComparativeData, ComparativePanel, DateRange, GraphData, GraphRequest,
    GraphResponse, HistogramData, Panel,
};
