//! OHLC aggregation: base-resolution bars from the trade stream with
//! on-demand resampling.

pub mod aggregator;
pub mod consumer;

pub use aggregator::{BASE_RESOLUTION_MS, Bar, OhlcAggregator, parse_resolution};
pub use consumer::ChartService;
