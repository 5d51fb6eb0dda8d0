//! Order types, the per-instrument order book and the matching engine.

mod book;
mod matching;
mod order;
mod trade;

pub use book::{BookStats, FUTURES_CLAMP_RATIO, OrderBook, PERP_CLAMP_RATIO};
pub use matching::ProcessReport;
pub use order::{
    CancelOrder, LimitOrder, MarketOrder, Order, OrderKind, OrderSnapshot, Side, TimeInForce,
};
pub use trade::{Trade, TradeEnvelope, TradeListener};
