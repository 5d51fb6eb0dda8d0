//! Ticker snapshots and broker channel events.

use crate::markets::Instrument;
use crate::matching::{BookStats, Side};
use crate::utils::current_time_micros;
use rust_decimal::Decimal;
use serde::Serialize;

/// Book rows included in a ticker payload, per side.
const TICKER_DEPTH: usize = 20;

/// A `{channel, data}` event on the `public_subs` subject.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelEvent {
    pub channel: String,
    pub data: serde_json::Value,
}

/// Snapshot of one instrument's market state, published every two seconds.
#[derive(Debug, Clone, Serialize)]
pub struct TickerData {
    pub base_currency: String,
    pub quote_currency: String,
    pub instrument_name: String,
    pub state: String,
    pub timestamp: u64,
    pub best_ask_amount: Decimal,
    pub best_ask_price: Decimal,
    pub best_bid_amount: Decimal,
    pub best_bid_price: Decimal,
    pub contract_size: Decimal,
    pub estimated_delivery_price: Decimal,
    pub funding_rate: f64,
    pub index_price: Decimal,
    pub last_price: Decimal,
    pub mark_price: f64,
    pub open_interest: Decimal,
    /// Top-of-book `(price, remaining)` rows in priority order.
    pub asks: Vec<(Decimal, Decimal)>,
    pub bids: Vec<(Decimal, Decimal)>,
    pub stats: BookStats,
}

/// Assemble the ticker snapshot for one instrument.
pub fn build_ticker(instrument: &Instrument) -> TickerData {
    let book = &instrument.book;
    TickerData {
        base_currency: instrument.base_currency.symbol.clone(),
        quote_currency: instrument.quote_currency.symbol.clone(),
        instrument_name: instrument.name.clone(),
        state: book.state().to_string(),
        timestamp: current_time_micros(),
        best_ask_amount: book.best_ask_size(),
        best_ask_price: book.best_ask_price(),
        best_bid_amount: book.best_bid_size(),
        best_bid_price: book.best_bid_price(),
        contract_size: instrument.contract_size,
        estimated_delivery_price: Decimal::ZERO,
        funding_rate: book.funding_rate(),
        index_price: instrument.index_price(),
        last_price: book.last_price(),
        mark_price: instrument.mark_price(),
        open_interest: book.open_interest(),
        asks: book.depth(Side::Sell, TICKER_DEPTH),
        bids: book.depth(Side::Buy, TICKER_DEPTH),
        stats: book.stats(),
    }
}
