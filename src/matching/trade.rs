//! Immutable trade records and the trade listener hook.

use crate::matching::order::Side;
use crate::utils::current_time_micros;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single execution between an aggressor and a resting order.
///
/// The price is always the resting (maker) order's price; the side is the
/// aggressor's. Trades are immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Execution time in microseconds since epoch.
    pub timestamp: u64,
    /// Side of the aggressor.
    pub side: Side,
    /// Price of the resting order.
    pub price: Decimal,
    pub size: Decimal,
    /// Account of the aggressor.
    pub taker: String,
    /// Account of the resting order.
    pub maker: String,
    pub incoming_order_id: String,
    pub book_order_id: String,
}

impl Trade {
    pub fn new(
        taker: impl Into<String>,
        maker: impl Into<String>,
        incoming_side: Side,
        price: Decimal,
        size: Decimal,
        incoming_order_id: impl Into<String>,
        book_order_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: current_time_micros(),
            side: incoming_side,
            price,
            size,
            taker: taker.into(),
            maker: maker.into(),
            incoming_order_id: incoming_order_id.into(),
            book_order_id: book_order_id.into(),
        }
    }
}

/// Broker envelope for a trade on the `trades` subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEnvelope {
    pub instrument_name: String,
    pub kind: String,
    pub trade: Trade,
}

/// Callback invoked for every emitted trade.
///
/// The exchange wires this to the broker producer; the call must not block
/// the matching path.
pub type TradeListener = Arc<dyn Fn(&TradeEnvelope) + Send + Sync>;
