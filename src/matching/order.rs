//! Order variants accepted by the matching engine and their priority order.
//!
//! Resting orders are kept in strict price-time-size priority: best price
//! first, then earliest arrival, then smallest remaining at rest. A per-book
//! arrival sequence number is the final tiebreak so the order is total and
//! deterministic.

use crate::utils::current_time_micros;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

/// Side of an order or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Bid side.
    Buy,
    /// Ask side.
    Sell,
}

impl Side {
    /// The side an aggressive order of this side matches against.
    #[inline]
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Lowercase wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-in-force policy for limit orders.
///
/// GTC residuals rest on the book; IOC residuals are cancelled after the
/// matching sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled.
    #[serde(rename = "GTC")]
    Gtc,
    /// Immediate-or-cancel.
    #[serde(rename = "IOC")]
    Ioc,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => f.write_str("GTC"),
            TimeInForce::Ioc => f.write_str("IOC"),
        }
    }
}

/// A resting-capable limit order.
#[derive(Debug, Clone)]
pub struct LimitOrder {
    /// Stable identifier, generated when the caller does not provide one.
    pub order_id: String,
    /// Owning account address.
    pub fromaddr: String,
    pub side: Side,
    /// Original size in contracts.
    pub size: Decimal,
    /// Unfilled size; `remaining <= size`, strictly positive while resting.
    pub remaining: Decimal,
    /// Leverage the order was placed at, >= 1.
    pub leverage: u32,
    /// Limit price, quantized to the instrument tick upstream.
    pub price: Decimal,
    pub time_in_force: TimeInForce,
    /// Arrival time in microseconds since epoch.
    pub created_time: u64,
    pub label: String,
    pub is_liquidation: bool,
}

impl LimitOrder {
    pub fn new(
        fromaddr: impl Into<String>,
        order_id: Option<String>,
        side: Side,
        size: Decimal,
        leverage: u32,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            order_id: order_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            fromaddr: fromaddr.into(),
            side,
            size,
            remaining: size,
            leverage,
            price,
            time_in_force,
            created_time: current_time_micros(),
            label: String::new(),
            is_liquidation: false,
        }
    }

    /// Serializable view of this order.
    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            order_id: self.order_id.clone(),
            created_time: self.created_time,
            kind: OrderKind::Limit,
            side: Some(self.side),
            size: self.size,
            remaining: self.remaining,
            price: Some(self.price),
            leverage: self.leverage,
            time_in_force: Some(self.time_in_force),
            fromaddr: self.fromaddr.clone(),
            label: self.label.clone(),
            is_liquidation: self.is_liquidation,
        }
    }
}

impl fmt::Display for LimitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Limit Order: {} {} units at {}",
            self.side, self.remaining, self.price
        )
    }
}

/// An order executed immediately against the book; never rests.
#[derive(Debug, Clone)]
pub struct MarketOrder {
    pub order_id: String,
    pub fromaddr: String,
    pub side: Side,
    pub size: Decimal,
    pub remaining: Decimal,
    pub leverage: u32,
    pub created_time: u64,
    pub label: String,
    pub is_liquidation: bool,
}

impl MarketOrder {
    pub fn new(
        fromaddr: impl Into<String>,
        order_id: Option<String>,
        side: Side,
        size: Decimal,
        leverage: u32,
    ) -> Self {
        Self {
            order_id: order_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            fromaddr: fromaddr.into(),
            side,
            size,
            remaining: size,
            leverage,
            created_time: current_time_micros(),
            label: String::new(),
            is_liquidation: false,
        }
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            order_id: self.order_id.clone(),
            created_time: self.created_time,
            kind: OrderKind::Market,
            side: Some(self.side),
            size: self.size,
            remaining: self.remaining,
            price: None,
            leverage: self.leverage,
            time_in_force: None,
            fromaddr: self.fromaddr.clone(),
            label: self.label.clone(),
            is_liquidation: self.is_liquidation,
        }
    }
}

impl fmt::Display for MarketOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Market Order: {} {} units", self.side, self.remaining)
    }
}

/// Removes a resting order by id. Unknown ids are a no-op at the book level.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    /// Id of the resting order to remove.
    pub order_id: String,
    pub fromaddr: String,
    pub created_time: u64,
    pub label: String,
    pub is_liquidation: bool,
}

impl CancelOrder {
    pub fn new(fromaddr: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            fromaddr: fromaddr.into(),
            created_time: current_time_micros(),
            label: String::new(),
            is_liquidation: false,
        }
    }

    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            order_id: self.order_id.clone(),
            created_time: self.created_time,
            kind: OrderKind::Cancel,
            side: None,
            size: Decimal::ZERO,
            remaining: Decimal::ZERO,
            price: None,
            leverage: 1,
            time_in_force: None,
            fromaddr: self.fromaddr.clone(),
            label: self.label.clone(),
            is_liquidation: self.is_liquidation,
        }
    }
}

impl fmt::Display for CancelOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cancel Order: {}", self.order_id)
    }
}

/// Tagged order variant submitted to [`crate::matching::OrderBook::process_order`].
#[derive(Debug, Clone)]
pub enum Order {
    Limit(LimitOrder),
    Market(MarketOrder),
    Cancel(CancelOrder),
}

impl Order {
    pub fn order_id(&self) -> &str {
        match self {
            Order::Limit(o) => &o.order_id,
            Order::Market(o) => &o.order_id,
            Order::Cancel(o) => &o.order_id,
        }
    }

    pub fn fromaddr(&self) -> &str {
        match self {
            Order::Limit(o) => &o.fromaddr,
            Order::Market(o) => &o.fromaddr,
            Order::Cancel(o) => &o.fromaddr,
        }
    }
}

/// Kind discriminant carried in [`OrderSnapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    Limit,
    Market,
    Cancel,
}

/// Serializable view of an order at a point in time.
///
/// Snapshots populate the `updated`/`filled`/`cancelled` report maps, the
/// per-account open-order tables, and the open-order margin formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub created_time: u64,
    pub kind: OrderKind,
    pub side: Option<Side>,
    pub size: Decimal,
    pub remaining: Decimal,
    pub price: Option<Decimal>,
    pub leverage: u32,
    pub time_in_force: Option<TimeInForce>,
    pub fromaddr: String,
    pub label: String,
    pub is_liquidation: bool,
}

/// Priority key for resting orders on one book side.
///
/// Keys on the bid side compare price descending, the ask side ascending;
/// both then compare arrival time, remaining at rest, and the arrival
/// sequence ascending. All keys in one map share the same side, so the
/// ordering is total within a side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PriorityKey {
    pub side: Side,
    pub price: Decimal,
    pub created_time: u64,
    pub remaining: Decimal,
    pub seq: u64,
}

impl PriorityKey {
    pub(crate) fn for_order(order: &LimitOrder, seq: u64) -> Self {
        Self {
            side: order.side,
            price: order.price,
            created_time: order.created_time,
            remaining: order.remaining,
            seq,
        }
    }
}

impl Ord for PriorityKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_price = match self.side {
            Side::Buy => other.price.cmp(&self.price),
            Side::Sell => self.price.cmp(&other.price),
        };
        by_price
            .then_with(|| self.created_time.cmp(&other.created_time))
            .then_with(|| self.remaining.cmp(&other.remaining))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for PriorityKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
