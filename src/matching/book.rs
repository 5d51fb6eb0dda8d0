//! Per-instrument order book: resting sides, aggregates, rolling stats and
//! read-only snapshots.
//!
//! The mutable core (both sides, aggregates, open interest, volume counters,
//! last trade) lives behind a single `RwLock`. The matching path is the only
//! writer; marking loops and snapshot queries are readers. The EMA and
//! funding-rate cells are written by the marking loops only and read
//! lock-free through `AtomicCell`.

use crate::markets::index::Index;
use crate::matching::order::{LimitOrder, PriorityKey, Side};
use crate::matching::trade::{Trade, TradeListener};
use crate::pricing;
use crate::utils::current_time_micros;
use crossbeam::atomic::AtomicCell;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock, RwLock};
use tracing::trace;

/// Mark-price clamp ratio for perpetual contracts (±0.5 % of index).
pub const PERP_CLAMP_RATIO: f64 = 0.005;

/// Mark-price clamp ratio for dated futures. The running system pins dated
/// marks essentially to the index; the ratio is a per-book parameter so the
/// value is a listing decision, not a code path.
pub const FUTURES_CLAMP_RATIO: f64 = 0.000_000_3;

/// Microseconds in the 24 h stats window.
const STATS_WINDOW_MICROS: u64 = 24 * 60 * 60 * 1_000_000;

/// Rolling 24 h statistics snapshot, refreshed every five seconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BookStats {
    /// Quote-denominated volume over the window.
    pub volume_usd: Decimal,
    /// Base (contract) volume over the window.
    pub volume: Decimal,
    /// Last price minus first price of the window.
    pub price_change: Decimal,
    pub low: Decimal,
    pub high: Decimal,
}

/// Mutable book state. Single writer (the matching path), many readers.
pub(super) struct BookCore {
    pub(super) bids: BTreeMap<PriorityKey, LimitOrder>,
    pub(super) asks: BTreeMap<PriorityKey, LimitOrder>,
    /// Arrival sequence, the final priority tiebreak.
    pub(super) next_seq: u64,
    pub(super) last_trade: Option<Trade>,
    /// Signed running sum of trade sizes: +size on aggressor buys.
    pub(super) open_interest: Decimal,
    pub(super) aggregated_bids_size: Decimal,
    pub(super) aggregated_asks_size: Decimal,
    pub(super) last_24h_prices: Vec<Decimal>,
    pub(super) volume: Decimal,
    pub(super) volume_usd: Decimal,
    /// Start of the current 24 h volume window, microseconds.
    pub(super) volume_window_start: u64,
}

impl BookCore {
    fn new() -> Self {
        Self {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            next_seq: 0,
            last_trade: None,
            open_interest: Decimal::ZERO,
            aggregated_bids_size: Decimal::ZERO,
            aggregated_asks_size: Decimal::ZERO,
            last_24h_prices: Vec::new(),
            volume: Decimal::ZERO,
            volume_usd: Decimal::ZERO,
            volume_window_start: current_time_micros(),
        }
    }

    pub(super) fn side(&self, side: Side) -> &BTreeMap<PriorityKey, LimitOrder> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub(super) fn side_mut(&mut self, side: Side) -> &mut BTreeMap<PriorityKey, LimitOrder> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Insert a resting order on its own side and grow that side's aggregate.
    pub(super) fn rest_order(&mut self, order: LimitOrder) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let key = PriorityKey::for_order(&order, seq);
        match order.side {
            Side::Buy => self.aggregated_bids_size += order.remaining,
            Side::Sell => self.aggregated_asks_size += order.remaining,
        }
        self.side_mut(order.side).insert(key, order);
    }

    /// Pop the best resting order from the given side.
    pub(super) fn pop_best(&mut self, side: Side) -> Option<LimitOrder> {
        let map = self.side_mut(side);
        let key = map.keys().next()?.clone();
        map.remove(&key)
    }

    pub(super) fn best_price(&self, side: Side) -> Option<Decimal> {
        self.side(side).values().next().map(|o| o.price)
    }

    /// Shrink the aggregate of the side that was consumed by a match of
    /// `volume` against the incoming order's side.
    pub(super) fn consume_aggregate(&mut self, incoming_side: Side, volume: Decimal) {
        match incoming_side {
            Side::Buy => self.aggregated_asks_size -= volume,
            Side::Sell => self.aggregated_bids_size -= volume,
        }
    }
}

/// A price-time priority order book for one instrument.
pub struct OrderBook {
    pub(super) instrument_name: String,
    /// Contract family, e.g. `"future"`; carried in trade envelopes.
    pub(super) kind: String,
    pub(super) index: Index,
    pub(super) core: RwLock<BookCore>,
    pub(super) stats: Mutex<BookStats>,
    /// Notified for every emitted trade; set once at exchange wiring time.
    pub(super) trade_listener: OnceLock<TradeListener>,
    /// EMA of the deviation between the fair/market price and the index.
    pub(super) ema: AtomicCell<f64>,
    /// Per-cycle funding rate, perpetuals only.
    pub(super) funding_rate: AtomicCell<f64>,
    pub(super) clamp_ratio: f64,
    /// Impact price notional (200 × max leverage); `None` for dated futures.
    pub(super) impact_price_notional: Option<Decimal>,
    pub(super) contract_size: Decimal,
}

impl OrderBook {
    /// Book for a perpetual contract.
    pub fn perp(
        instrument_name: impl Into<String>,
        index: Index,
        impact_price_notional: Decimal,
        contract_size: Decimal,
    ) -> Self {
        Self::build(
            instrument_name,
            index,
            PERP_CLAMP_RATIO,
            Some(impact_price_notional),
            contract_size,
        )
    }

    /// Book for a dated futures contract.
    pub fn dated_future(
        instrument_name: impl Into<String>,
        index: Index,
        contract_size: Decimal,
    ) -> Self {
        Self::build(instrument_name, index, FUTURES_CLAMP_RATIO, None, contract_size)
    }

    fn build(
        instrument_name: impl Into<String>,
        index: Index,
        clamp_ratio: f64,
        impact_price_notional: Option<Decimal>,
        contract_size: Decimal,
    ) -> Self {
        Self {
            instrument_name: instrument_name.into(),
            kind: "future".to_string(),
            index,
            core: RwLock::new(BookCore::new()),
            stats: Mutex::new(BookStats::default()),
            trade_listener: OnceLock::new(),
            ema: AtomicCell::new(0.0),
            funding_rate: AtomicCell::new(0.0),
            clamp_ratio,
            impact_price_notional,
            contract_size,
        }
    }

    /// Attach the trade listener. Later calls are ignored.
    pub fn set_trade_listener(&self, listener: TradeListener) {
        let _ = self.trade_listener.set(listener);
    }

    pub fn instrument_name(&self) -> &str {
        &self.instrument_name
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Book lifecycle state. Only `"open"` exists today.
    pub fn state(&self) -> &'static str {
        "open"
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn index_price(&self) -> Decimal {
        self.index.price()
    }

    pub fn contract_size(&self) -> Decimal {
        self.contract_size
    }

    pub fn impact_price_notional(&self) -> Option<Decimal> {
        self.impact_price_notional
    }

    pub fn clamp_ratio(&self) -> f64 {
        self.clamp_ratio
    }

    pub fn ema(&self) -> f64 {
        self.ema.load()
    }

    pub fn set_ema(&self, value: f64) {
        self.ema.store(value);
    }

    pub fn funding_rate(&self) -> f64 {
        self.funding_rate.load()
    }

    pub fn set_funding_rate(&self, value: f64) {
        self.funding_rate.store(value);
    }

    /// Reference price for P&L and liquidation: index plus the clamped EMA
    /// deviation. Zero while no index price has arrived.
    pub fn mark_price(&self) -> f64 {
        let index = self.index_price().to_f64().unwrap_or(0.0);
        pricing::clamped_mark_price(index, self.ema.load(), self.clamp_ratio)
    }

    pub fn best_bid_price(&self) -> Decimal {
        self.read_core(|core| core.best_price(Side::Buy).unwrap_or_default())
    }

    pub fn best_ask_price(&self) -> Decimal {
        self.read_core(|core| core.best_price(Side::Sell).unwrap_or_default())
    }

    pub fn best_bid_size(&self) -> Decimal {
        self.read_core(|core| {
            core.bids.values().next().map(|o| o.remaining).unwrap_or_default()
        })
    }

    pub fn best_ask_size(&self) -> Decimal {
        self.read_core(|core| {
            core.asks.values().next().map(|o| o.remaining).unwrap_or_default()
        })
    }

    /// Price of the most recent trade, zero before the first one.
    pub fn last_price(&self) -> Decimal {
        self.read_core(|core| {
            core.last_trade.as_ref().map(|t| t.price).unwrap_or_default()
        })
    }

    pub fn last_trade(&self) -> Option<Trade> {
        self.read_core(|core| core.last_trade.clone())
    }

    pub fn open_interest(&self) -> Decimal {
        self.read_core(|core| core.open_interest)
    }

    pub fn aggregated_bids_size(&self) -> Decimal {
        self.read_core(|core| core.aggregated_bids_size)
    }

    pub fn aggregated_asks_size(&self) -> Decimal {
        self.read_core(|core| core.aggregated_asks_size)
    }

    /// Top `depth` resting orders of one side as `(price, remaining)` rows in
    /// priority order.
    pub fn depth(&self, side: Side, depth: usize) -> Vec<(Decimal, Decimal)> {
        self.read_core(|core| {
            core.side(side)
                .values()
                .take(depth)
                .map(|o| (o.price, o.remaining))
                .collect()
        })
    }

    /// All resting `(price, remaining)` rows of one side in priority order,
    /// converted to floats for the impact-price walk.
    pub fn impact_levels(&self, side: Side) -> Vec<(f64, f64)> {
        self.read_core(|core| {
            core.side(side)
                .values()
                .map(|o| {
                    (
                        o.price.to_f64().unwrap_or(0.0),
                        o.remaining.to_f64().unwrap_or(0.0),
                    )
                })
                .collect()
        })
    }

    /// Number of resting orders across both sides.
    pub fn len(&self) -> usize {
        self.read_core(|core| core.bids.len() + core.asks.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> BookStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Five-second stats roll-up: copy volume counters and derive
    /// low/high/price-change from the 24 h price list.
    pub fn roll_stats(&self) {
        let (volume, volume_usd, low, high, price_change) = self.read_core(|core| {
            let low = core.last_24h_prices.iter().min().copied();
            let high = core.last_24h_prices.iter().max().copied();
            let change = match (core.last_24h_prices.first(), core.last_24h_prices.last()) {
                (Some(first), Some(last)) => *last - *first,
                _ => Decimal::ZERO,
            };
            (core.volume, core.volume_usd, low, high, change)
        });

        if let Ok(mut stats) = self.stats.lock() {
            stats.volume = volume;
            stats.volume_usd = volume_usd;
            stats.price_change = price_change;
            if let (Some(low), Some(high)) = (low, high) {
                stats.low = low;
                stats.high = high;
            }
        }
    }

    /// Reset the 24 h window once a full day has elapsed since its start.
    pub fn maybe_reset_daily_stats(&self) {
        let now = current_time_micros();
        let mut core = match self.core.write() {
            Ok(core) => core,
            Err(_) => return,
        };
        if now.saturating_sub(core.volume_window_start) >= STATS_WINDOW_MICROS {
            trace!(instrument = %self.instrument_name, "resetting 24h stats window");
            core.volume_window_start = now;
            core.last_24h_prices.clear();
            core.volume = Decimal::ZERO;
            core.volume_usd = Decimal::ZERO;
        }
    }

    pub(super) fn read_core<R>(&self, f: impl FnOnce(&BookCore) -> R) -> R {
        match self.core.read() {
            Ok(core) => f(&core),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    pub(super) fn write_core<R>(&self, f: impl FnOnce(&mut BookCore) -> R) -> R {
        match self.core.write() {
            Ok(mut core) => f(&mut core),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("instrument_name", &self.instrument_name)
            .field("orders", &self.len())
            .field("open_interest", &self.open_interest())
            .field("ema", &self.ema.load())
            .field("funding_rate", &self.funding_rate.load())
            .finish()
    }
}
