//! Core matching loop: aggressive orders sweep the opposite side in strict
//! priority order, partial fills re-rest the maker leftover, and every
//! operation reports the orders and accounts it touched.

use crate::matching::book::{BookCore, OrderBook};
use crate::matching::order::{
    CancelOrder, LimitOrder, MarketOrder, Order, OrderSnapshot, Side, TimeInForce,
};
use crate::matching::trade::{Trade, TradeEnvelope};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Outcome of one `process_order` call.
///
/// `updated` holds orders left partially filled (including a freshly rested
/// incoming order), `filled` orders consumed to zero, `cancelled` orders
/// removed without execution (explicit cancels and IOC residuals).
#[derive(Debug, Default)]
pub struct ProcessReport {
    pub trades: Vec<Trade>,
    pub updated: HashMap<String, OrderSnapshot>,
    pub filled: HashMap<String, OrderSnapshot>,
    pub cancelled: HashMap<String, OrderSnapshot>,
    pub involved_accounts: HashSet<String>,
}

/// Incoming aggressor, unified over limit and market orders.
enum Aggressor {
    Limit(LimitOrder),
    Market(MarketOrder),
}

impl Aggressor {
    fn side(&self) -> Side {
        match self {
            Aggressor::Limit(o) => o.side,
            Aggressor::Market(o) => o.side,
        }
    }

    fn remaining(&self) -> Decimal {
        match self {
            Aggressor::Limit(o) => o.remaining,
            Aggressor::Market(o) => o.remaining,
        }
    }

    fn fill(&mut self, volume: Decimal) {
        match self {
            Aggressor::Limit(o) => o.remaining -= volume,
            Aggressor::Market(o) => o.remaining -= volume,
        }
    }

    fn order_id(&self) -> &str {
        match self {
            Aggressor::Limit(o) => &o.order_id,
            Aggressor::Market(o) => &o.order_id,
        }
    }

    fn fromaddr(&self) -> &str {
        match self {
            Aggressor::Limit(o) => &o.fromaddr,
            Aggressor::Market(o) => &o.fromaddr,
        }
    }

    fn snapshot(&self) -> OrderSnapshot {
        match self {
            Aggressor::Limit(o) => o.snapshot(),
            Aggressor::Market(o) => o.snapshot(),
        }
    }

    /// Whether this order still crosses the best resting price.
    fn crosses(&self, best_opposite: Decimal) -> bool {
        match self {
            Aggressor::Market(_) => true,
            Aggressor::Limit(o) => match o.side {
                Side::Buy => o.price >= best_opposite,
                Side::Sell => o.price <= best_opposite,
            },
        }
    }
}

impl OrderBook {
    /// Process an incoming order against the book.
    ///
    /// Cancels remove at most one resting order (ids are unique) and are a
    /// no-op when the id is unknown. Limit and market orders sweep the
    /// opposite side while they cross; GTC residuals rest, IOC residuals are
    /// cancelled, market residuals are dropped.
    pub fn process_order(&self, order: Order) -> ProcessReport {
        let mut report = ProcessReport::default();

        match order {
            Order::Cancel(cancel) => {
                self.write_core(|core| self.apply_cancel(core, &cancel, &mut report));
                report
            }
            Order::Limit(order) => {
                self.write_core(|core| {
                    self.match_aggressor(core, Aggressor::Limit(order), &mut report)
                });
                report
            }
            Order::Market(order) => {
                self.write_core(|core| {
                    self.match_aggressor(core, Aggressor::Market(order), &mut report)
                });
                report
            }
        }
    }

    fn apply_cancel(&self, core: &mut BookCore, cancel: &CancelOrder, report: &mut ProcessReport) {
        for side in [Side::Buy, Side::Sell] {
            let found = core
                .side(side)
                .iter()
                .find(|(_, o)| o.order_id == cancel.order_id)
                .map(|(key, _)| key.clone());

            if let Some(key) = found {
                if let Some(removed) = core.side_mut(side).remove(&key) {
                    match side {
                        Side::Buy => core.aggregated_bids_size -= removed.remaining,
                        Side::Sell => core.aggregated_asks_size -= removed.remaining,
                    }
                    trace!(
                        instrument = %self.instrument_name,
                        order_id = %cancel.order_id,
                        "cancelled resting order"
                    );
                    report
                        .cancelled
                        .insert(cancel.order_id.clone(), cancel.snapshot());
                }
                return;
            }
        }
    }

    fn match_aggressor(
        &self,
        core: &mut BookCore,
        mut incoming: Aggressor,
        report: &mut ProcessReport,
    ) {
        let side = incoming.side();
        let opposite = side.opposite();

        loop {
            if incoming.remaining().is_zero() {
                break;
            }
            let best = match core.best_price(opposite) {
                Some(price) => price,
                None => break,
            };
            if !incoming.crosses(best) {
                break;
            }

            let mut book_order = match core.pop_best(opposite) {
                Some(order) => order,
                None => break,
            };

            let volume = incoming.remaining().min(book_order.remaining);
            incoming.fill(volume);
            book_order.remaining -= volume;
            core.consume_aggregate(side, volume);

            let trade = Trade::new(
                incoming.fromaddr(),
                book_order.fromaddr.clone(),
                side,
                book_order.price,
                volume,
                incoming.order_id(),
                book_order.order_id.clone(),
            );

            report.involved_accounts.insert(book_order.fromaddr.clone());
            report
                .involved_accounts
                .insert(incoming.fromaddr().to_string());

            let incoming_done = incoming.remaining().is_zero();
            let book_done = book_order.remaining.is_zero();

            if book_done {
                report
                    .filled
                    .insert(book_order.order_id.clone(), book_order.snapshot());
            } else {
                report
                    .updated
                    .insert(book_order.order_id.clone(), book_order.snapshot());
            }
            if incoming_done {
                report
                    .filled
                    .insert(incoming.order_id().to_string(), incoming.snapshot());
            } else {
                report
                    .updated
                    .insert(incoming.order_id().to_string(), incoming.snapshot());
            }

            self.execute_trade(core, trade, report);

            if !book_done {
                // Maker leftover goes back to the front of its side.
                core.rest_order(book_order);
                break;
            }
            if incoming_done {
                break;
            }
        }

        self.settle_residual(core, incoming, report);
    }

    /// Rest, cancel or drop whatever is left of the aggressor after the sweep.
    fn settle_residual(
        &self,
        core: &mut BookCore,
        incoming: Aggressor,
        report: &mut ProcessReport,
    ) {
        match incoming {
            Aggressor::Limit(order) if !order.remaining.is_zero() => match order.time_in_force {
                TimeInForce::Gtc => {
                    report.involved_accounts.insert(order.fromaddr.clone());
                    report.updated.insert(order.order_id.clone(), order.snapshot());
                    trace!(
                        instrument = %self.instrument_name,
                        order_id = %order.order_id,
                        remaining = %order.remaining,
                        "resting GTC residual"
                    );
                    core.rest_order(order);
                }
                TimeInForce::Ioc => {
                    report.involved_accounts.insert(order.fromaddr.clone());
                    report
                        .cancelled
                        .insert(order.order_id.clone(), order.snapshot());
                }
            },
            // Fully filled limit orders are already classified; market
            // residuals are dropped, there is no side to rest them on.
            _ => {}
        }
    }

    /// Record an emitted trade: update last trade, open interest, volume
    /// counters and the 24 h price list, then notify the listener.
    ///
    /// Self-trades consume liquidity but are not emitted and leave the trade
    /// statistics untouched.
    fn execute_trade(&self, core: &mut BookCore, trade: Trade, report: &mut ProcessReport) {
        if trade.taker == trade.maker {
            trace!(
                instrument = %self.instrument_name,
                account = %trade.taker,
                "self-trade suppressed"
            );
            return;
        }

        match trade.side {
            Side::Buy => core.open_interest += trade.size,
            Side::Sell => core.open_interest -= trade.size,
        }
        if trade.timestamp > core.volume_window_start {
            core.volume += trade.size.abs();
            core.volume_usd += (trade.size * trade.price).abs();
        }
        core.last_24h_prices.push(trade.price.abs());
        core.last_trade = Some(trade.clone());

        if let Some(listener) = self.trade_listener.get() {
            listener(&TradeEnvelope {
                instrument_name: self.instrument_name.clone(),
                kind: self.kind.clone(),
                trade: trade.clone(),
            });
        }

        report.trades.push(trade);
    }
}
