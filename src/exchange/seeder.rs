//! Market-maker seeder: internal order submission that bypasses RPC
//! validation and the margin gate but runs through the same book and
//! accounting paths as client orders.

use crate::error::ExchangeResult;
use crate::exchange::controller::Exchange;
use crate::matching::{CancelOrder, LimitOrder, MarketOrder, Order, Side, TimeInForce};
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Leverage used by seeded orders.
const SEED_LEVERAGE: u32 = 10;

/// Price step between seeded ladder levels.
const LADDER_STEP: f64 = 0.05;

/// Levels quoted per side.
const LADDER_LEVELS: i64 = 20;

impl Exchange {
    /// Submit a limit order directly to the book. Returns the order id.
    pub fn seed_limit_order(
        &self,
        from: &str,
        instrument_name: &str,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> ExchangeResult<String> {
        let instrument = self.instrument(instrument_name)?;
        self.accounts.ensure(from);
        let order = LimitOrder::new(from, None, side, size, SEED_LEVERAGE, price, TimeInForce::Gtc);
        let order_id = order.order_id.clone();
        self.submit(instrument, Order::Limit(order), SEED_LEVERAGE, "limit");
        Ok(order_id)
    }

    /// Submit a market order directly to the book. Returns the order id.
    pub fn seed_market_order(
        &self,
        from: &str,
        instrument_name: &str,
        side: Side,
        size: Decimal,
    ) -> ExchangeResult<String> {
        let instrument = self.instrument(instrument_name)?;
        self.accounts.ensure(from);
        let order = MarketOrder::new(from, None, side, size, SEED_LEVERAGE);
        let order_id = order.order_id.clone();
        self.submit(instrument, Order::Market(order), SEED_LEVERAGE, "market");
        Ok(order_id)
    }

    /// Cancel a seeded order. Unknown ids are a no-op.
    pub fn seed_cancel_order(
        &self,
        from: &str,
        instrument_name: &str,
        order_id: &str,
    ) -> ExchangeResult<()> {
        let instrument = self.instrument(instrument_name)?;
        let order = CancelOrder::new(from, order_id);
        self.submit(instrument, Order::Cancel(order), SEED_LEVERAGE, "cancel");
        Ok(())
    }
}

/// Quote a ladder of bids and asks around the index on every instrument and
/// poke the book with a small market order, re-quoting every five seconds.
pub async fn run_market_maker(exchange: Arc<Exchange>) {
    let maker_addr = "0x01";
    let taker_addr = "0x02";
    let mut buy_ids: HashMap<String, Vec<String>> = HashMap::new();
    let mut sell_ids: HashMap<String, Vec<String>> = HashMap::new();

    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        for instrument in &exchange.instruments {
            let index_price = instrument.index_price();
            if index_price <= Decimal::ZERO {
                continue;
            }
            let name = instrument.name.clone();

            for order_id in buy_ids.remove(&name).unwrap_or_default() {
                let _ = exchange.seed_cancel_order(maker_addr, &name, &order_id);
            }
            for order_id in sell_ids.remove(&name).unwrap_or_default() {
                let _ = exchange.seed_cancel_order(taker_addr, &name, &order_id);
            }

            let step = Decimal::from_f64(LADDER_STEP).unwrap_or_default();
            let mut new_buys = Vec::new();
            let mut new_sells = Vec::new();

            for level in 1..=LADDER_LEVELS {
                let size = Decimal::from(20 * rand::thread_rng().gen_range(1..=50));
                let bid_price =
                    (index_price - step * Decimal::from(level - 1)).max(Decimal::ZERO);
                if let Ok(order_id) = exchange.seed_limit_order(
                    maker_addr,
                    &name,
                    Side::Buy,
                    size,
                    instrument.quantize_price(bid_price),
                ) {
                    new_buys.push(order_id);
                }

                let size = Decimal::from(20 * rand::thread_rng().gen_range(1..=50));
                let ask_price = index_price + step * Decimal::from(level);
                if let Ok(order_id) = exchange.seed_limit_order(
                    taker_addr,
                    &name,
                    Side::Sell,
                    size,
                    instrument.quantize_price(ask_price),
                ) {
                    new_sells.push(order_id);
                }
            }

            let _ =
                exchange.seed_market_order(taker_addr, &name, Side::Sell, Decimal::ONE);

            trace!(instrument = %name, "requoted market-maker ladder");
            buy_ids.insert(name.clone(), new_buys);
            sell_ids.insert(name, new_sells);
        }
    }
}
