//! Background loops: per-instrument marking and stats tasks plus the
//! exchange-wide ticker publisher.
//!
//! Cadence is the contract here, not the thread model: EMA every second,
//! funding and stats every five seconds, tickers every two. Loops log and
//! continue on per-instrument problems and stop when their handles are
//! aborted at shutdown.

use crate::broker::PUBLIC_SUBS_TOPIC;
use crate::exchange::controller::Exchange;
use crate::exchange::ticker::{ChannelEvent, build_ticker};
use crate::pricing::{run_ema_loop, run_funding_loop};
use crate::utils::current_time_micros;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Spawn every background loop for an initialized exchange.
pub fn spawn_background_tasks(exchange: &Arc<Exchange>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for instrument in &exchange.instruments {
        if !instrument.is_active || instrument.is_expired {
            continue;
        }
        let book = Arc::clone(&instrument.book);
        handles.push(tokio::spawn(run_ema_loop(Arc::clone(&book))));

        if book.impact_price_notional().is_some() {
            handles.push(tokio::spawn(run_funding_loop(Arc::clone(&book))));
        }

        handles.push(tokio::spawn(run_stats_loop(book)));
    }

    handles.push(tokio::spawn(run_ticker_loop(Arc::clone(exchange))));
    info!(tasks = handles.len(), "background tasks started");
    handles
}

/// Five-second stats roll-up with the daily window reset.
async fn run_stats_loop(book: Arc<crate::matching::OrderBook>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        book.roll_stats();
        book.maybe_reset_daily_stats();
    }
}

/// Two-second ticker and index broadcast for every ready instrument.
async fn run_ticker_loop(exchange: Arc<Exchange>) {
    let mut interval = tokio::time::interval(Duration::from_secs(2));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        publish_tickers(&exchange);
    }
}

/// One ticker sweep. Instruments without an index price yet are skipped
/// entirely; the readiness predicate is the instrument's.
pub(crate) fn publish_tickers(exchange: &Exchange) {
    let mut events = Vec::new();

    for instrument in &exchange.instruments {
        if !instrument.is_active || instrument.is_expired || !instrument.is_ready() {
            continue;
        }
        let data = build_ticker(instrument);
        exchange.tickers.insert(instrument.name.clone(), data.clone());
        events.push(ChannelEvent {
            channel: format!("ticker.{}", instrument.name),
            data: serde_json::to_value(&data).unwrap_or_default(),
        });
    }

    for index in &exchange.indices {
        let price = index.price();
        if price > Decimal::ZERO {
            events.push(ChannelEvent {
                channel: format!("price_index.{}", index.name),
                data: json!({
                    "price": price,
                    "index_name": index.name,
                    "timestamp": current_time_micros(),
                }),
            });
        }
    }

    if !events.is_empty() {
        exchange.producer.produce_multiple(PUBLIC_SUBS_TOPIC, &events);
    }
}
