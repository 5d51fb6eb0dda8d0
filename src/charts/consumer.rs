//! Broker-driven chart service: consumes the trade stream into base bars,
//! answers history requests, and closes windows on a five-second schedule.

use crate::broker::{CHART_REQS_TOPIC, PUBLIC_SUBS_TOPIC, Producer, RESPONSES_TOPIC, TRADES_TOPIC};
use crate::charts::aggregator::{Bar, OhlcAggregator};
use crate::exchange::ticker::ChannelEvent;
use crate::utils::current_time_millis;
use futures::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Trade fields the chart service cares about.
#[derive(Debug, Deserialize)]
struct TradeTick {
    /// Microseconds since epoch.
    timestamp: u64,
    price: Decimal,
    size: Decimal,
}

#[derive(Debug, Deserialize)]
struct TradeFeedMessage {
    instrument_name: String,
    trade: TradeTick,
}

#[derive(Debug, Deserialize)]
struct ChartRequestParams {
    instrument_name: String,
    from: i64,
    to: i64,
    resolution: String,
}

#[derive(Debug, Deserialize)]
struct ChartRequest {
    req_id: serde_json::Value,
    params: ChartRequestParams,
}

/// The chart aggregation process.
pub struct ChartService {
    aggregator: Mutex<OhlcAggregator>,
    producer: Producer,
}

impl ChartService {
    pub fn new(producer: Producer) -> Self {
        Self {
            aggregator: Mutex::new(OhlcAggregator::new(current_time_millis() as i64)),
            producer,
        }
    }

    /// Consume `trades` and `chartReqs` until the broker connection drops.
    pub async fn run(&self, client: async_nats::Client) -> Result<(), async_nats::Error> {
        let mut trades = client.subscribe(TRADES_TOPIC).await?;
        let mut requests = client.subscribe(CHART_REQS_TOPIC).await?;
        let mut close_timer = tokio::time::interval(Duration::from_secs(5));
        close_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!("chart consumer started");

        loop {
            tokio::select! {
                Some(message) = trades.next() => self.handle_trade(&message.payload),
                Some(message) = requests.next() => self.handle_request(&message.payload),
                _ = close_timer.tick() => self.close_windows(),
                else => break,
            }
        }
        Ok(())
    }

    fn handle_trade(&self, payload: &[u8]) {
        let message: TradeFeedMessage = match serde_json::from_slice(payload) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "unparseable trade message");
                return;
            }
        };

        let time_ms = (message.trade.timestamp / 1_000) as i64;
        let bar = match self.aggregator.lock() {
            Ok(mut aggregator) => aggregator.apply_tick(
                &message.instrument_name,
                time_ms,
                message.trade.price,
                message.trade.size,
            ),
            Err(_) => return,
        };
        self.publish_bar(&message.instrument_name, &bar);
    }

    fn handle_request(&self, payload: &[u8]) {
        let request: ChartRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparseable chart request");
                return;
            }
        };

        let history = match self.aggregator.lock() {
            Ok(aggregator) => aggregator.history(
                &request.params.instrument_name,
                request.params.from,
                request.params.to,
                &request.params.resolution,
            ),
            Err(_) => return,
        };

        let response = match history {
            Ok(bars) => json!({ "req_id": request.req_id, "result": bars }),
            Err(e) => {
                debug!(error = %e, "chart request failed");
                json!({ "req_id": request.req_id, "result": [], "error": e.to_string() })
            }
        };
        self.producer.produce(RESPONSES_TOPIC, &response);
    }

    fn close_windows(&self) {
        let flat_bars = match self.aggregator.lock() {
            Ok(mut aggregator) => aggregator.on_close(current_time_millis() as i64),
            Err(_) => return,
        };
        for (instrument_name, bar) in flat_bars {
            self.publish_bar(&instrument_name, &bar);
        }
    }

    fn publish_bar(&self, instrument_name: &str, bar: &Bar) {
        self.producer.produce(
            PUBLIC_SUBS_TOPIC,
            &ChannelEvent {
                channel: format!("chart.trade.{instrument_name}"),
                data: serde_json::to_value(bar).unwrap_or_default(),
            },
        );
    }
}
