//! Oracle ingester process: pushes index prices into the exchange over RPC
//! once a second.
//!
//! Stands in for the production oracle subscription with a bounded random
//! walk around fixed anchors, writing through the same
//! `handle_pricefeed_updates` path the real ingester uses.

use derivex::rpc_client::{RpcClient, exchange_rpc_url};
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Index anchors the walk oscillates around.
const ANCHORS: &[(&str, f64)] = &[
    ("BTC/USDC", 20_000.0),
    ("ETH/USDC", 2_000.0),
    ("APT/USDC", 10.0),
];

/// Maximum drift from the anchor, as a fraction.
const MAX_DRIFT: f64 = 0.02;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = RpcClient::new(exchange_rpc_url());
    let mut prices: Vec<(String, f64, f64)> = ANCHORS
        .iter()
        .map(|(name, anchor)| (name.to_string(), *anchor, *anchor))
        .collect();

    info!(indices = prices.len(), "price feeder starting");
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return;
            }
        }

        for (name, anchor, price) in prices.iter_mut() {
            let step = rand::thread_rng().gen_range(-0.001..=0.001);
            let next = (*price * (1.0 + step))
                .clamp(*anchor * (1.0 - MAX_DRIFT), *anchor * (1.0 + MAX_DRIFT));
            *price = (next * 100.0).round() / 100.0;

            match client.handle_pricefeed_update(name, *price).await {
                Ok(_) => debug!(index = %name, price = *price, "price published"),
                Err(e) => warn!(index = %name, error = %e, "exchange unavailable"),
            }
        }
    }
}
