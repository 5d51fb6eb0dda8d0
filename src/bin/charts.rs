//! Chart aggregator process: consumes the trade stream into five-second
//! OHLC bars and answers history requests over the broker.

use derivex::broker::{Producer, connect_broker, nats_url};
use derivex::charts::ChartService;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = connect_broker(&nats_url()).await;
    let producer = Producer::with_client(client.clone());
    let service = ChartService::new(producer);

    info!("chart aggregator starting");
    tokio::select! {
        result = service.run(client) => {
            if let Err(e) = result {
                error!(error = %e, "chart consumer stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }
}
