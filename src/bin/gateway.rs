//! WebSocket gateway process: relays broker events to browser clients on
//! port 8082 and polls account state for connected account subscribers.

use derivex::broker::{connect_broker, nats_url};
use derivex::gateway::{Gateway, router, run_account_broadcast, run_fanout};
use derivex::rpc_client::{RpcClient, exchange_rpc_url};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const WS_ADDR: &str = "0.0.0.0:8082";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = connect_broker(&nats_url()).await;
    let gateway = Arc::new(Gateway::new(RpcClient::new(exchange_rpc_url())));

    tokio::spawn(run_account_broadcast(Arc::clone(&gateway)));
    let fanout = tokio::spawn(run_fanout(Arc::clone(&gateway), client));

    let app = router(Arc::clone(&gateway));
    let listener = match tokio::net::TcpListener::bind(WS_ADDR).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = WS_ADDR, error = %e, "failed to bind websocket listener");
            return;
        }
    };
    info!(addr = WS_ADDR, "websocket gateway listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!(error = %e, "gateway server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    fanout.abort();
}
