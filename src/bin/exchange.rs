//! Exchange RPC process: matching, marking, accounts and the ticker
//! publisher, served over HTTP JSON-RPC on port 8081.

use axum::Json;
use axum::extract::State;
use axum::routing::{get, post};
use derivex::broker::{Producer, connect_broker, nats_url};
use derivex::exchange::{Exchange, RpcRequest, RpcResponse, run_market_maker};
use derivex::markets::{IndexBus, default_listing};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const RPC_ADDR: &str = "0.0.0.0:8081";

async fn root() -> Json<serde_json::Value> {
    Json(json!({"status": "success", "response": "Api working"}))
}

async fn api(State(exchange): State<Arc<Exchange>>, Json(request): Json<RpcRequest>) -> Json<RpcResponse> {
    Json(exchange.handle_msg(&request))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let client = connect_broker(&nats_url()).await;
    let producer = Producer::with_client(client);

    let index_bus = Arc::new(IndexBus::default());
    let listing = default_listing(&index_bus);
    let exchange = Exchange::new(listing, index_bus, producer);

    let tasks = derivex::exchange::spawn_background_tasks(&exchange);
    tokio::spawn(run_market_maker(Arc::clone(&exchange)));

    let app = axum::Router::new()
        .route("/", get(root))
        .route("/api/", post(api))
        .with_state(exchange);

    let listener = match tokio::net::TcpListener::bind(RPC_ADDR).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = RPC_ADDR, error = %e, "failed to bind rpc listener");
            return;
        }
    };
    info!(addr = RPC_ADDR, "exchange rpc listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "rpc server stopped");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    for task in tasks {
        task.abort();
    }
}
