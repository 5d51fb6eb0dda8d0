//! WebSocket fan-out of broker events to browser clients.
//!
//! Clients connect to `/ticker/{cid}`, `/index/{cid}`, `/orderbook/{cid}`,
//! `/chart/{cid}` or `/account/{cid}`. The server never reads from the
//! sockets except to detect disconnect; it pushes the matching
//! `public_subs` channels, and the account endpoint additionally receives a
//! two-second poll of `get_account_details` keyed by the connection id.
//! A slow or closed subscriber is dropped without stalling the loop.

use crate::broker::PUBLIC_SUBS_TOPIC;
use crate::rpc_client::RpcClient;
use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type Connections = DashMap<String, mpsc::UnboundedSender<String>>;

/// Shared gateway state: one connection table per endpoint family.
pub struct Gateway {
    ticker: Connections,
    index: Connections,
    orderbook: Connections,
    chart: Connections,
    account: Connections,
    rpc: RpcClient,
}

impl Gateway {
    pub fn new(rpc: RpcClient) -> Self {
        Self {
            ticker: DashMap::new(),
            index: DashMap::new(),
            orderbook: DashMap::new(),
            chart: DashMap::new(),
            account: DashMap::new(),
            rpc,
        }
    }
}

/// Routes for all five WebSocket endpoint families.
pub fn router(gateway: Arc<Gateway>) -> Router {
    Router::new()
        .route("/ticker/{cid}", get(ticker_endpoint))
        .route("/index/{cid}", get(index_endpoint))
        .route("/orderbook/{cid}", get(orderbook_endpoint))
        .route("/chart/{cid}", get(chart_endpoint))
        .route("/account/{cid}", get(account_endpoint))
        .with_state(gateway)
}

async fn ticker_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Path(cid): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(gateway, SocketKind::Ticker, cid, socket))
}

async fn index_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Path(cid): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(gateway, SocketKind::Index, cid, socket))
}

async fn orderbook_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Path(cid): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(gateway, SocketKind::Orderbook, cid, socket))
}

async fn chart_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Path(cid): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(gateway, SocketKind::Chart, cid, socket))
}

async fn account_endpoint(
    State(gateway): State<Arc<Gateway>>,
    Path(cid): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| serve_socket(gateway, SocketKind::Account, cid, socket))
}

#[derive(Clone, Copy)]
enum SocketKind {
    Ticker,
    Index,
    Orderbook,
    Chart,
    Account,
}

impl SocketKind {
    fn table<'a>(&self, gateway: &'a Gateway) -> &'a Connections {
        match self {
            SocketKind::Ticker => &gateway.ticker,
            SocketKind::Index => &gateway.index,
            SocketKind::Orderbook => &gateway.orderbook,
            SocketKind::Chart => &gateway.chart,
            SocketKind::Account => &gateway.account,
        }
    }
}

/// Pump queued payloads to the socket; the receive side is only watched for
/// disconnect.
async fn serve_socket(gateway: Arc<Gateway>, kind: SocketKind, cid: String, mut socket: WebSocket) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    kind.table(&gateway).insert(cid.clone(), tx);
    debug!(cid, "websocket client connected");

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
            outgoing = rx.recv() => {
                match outgoing {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    kind.table(&gateway).remove(&cid);
    debug!(cid, "websocket client disconnected");
}

#[derive(Debug, Deserialize)]
struct ChannelHeader {
    channel: String,
}

/// Route `public_subs` events to the endpoint families by channel prefix.
pub async fn run_fanout(
    gateway: Arc<Gateway>,
    client: async_nats::Client,
) -> Result<(), async_nats::Error> {
    let mut subscription = client.subscribe(PUBLIC_SUBS_TOPIC).await?;
    info!("gateway fan-out started");

    while let Some(message) = subscription.next().await {
        let header: ChannelHeader = match serde_json::from_slice(&message.payload) {
            Ok(header) => header,
            Err(_) => continue,
        };
        let payload = match String::from_utf8(message.payload.to_vec()) {
            Ok(payload) => payload,
            Err(_) => continue,
        };

        if header.channel.starts_with("price_index.") {
            broadcast(&gateway.index, &payload);
        }
        if header.channel.starts_with("ticker.") {
            broadcast(&gateway.ticker, &payload);
            broadcast(&gateway.orderbook, &payload);
        }
        if header.channel.starts_with("chart.trade.") {
            broadcast(&gateway.chart, &payload);
        }
    }
    Ok(())
}

/// Push one payload to every subscriber, dropping the ones that went away.
fn broadcast(connections: &Connections, payload: &str) {
    let mut stale = Vec::new();
    for entry in connections.iter() {
        if entry.value().send(payload.to_string()).is_err() {
            stale.push(entry.key().clone());
        }
    }
    for cid in stale {
        connections.remove(&cid);
    }
}

/// Two-second account broadcast: each connected account client is keyed by
/// its address and receives a fresh `get_account_details` view.
pub async fn run_account_broadcast(gateway: Arc<Gateway>) {
    let mut interval = tokio::time::interval(Duration::from_secs(2));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let addresses: Vec<String> = gateway
            .account
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for address in addresses {
            match gateway.rpc.get_account_details(&address).await {
                Ok(details) => {
                    if let Some(sender) = gateway.account.get(&address) {
                        let _ = sender.send(details.to_string());
                    }
                }
                Err(e) => warn!(address, error = %e, "account poll failed"),
            }
        }
    }
}
