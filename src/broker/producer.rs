//! Ordered publish/subscribe producer.
//!
//! Events are enqueued on an unbounded channel and drained by a single
//! publisher task, so publication order equals enqueue order. This is what
//! makes the "trade event is published before the account state becomes
//! visible" contract hold: the matching path enqueues the trade before the
//! controller mutates any account.
//!
//! Publishing is fire-and-forget: failures are logged and swallowed, state
//! stays authoritative.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};

/// Subject for raw trade events.
pub const TRADES_TOPIC: &str = "trades";
/// Subject for ticker, index, chart and user channels.
pub const PUBLIC_SUBS_TOPIC: &str = "public_subs";
/// Subject for chart history requests.
pub const CHART_REQS_TOPIC: &str = "chartReqs";
/// Subject for chart history responses.
pub const RESPONSES_TOPIC: &str = "responses";

/// Handle for enqueueing broker events. Cheap to clone; safe to share across
/// threads and tasks.
#[derive(Clone)]
pub struct Producer {
    tx: mpsc::UnboundedSender<(String, bytes::Bytes)>,
}

impl Producer {
    /// Producer backed by a NATS client. Spawns the publisher task on the
    /// current runtime.
    pub fn with_client(client: async_nats::Client) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_publisher(client, rx));
        Self { tx }
    }

    /// Producer that drops every event. Used by tests and tools that do not
    /// talk to a broker.
    pub fn sink() -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self { tx }
    }

    /// Enqueue one message for publication on `topic`.
    pub fn produce<T: Serialize>(&self, topic: &str, message: &T) {
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(e) => {
                error!(topic, error = %e, "failed to serialize broker message");
                return;
            }
        };
        let payload: bytes::Bytes = payload.into();
        if self.tx.send((topic.to_string(), payload)).is_err() {
            trace!(topic, "broker queue closed, dropping message");
        }
    }

    /// Enqueue a batch in order.
    pub fn produce_multiple<T: Serialize>(&self, topic: &str, messages: &[T]) {
        for message in messages {
            self.produce(topic, message);
        }
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer").finish_non_exhaustive()
    }
}

/// Drain the queue into NATS, one message at a time to preserve order.
async fn run_publisher(
    client: async_nats::Client,
    mut rx: mpsc::UnboundedReceiver<(String, bytes::Bytes)>,
) {
    info!("broker publisher started");
    while let Some((subject, payload)) = rx.recv().await {
        if let Err(e) = client.publish(subject.clone(), payload).await {
            warn!(subject, error = %e, "broker publish failed");
        }
    }
    info!("broker publisher stopped");
}

/// Broker endpoint from `NATS_URL`, defaulting to a local server.
pub fn nats_url() -> String {
    std::env::var("NATS_URL").unwrap_or_else(|_| "nats://127.0.0.1:4222".to_string())
}

/// Connect to the broker, retrying once a second until it is reachable.
pub async fn connect_broker(url: &str) -> async_nats::Client {
    loop {
        match async_nats::connect(url).await {
            Ok(client) => {
                info!(url, "connected to broker");
                return client;
            }
            Err(e) => {
                warn!(url, error = %e, "broker unavailable, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}
