//! HTTP client for the exchange RPC endpoint, used by the oracle feeder and
//! the WebSocket gateway.

use serde_json::{Value, json};
use tracing::debug;

/// Exchange RPC endpoint from `EXCHANGE_RPC_URL`, defaulting to the local
/// exchange process.
pub fn exchange_rpc_url() -> String {
    std::env::var("EXCHANGE_RPC_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8081/api/".to_string())
}

/// Thin JSON-RPC POST client.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Call one RPC method and return the raw response envelope.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, reqwest::Error> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let response = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .json::<Value>()
            .await?;
        debug!(method, "rpc call complete");
        Ok(response)
    }

    /// Push one index price into the exchange.
    pub async fn handle_pricefeed_update(
        &self,
        index_name: &str,
        price: f64,
    ) -> Result<Value, reqwest::Error> {
        self.call(
            "private/handle_pricefeed_updates",
            json!({ "index_name": index_name, "price": price }),
        )
        .await
    }

    /// Fetch the full account view for one address.
    pub async fn get_account_details(&self, address: &str) -> Result<Value, reqwest::Error> {
        self.call("private/get_account_details", json!({ "from": address }))
            .await
    }
}
