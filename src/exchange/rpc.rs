//! JSON-RPC envelope and method dispatch.
//!
//! Requests are `{jsonrpc, id, method, params}`; params are validated into
//! typed structs per method before the controller is touched. Every error
//! becomes a `{status: "failure", response: <message>}` envelope instead of
//! propagating.

use crate::error::{ExchangeError, ExchangeResult};
use crate::exchange::controller::{Exchange, OrderRequest, OrderType};
use crate::matching::{Side, TimeInForce};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::warn;

/// Incoming RPC envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Outgoing RPC envelope.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RpcResponse {
    pub status: &'static str,
    pub response: Value,
}

impl RpcResponse {
    pub fn success(response: Value) -> Self {
        Self {
            status: "success",
            response,
        }
    }

    pub fn failure(error: &ExchangeError) -> Self {
        Self {
            status: "failure",
            response: json!(error.to_string()),
        }
    }
}

fn parse<T: DeserializeOwned>(params: &Value) -> ExchangeResult<T> {
    serde_json::from_value(params.clone())
        .map_err(|e| ExchangeError::InvalidArgument(format!("bad params: {e}")))
}

#[derive(Debug, Deserialize)]
struct InstrumentParams {
    instrument_name: String,
}

fn default_depth() -> usize {
    10
}

#[derive(Debug, Deserialize)]
struct OrderBookParams {
    instrument_name: String,
    #[serde(default = "default_depth")]
    depth: usize,
}

#[derive(Debug, Deserialize)]
struct IndexParams {
    index_name: String,
}

#[derive(Debug, Deserialize)]
struct FromParams {
    from: String,
}

#[derive(Debug, Deserialize)]
struct TransferParams {
    from: String,
    currency: String,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct PricefeedParams {
    index_name: String,
    price: Decimal,
}

#[derive(Debug, Deserialize)]
struct CancelParams {
    from: String,
    instrument_name: String,
    order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OrderTypeParam {
    Limit,
    Market,
}

#[derive(Debug, Deserialize)]
struct TradeParams {
    from: String,
    instrument_name: String,
    #[serde(rename = "type")]
    order_type: OrderTypeParam,
    amount: Decimal,
    leverage: u32,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    time_in_force: Option<String>,
}

impl TradeParams {
    fn into_request(self, side: Side) -> ExchangeResult<OrderRequest> {
        let time_in_force = match self.time_in_force.as_deref() {
            None | Some("good_til_cancelled") | Some("GTC") => TimeInForce::Gtc,
            Some("immediate_or_cancel") | Some("IOC") => TimeInForce::Ioc,
            Some(other) => {
                return Err(ExchangeError::InvalidArgument(format!(
                    "unsupported time in force {other}"
                )));
            }
        };
        Ok(OrderRequest {
            from: self.from,
            instrument_name: self.instrument_name,
            side,
            order_type: match self.order_type {
                OrderTypeParam::Limit => OrderType::Limit,
                OrderTypeParam::Market => OrderType::Market,
            },
            amount: self.amount,
            leverage: self.leverage,
            price: self.price,
            time_in_force,
        })
    }
}

impl Exchange {
    /// Handle one RPC envelope. Never panics and never propagates errors.
    pub fn handle_msg(&self, request: &RpcRequest) -> RpcResponse {
        match self.dispatch(request) {
            Ok(value) => RpcResponse::success(value),
            Err(error) => {
                warn!(method = %request.method, kind = error.kind(), %error, "rpc failure");
                RpcResponse::failure(&error)
            }
        }
    }

    fn dispatch(&self, request: &RpcRequest) -> ExchangeResult<Value> {
        let params = &request.params;
        match request.method.as_str() {
            "health_check" => Ok(json!("health good")),

            // ---------------- public ----------------
            "public/get_order_book" => {
                let p: OrderBookParams = parse(params)?;
                self.orderbook_data(&p.instrument_name, p.depth)
            }
            "public/ticker" => {
                let p: InstrumentParams = parse(params)?;
                let ticker = self.ticker_data(&p.instrument_name)?;
                serde_json::to_value(ticker)
                    .map_err(|e| ExchangeError::Unavailable(e.to_string()))
            }
            "public/get_index_price" => {
                let p: IndexParams = parse(params)?;
                self.index_price(&p.index_name)
            }
            "public/get_index_price_names" => Ok(json!(self.index_price_names())),
            "public/get_currencies" => Ok(json!(self.currency_symbols())),
            "public/get_all_instrument_names" => Ok(json!(self.instrument_names())),
            "public/get_instruments" => Ok(json!(self.instrument_specs())),
            "public/get_trades_by_instrument" => {
                let p: InstrumentParams = parse(params)?;
                Ok(json!(self.trades_by_instrument(&p.instrument_name)?))
            }

            // ---------------- private ----------------
            "private/deposit" => {
                let p: TransferParams = parse(params)?;
                Ok(json!(self.deposit(&p.from, &p.currency, p.amount)?))
            }
            "private/withdraw" => {
                let p: TransferParams = parse(params)?;
                Ok(json!(self.withdraw(&p.from, &p.currency, p.amount)?))
            }
            "private/get_deposits" => {
                let p: FromParams = parse(params)?;
                Ok(json!(self.deposits(&p.from)))
            }
            "private/get_withdrawals" => {
                let p: FromParams = parse(params)?;
                Ok(json!(self.withdrawals(&p.from)))
            }
            "private/get_collateral" => {
                let p: FromParams = parse(params)?;
                Ok(self.collateral(&p.from))
            }
            "private/get_all_trades" => {
                let p: FromParams = parse(params)?;
                Ok(json!(self.all_trades(&p.from)))
            }
            "private/get_positions" => {
                let p: FromParams = parse(params)?;
                Ok(json!(self.refresh_account_positions(&p.from)))
            }
            "private/get_account_summary" => {
                let p: FromParams = parse(params)?;
                Ok(self.account_summary(&p.from))
            }
            "private/get_open_orders" => {
                let p: FromParams = parse(params)?;
                Ok(json!(self.open_orders(&p.from)))
            }
            "private/get_account_details" => {
                let p: FromParams = parse(params)?;
                Ok(self.account_details(&p.from))
            }
            "private/buy" => {
                let p: TradeParams = parse(params)?;
                Ok(json!(self.place_order(p.into_request(Side::Buy)?)?))
            }
            "private/sell" => {
                let p: TradeParams = parse(params)?;
                Ok(json!(self.place_order(p.into_request(Side::Sell)?)?))
            }
            "private/cancel" => {
                let p: CancelParams = parse(params)?;
                self.cancel_order(&p.from, &p.instrument_name, &p.order_id)?;
                Ok(json!({"order_id": p.order_id, "status": "cancelled"}))
            }
            "private/handle_pricefeed_updates" => {
                let p: PricefeedParams = parse(params)?;
                self.set_index_price(&p.index_name, p.price);
                Ok(params.clone())
            }

            other => Err(ExchangeError::InvalidArgument(format!(
                "unsupported method {other}"
            ))),
        }
    }
}
