//! # Derivex — a derivatives exchange core
//!
//! A multi-instrument matching engine with price-time priority limit order
//! books, a mark-price / funding-rate computation pipeline for perpetual and
//! dated futures contracts, and a margin/position accounting layer that
//! maintains per-account collateral, open orders, positions and liquidation
//! thresholds.
//!
//! ## Subsystems
//!
//! - **Matching** ([`matching`]): per-instrument books with strict
//!   price-time-size priority, partial fills, IOC/GTC, cancellations, and
//!   incrementally maintained size aggregates and 24 h statistics.
//! - **Marking** ([`pricing`]): one-second EMA loops fold the fair impact
//!   price (perpetuals) or the clamped last trade (dated futures) against
//!   the oracle index; perpetuals additionally run an eight-hour
//!   funding-rate cycle sampled every five seconds.
//! - **Accounts & risk** ([`accounts`], [`risk`]): linear standard margin
//!   over positions and open orders, a pre-trade margin gate consistent with
//!   the post-trade position reshape, and estimated liquidation prices.
//! - **Controller** ([`exchange`]): JSON-RPC surface, collateral transfers,
//!   order placement and cancellation, ticker publication and the
//!   market-maker seeder.
//! - **Charts** ([`charts`]): five-second OHLC bars from the trade stream
//!   with on-demand resampling for history queries.
//!
//! ## Processes
//!
//! Four long-lived binaries wire these together over a NATS broker
//! (endpoint from `NATS_URL`): `exchange` (RPC core, port 8081), `charts`
//! (OHLC aggregator), `feeder` (oracle ingester) and `gateway` (WebSocket
//! fan-out, port 8082).
//!
//! ## Concurrency model
//!
//! Each book's mutable core sits behind a single lock written only by the
//! matching path; marking loops read the book and write their own EMA and
//! funding cells. The index bus is single-writer many-reader. Broker
//! publication goes through one ordered queue, so trade events are always
//! published before the account state they produced becomes visible.

pub mod accounts;
pub mod broker;
pub mod charts;
pub mod error;
pub mod exchange;
pub mod gateway;
pub mod markets;
pub mod matching;
pub mod prelude;
pub mod pricing;
pub mod risk;
pub mod rpc_client;
mod utils;

pub use error::{ExchangeError, ExchangeResult};
pub use exchange::{Exchange, RpcRequest, RpcResponse};
pub use matching::{Order, OrderBook, ProcessReport, Side, TimeInForce, Trade};
pub use utils::{current_time_micros, current_time_millis};
