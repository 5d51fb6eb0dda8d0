//! Prelude module that re-exports the types most callers need.
//!
//! ```rust
//! use derivex::prelude::*;
//! ```

// Matching engine
pub use crate::matching::{
    BookStats, CancelOrder, LimitOrder, MarketOrder, Order, OrderBook, OrderSnapshot,
    ProcessReport, Side, TimeInForce, Trade, TradeEnvelope, TradeListener,
};

// Markets
pub use crate::markets::{Currency, Index, IndexBus, Instrument, InstrumentCode, Listing};

// Accounts and risk
pub use crate::accounts::{Account, AccountStore, Direction, Position};
pub use crate::risk::{liquidation_price, margin_delta, total_margin_required};

// Controller and RPC surface
pub use crate::exchange::{Exchange, OrderRequest, OrderType, RpcRequest, RpcResponse, TickerData};

// Charts
pub use crate::charts::{Bar, ChartService, OhlcAggregator};

// Broker
pub use crate::broker::Producer;

// Errors
pub use crate::error::{ExchangeError, ExchangeResult};

// Utilities
pub use crate::{current_time_micros, current_time_millis};
