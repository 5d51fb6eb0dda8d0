//! Exchange controller, RPC surface, background tasks and the market-maker
//! seeder.

pub mod controller;
pub mod rpc;
pub mod seeder;
pub mod tasks;
pub mod ticker;

pub use controller::{Exchange, OrderPlacement, OrderRequest, OrderType};
pub use rpc::{RpcRequest, RpcResponse};
pub use seeder::run_market_maker;
pub use tasks::spawn_background_tasks;
pub use ticker::{ChannelEvent, TickerData, build_ticker};
