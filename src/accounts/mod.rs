//! Account state: collateral, open orders, transfers and positions.

pub mod account;
pub mod position;

pub use account::{Account, AccountStore, Transfer, UserTrade};
pub use position::{Direction, Position};
