//! Per-address account state and the lazily populated store.

use crate::accounts::position::Position;
use crate::matching::{OrderSnapshot, Side};
use dashmap::DashMap;
use dashmap::mapref::one::{Ref, RefMut};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Confirmed deposit or withdrawal record.
#[derive(Debug, Clone, Serialize)]
pub struct Transfer {
    pub amount: Decimal,
    /// Collateral balance after the transfer.
    pub balance: Decimal,
    pub currency: String,
    pub status: &'static str,
}

/// A fill from one account's point of view.
#[derive(Debug, Clone, Serialize)]
pub struct UserTrade {
    pub price: Decimal,
    pub side: Side,
    pub size: Decimal,
    pub leverage: u32,
    /// `"maker"` or `"taker"`.
    pub liquidity: &'static str,
    pub timestamp: u64,
    pub instrument_name: String,
    pub order_type: String,
}

/// Account state for a single address.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    /// Collateral balances per currency symbol.
    pub collateral: HashMap<String, Decimal>,
    /// Collateral minus total required margin, refreshed on access.
    pub available_margin: HashMap<String, Decimal>,
    /// Positions keyed by instrument name; absent means flat.
    pub positions: HashMap<String, Position>,
    /// Open orders: instrument name -> order id -> snapshot.
    pub open_orders: HashMap<String, HashMap<String, OrderSnapshot>>,
    pub trades: Vec<UserTrade>,
    pub deposits: HashMap<String, Vec<Transfer>>,
    pub withdrawals: HashMap<String, Vec<Transfer>>,
    pub max_open_orders: u32,
}

impl Account {
    fn new(collateral_symbols: &[String], instrument_names: &[String]) -> Self {
        let zero_balances: HashMap<String, Decimal> = collateral_symbols
            .iter()
            .map(|symbol| (symbol.clone(), Decimal::ZERO))
            .collect();
        let empty_transfers: HashMap<String, Vec<Transfer>> = collateral_symbols
            .iter()
            .map(|symbol| (symbol.clone(), Vec::new()))
            .collect();
        Self {
            collateral: zero_balances.clone(),
            available_margin: zero_balances,
            positions: HashMap::new(),
            open_orders: instrument_names
                .iter()
                .map(|name| (name.clone(), HashMap::new()))
                .collect(),
            trades: Vec::new(),
            deposits: empty_transfers.clone(),
            withdrawals: empty_transfers,
            max_open_orders: 10_000,
        }
    }

    pub fn collateral_balance(&self, symbol: &str) -> Decimal {
        self.collateral.get(symbol).copied().unwrap_or_default()
    }
}

/// Concurrent account store keyed by address.
///
/// Accounts are created lazily on first observation of an address; the
/// entry API makes the lazy path race-free. Mutation happens on the
/// controller path only, broadcast tasks read.
pub struct AccountStore {
    accounts: DashMap<String, Account>,
    collateral_symbols: Vec<String>,
    instrument_names: Vec<String>,
}

impl AccountStore {
    pub fn new(collateral_symbols: Vec<String>, instrument_names: Vec<String>) -> Self {
        Self {
            accounts: DashMap::new(),
            collateral_symbols,
            instrument_names,
        }
    }

    /// Create the account for `address` if it does not exist yet.
    pub fn ensure(&self, address: &str) {
        self.accounts.entry(address.to_string()).or_insert_with(|| {
            debug!(address, "creating account");
            Account::new(&self.collateral_symbols, &self.instrument_names)
        });
    }

    pub fn contains(&self, address: &str) -> bool {
        self.accounts.contains_key(address)
    }

    /// Shared read handle; `None` for unknown addresses.
    pub fn read(&self, address: &str) -> Option<Ref<'_, String, Account>> {
        self.accounts.get(address)
    }

    /// Exclusive handle, creating the account when missing.
    pub fn write(&self, address: &str) -> RefMut<'_, String, Account> {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(&self.collateral_symbols, &self.instrument_names))
    }

    pub fn addresses(&self) -> Vec<String> {
        self.accounts.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
