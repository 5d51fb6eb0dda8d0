//! Currency descriptors.

use serde::Serialize;

/// A currency known to the exchange, tradable and/or usable as collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Currency {
    pub name: String,
    pub symbol: String,
    /// On-chain decimal places.
    pub decimals: u32,
    /// Whether balances in this currency count as collateral.
    pub is_collateral: bool,
}

impl Currency {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            is_collateral: false,
        }
    }

    /// A currency accepted as collateral.
    pub fn collateral(name: impl Into<String>, symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            is_collateral: true,
            ..Self::new(name, symbol, decimals)
        }
    }
}
