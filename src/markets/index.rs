//! Index prices: the process-wide price bus and per-pair lookup handles.

use crate::markets::currency::Currency;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Process-wide mapping of index name to its latest oracle price.
///
/// Single writer (the oracle ingester via `handle_pricefeed_updates`), many
/// readers. Readers may observe slightly stale prices.
#[derive(Debug, Default)]
pub struct IndexBus {
    prices: DashMap<String, Decimal>,
}

impl IndexBus {
    /// Record the latest price for an index name, e.g. `"BTC/USDC"`.
    pub fn set(&self, name: impl Into<String>, price: Decimal) {
        self.prices.insert(name.into(), price);
    }

    pub fn get(&self, name: &str) -> Option<Decimal> {
        self.prices.get(name).map(|entry| *entry.value())
    }
}

/// A `{base}/{quote}` index backed by the shared price bus.
#[derive(Clone)]
pub struct Index {
    pub name: String,
    pub base_currency: Currency,
    pub quote_currency: Currency,
    bus: Arc<IndexBus>,
}

impl Index {
    pub fn new(base_currency: Currency, quote_currency: Currency, bus: Arc<IndexBus>) -> Self {
        Self {
            name: format!("{}/{}", base_currency.symbol, quote_currency.symbol),
            base_currency,
            quote_currency,
            bus,
        }
    }

    /// Latest index price.
    ///
    /// Returns the direct `{base}/{quote}` entry when present, otherwise
    /// derives it from `{base}/USD ÷ {quote}/USD`, otherwise zero.
    pub fn price(&self) -> Decimal {
        if let Some(direct) = self.bus.get(&self.name) {
            return direct;
        }
        let base = self.bus.get(&format!("{}/USD", self.base_currency.symbol));
        let quote = self.bus.get(&format!("{}/USD", self.quote_currency.symbol));
        match (base, quote) {
            (Some(base), Some(quote)) if !quote.is_zero() => base / quote,
            _ => Decimal::ZERO,
        }
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.name)
            .field("price", &self.price())
            .finish()
    }
}
