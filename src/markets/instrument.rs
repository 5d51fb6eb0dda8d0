//! Instrument descriptors: static contract terms plus the handle to the
//! instrument's order book.
//!
//! Names are derived from the contract terms rather than asserted:
//! `{base}USD-PERP` for perpetuals and `{base}-{DDMMMYY}` (uppercase month
//! abbreviation of the expiry) for dated futures.

use crate::markets::currency::Currency;
use crate::markets::index::Index;
use crate::matching::OrderBook;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Contract family codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InstrumentCode {
    Spot,
    UsdMPerp,
    UsdMFuture,
    UsdMOption,
}

/// Commission schedule of an instrument, as fractions of notional.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Fees {
    pub maker_commission: Decimal,
    pub taker_commission: Decimal,
    pub block_trade_commission: Decimal,
    pub max_liquidation_commission: Decimal,
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            maker_commission: Decimal::new(3, 4),            // 0.0003
            taker_commission: Decimal::new(3, 4),            // 0.0003
            block_trade_commission: Decimal::new(1, 4),      // 0.0001
            max_liquidation_commission: Decimal::new(75, 4), // 0.0075
        }
    }
}

/// Uppercase `DDMMMYY` code for an expiry timestamp in seconds, e.g.
/// `18DEC26`.
pub fn expiry_code(expiration_secs: i64) -> String {
    let date = DateTime::<Utc>::from_timestamp(expiration_secs, 0).unwrap_or_default();
    date.format("%d%b%y").to_string().to_uppercase()
}

/// A tradable contract and its order book.
#[derive(Clone)]
pub struct Instrument {
    pub name: String,
    pub code: InstrumentCode,
    pub index: Index,
    /// Base units per contract.
    pub contract_size: Decimal,
    pub base_currency: Currency,
    pub quote_currency: Currency,
    /// Minimum price increment; order prices are quantized to it upstream.
    pub tick_size: Decimal,
    pub max_leverage: u32,
    pub fees: Fees,
    /// Expiry in seconds since epoch; `None` for perpetuals.
    pub expiration: Option<i64>,
    pub is_active: bool,
    pub is_expired: bool,
    pub settlement_period: String,
    pub book: Arc<OrderBook>,
}

impl Instrument {
    /// A perpetual contract named `{base}USD-PERP`. The impact price
    /// notional used by the fair-price walk is 200 × max leverage.
    pub fn perp(
        index: Index,
        contract_size: Decimal,
        tick_size: Decimal,
        max_leverage: u32,
    ) -> Self {
        let name = format!("{}USD-PERP", index.base_currency.symbol);
        let impact_price_notional = Decimal::from(200u32 * max_leverage);
        let book = Arc::new(OrderBook::perp(
            name.clone(),
            index.clone(),
            impact_price_notional,
            contract_size,
        ));
        Self {
            name,
            code: InstrumentCode::UsdMPerp,
            base_currency: index.base_currency.clone(),
            quote_currency: index.quote_currency.clone(),
            index,
            contract_size,
            tick_size,
            max_leverage,
            fees: Fees::default(),
            expiration: None,
            is_active: true,
            is_expired: false,
            settlement_period: "perpetual".to_string(),
            book,
        }
    }

    /// A dated futures contract named `{base}-{DDMMMYY}` from its expiry.
    pub fn dated_future(
        index: Index,
        contract_size: Decimal,
        tick_size: Decimal,
        expiration_secs: i64,
        max_leverage: u32,
    ) -> Self {
        let name = format!(
            "{}-{}",
            index.base_currency.symbol,
            expiry_code(expiration_secs)
        );
        let is_expired = expiration_secs < Utc::now().timestamp();
        let book = Arc::new(OrderBook::dated_future(
            name.clone(),
            index.clone(),
            contract_size,
        ));
        Self {
            name,
            code: InstrumentCode::UsdMFuture,
            base_currency: index.base_currency.clone(),
            quote_currency: index.quote_currency.clone(),
            index,
            contract_size,
            tick_size,
            max_leverage,
            fees: Fees::default(),
            expiration: Some(expiration_secs),
            is_active: !is_expired,
            is_expired,
            settlement_period: "daily".to_string(),
            book,
        }
    }

    pub fn index_price(&self) -> Decimal {
        self.index.price()
    }

    pub fn mark_price(&self) -> f64 {
        self.book.mark_price()
    }

    /// An instrument is ready for publication once its index has a positive
    /// price. This is the single readiness predicate used by the ticker and
    /// index broadcasts.
    pub fn is_ready(&self) -> bool {
        self.index_price() > Decimal::ZERO
    }

    /// Round a price to the nearest tick multiple.
    pub fn quantize_price(&self, price: Decimal) -> Decimal {
        if self.tick_size.is_zero() {
            return price;
        }
        (price / self.tick_size).round() * self.tick_size
    }

    /// Static contract terms plus live top-of-book, for `get_instruments`.
    pub fn specs(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "index": self.index.name,
            "is_active": self.is_active,
            "is_expired": self.is_expired,
            "max_leverage": self.max_leverage,
            "contract_size": self.contract_size,
            "base_currency": self.base_currency.symbol,
            "quote_currency": self.quote_currency.symbol,
            "tick_size": self.tick_size,
            "kind": self.book.kind(),
            "settlement_period": self.settlement_period,
            "expiration": self.expiration,
            "maker_commission": self.fees.maker_commission,
            "taker_commission": self.fees.taker_commission,
            "block_trade_commission": self.fees.block_trade_commission,
            "max_liquidation_commission": self.fees.max_liquidation_commission,
            "funding_rate": self.book.funding_rate(),
            "bid": [self.book.best_bid_size(), self.book.best_bid_price()],
            "ask": [self.book.best_ask_size(), self.book.best_ask_price()],
            "mark_price": self.mark_price(),
        })
    }
}

impl std::fmt::Debug for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name)
            .field("code", &self.code)
            .field("is_active", &self.is_active)
            .finish()
    }
}
