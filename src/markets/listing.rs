//! The static default listing served by the exchange binary.

use crate::markets::currency::Currency;
use crate::markets::index::{Index, IndexBus};
use crate::markets::instrument::Instrument;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Everything the exchange controller needs to come up: tradable assets,
/// collateral currencies, indices and instruments.
pub struct Listing {
    pub tradable_assets: Vec<Currency>,
    pub currencies: Vec<Currency>,
    pub indices: Vec<Index>,
    pub instruments: Vec<Instrument>,
}

/// BTC, ETH and APT dated futures plus BTC/ETH perpetuals, all quoted and
/// collateralized in USDC.
pub fn default_listing(bus: &Arc<IndexBus>) -> Listing {
    let usdc = Currency::collateral("Circle USD", "USDC", 6);
    let btc = Currency::new("Bitcoin", "BTC", 8);
    let eth = Currency::new("Ethereum", "ETH", 18);
    let apt = Currency::new("Aptos", "APT", 8);

    let btc_usdc = Index::new(btc.clone(), usdc.clone(), Arc::clone(bus));
    let eth_usdc = Index::new(eth.clone(), usdc.clone(), Arc::clone(bus));
    let apt_usdc = Index::new(apt.clone(), usdc.clone(), Arc::clone(bus));

    let expiry = Utc
        .with_ymd_and_hms(2026, 12, 18, 8, 0, 0)
        .single()
        .map(|dt| dt.timestamp())
        .unwrap_or(0);

    let tick = Decimal::new(1, 2); // 0.01
    let one = Decimal::ONE;

    let instruments = vec![
        Instrument::dated_future(btc_usdc.clone(), one, tick, expiry, 50),
        Instrument::dated_future(eth_usdc.clone(), one, tick, expiry, 50),
        Instrument::dated_future(apt_usdc.clone(), one, tick, expiry, 50),
        Instrument::perp(btc_usdc.clone(), one, tick, 50),
        Instrument::perp(eth_usdc.clone(), one, tick, 50),
    ];

    Listing {
        tradable_assets: vec![btc, eth, apt],
        currencies: vec![usdc],
        indices: vec![btc_usdc, eth_usdc, apt_usdc],
        instruments,
    }
}
