//! Marking behavior driven through real books.

use derivex::markets::{Currency, Index, IndexBus, Instrument};
use derivex::matching::{LimitOrder, Order, OrderBook, Side, TimeInForce};
use derivex::pricing::{ema_step, fair_impact_price};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn eth_index(bus: &Arc<IndexBus>) -> Index {
    Index::new(
        Currency::new("Ethereum", "ETH", 18),
        Currency::collateral("Circle USD", "USDC", 6),
        Arc::clone(bus),
    )
}

fn rest(book: &OrderBook, addr: &str, side: Side, size: Decimal, price: Decimal) {
    book.process_order(Order::Limit(LimitOrder::new(
        addr,
        None,
        side,
        size,
        10,
        price,
        TimeInForce::Gtc,
    )));
}

#[test]
fn test_perp_ema_uses_fair_impact_mid() {
    let bus = Arc::new(IndexBus::default());
    bus.set("ETH/USDC", dec!(100));
    let perp = Instrument::perp(eth_index(&bus), dec!(1), dec!(0.01), 50);
    let book = &perp.book;

    // Deep two-sided book around the index.
    for level in 0..4 {
        rest(book, "0x01", Side::Buy, dec!(30), dec!(99) - Decimal::from(level));
        rest(book, "0x02", Side::Sell, dec!(30), dec!(101) + Decimal::from(level));
    }

    assert_eq!(book.ema(), 0.0);
    book.update_perp_ema_once();
    let after_one = book.ema();
    assert!(after_one != 0.0, "ema should move off zero");

    // The fold matches the pure function applied to the same inputs.
    let imn = 10_000.0; // 200 * 50
    let fair_bid = fair_impact_price(&book.impact_levels(Side::Buy), imn, 1.0);
    let fair_ask = fair_impact_price(&book.impact_levels(Side::Sell), imn, 1.0);
    let expected = ema_step(0.0, (fair_bid + fair_ask) / 2.0, 100.0);
    assert!((after_one - expected).abs() < 1e-9);
}

#[test]
fn test_futures_ema_clamps_sample_to_touch() {
    let bus = Arc::new(IndexBus::default());
    bus.set("ETH/USDC", dec!(100));
    let future = Instrument::dated_future(eth_index(&bus), dec!(1), dec!(0.01), 4_102_444_800, 50);
    let book = &future.book;

    // Cross at 100 to set the last trade, then move the book above it.
    rest(book, "0x01", Side::Sell, dec!(1), dec!(100));
    rest(book, "0x02", Side::Buy, dec!(1), dec!(100));
    assert_eq!(book.last_price(), dec!(100));

    rest(book, "0x01", Side::Buy, dec!(1), dec!(104));
    rest(book, "0x02", Side::Sell, dec!(1), dec!(106));

    // Last trade (100) sits below the bid: the sample is pulled up to 104.
    book.update_futures_ema_once();
    let expected = ema_step(0.0, 104.0, 100.0);
    assert!((book.ema() - expected).abs() < 1e-9);
}

#[test]
fn test_perp_mark_price_clamps_to_half_percent() {
    let bus = Arc::new(IndexBus::default());
    bus.set("ETH/USDC", dec!(100));
    let perp = Instrument::perp(eth_index(&bus), dec!(1), dec!(0.01), 50);

    perp.book.set_ema(0.2);
    assert!((perp.mark_price() - 100.2).abs() < 1e-9);

    // 0.5% of 100 is 0.5: a bigger deviation pins the mark.
    perp.book.set_ema(3.0);
    assert!((perp.mark_price() - 100.5).abs() < 1e-9);
    perp.book.set_ema(-3.0);
    assert!((perp.mark_price() - 99.5).abs() < 1e-9);
}

#[test]
fn test_dated_mark_price_pins_to_index() {
    let bus = Arc::new(IndexBus::default());
    bus.set("ETH/USDC", dec!(100));
    let future = Instrument::dated_future(eth_index(&bus), dec!(1), dec!(0.01), 4_102_444_800, 50);

    // The dated clamp ratio is tiny: any visible deviation pins the mark
    // essentially to the index.
    future.book.set_ema(1.0);
    let mark = future.mark_price();
    assert!((mark - 100.0).abs() < 0.001, "mark {mark} should hug the index");
}

#[test]
fn test_mark_price_zero_without_index() {
    let bus = Arc::new(IndexBus::default());
    let perp = Instrument::perp(eth_index(&bus), dec!(1), dec!(0.01), 50);
    perp.book.set_ema(5.0);
    assert_eq!(perp.mark_price(), 0.0);
}

#[test]
fn test_funding_rate_cell_roundtrip() {
    let bus = Arc::new(IndexBus::default());
    let perp = Instrument::perp(eth_index(&bus), dec!(1), dec!(0.01), 50);
    assert_eq!(perp.book.funding_rate(), 0.0);
    perp.book.set_funding_rate(0.0001);
    assert_eq!(perp.book.funding_rate(), 0.0001);
}
