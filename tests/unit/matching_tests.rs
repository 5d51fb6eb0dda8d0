//! End-to-end matching scenarios and book laws.

use derivex::matching::{
    CancelOrder, LimitOrder, MarketOrder, Order, OrderBook, Side, TimeInForce,
};
use derivex::markets::{Currency, Index, IndexBus};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn test_book() -> OrderBook {
    let bus = Arc::new(IndexBus::default());
    let index = Index::new(
        Currency::new("Ethereum", "ETH", 18),
        Currency::collateral("Circle USD", "USDC", 6),
        bus,
    );
    OrderBook::dated_future("ETH-18DEC26", index, dec!(1))
}

fn limit(addr: &str, side: Side, size: Decimal, price: Decimal) -> Order {
    Order::Limit(LimitOrder::new(
        addr,
        None,
        side,
        size,
        10,
        price,
        TimeInForce::Gtc,
    ))
}

fn limit_with_id(addr: &str, id: &str, side: Side, size: Decimal, price: Decimal) -> Order {
    Order::Limit(LimitOrder::new(
        addr,
        Some(id.to_string()),
        side,
        size,
        10,
        price,
        TimeInForce::Gtc,
    ))
}

/// Two-order cross with a partial fill: the resting bid keeps its residual.
#[test]
fn test_two_order_cross_partial_fill() {
    let book = test_book();
    book.process_order(limit("0xA", Side::Buy, dec!(10), dec!(100)));
    let report = book.process_order(limit("0xB", Side::Sell, dec!(6), dec!(100)));

    assert_eq!(report.trades.len(), 1);
    let trade = &report.trades[0];
    assert_eq!(trade.price, dec!(100));
    assert_eq!(trade.size, dec!(6));
    assert_eq!(trade.taker, "0xB");
    assert_eq!(trade.maker, "0xA");
    assert_eq!(trade.side, Side::Sell);

    assert_eq!(book.best_bid_price(), dec!(100));
    assert_eq!(book.best_bid_size(), dec!(4));
    assert_eq!(book.aggregated_bids_size(), dec!(4));
    assert_eq!(book.aggregated_asks_size(), Decimal::ZERO);
    // Aggressor sold 6: open interest runs signed by aggressor side.
    assert_eq!(book.open_interest(), dec!(-6));

    assert!(report.involved_accounts.contains("0xA"));
    assert!(report.involved_accounts.contains("0xB"));
}

/// A market order sweeps two price levels and leaves no residual behind.
#[test]
fn test_market_order_sweeps_two_levels() {
    let book = test_book();
    book.process_order(limit("0xA", Side::Sell, dec!(5), dec!(101)));
    book.process_order(limit("0xC", Side::Sell, dec!(5), dec!(102)));

    let report = book.process_order(Order::Market(MarketOrder::new(
        "0xB",
        None,
        Side::Buy,
        dec!(8),
        10,
    )));

    assert_eq!(report.trades.len(), 2);
    assert_eq!(report.trades[0].price, dec!(101));
    assert_eq!(report.trades[0].size, dec!(5));
    assert_eq!(report.trades[0].maker, "0xA");
    assert_eq!(report.trades[1].price, dec!(102));
    assert_eq!(report.trades[1].size, dec!(3));
    assert_eq!(report.trades[1].maker, "0xC");

    // One resting ask left with remaining 2 at 102, nothing rested for B.
    assert_eq!(book.best_ask_price(), dec!(102));
    assert_eq!(book.best_ask_size(), dec!(2));
    assert_eq!(book.aggregated_asks_size(), dec!(2));
    assert_eq!(book.aggregated_bids_size(), Decimal::ZERO);
    assert_eq!(book.len(), 1);
    assert_eq!(book.open_interest(), dec!(8));
}

/// IOC residual is cancelled, never rested.
#[test]
fn test_ioc_residual_is_cancelled() {
    let book = test_book();
    book.process_order(limit("0xA", Side::Sell, dec!(3), dec!(100)));

    let ioc = LimitOrder::new(
        "0xB",
        Some("ioc-1".to_string()),
        Side::Buy,
        dec!(10),
        10,
        dec!(100),
        TimeInForce::Ioc,
    );
    let report = book.process_order(Order::Limit(ioc));

    assert_eq!(report.trades.len(), 1);
    assert_eq!(report.trades[0].price, dec!(100));
    assert_eq!(report.trades[0].size, dec!(3));

    let cancelled = report.cancelled.get("ioc-1").expect("residual cancelled");
    assert_eq!(cancelled.remaining, dec!(7));
    assert_eq!(book.aggregated_bids_size(), Decimal::ZERO);
    assert!(book.is_empty());
}

/// Cancelling a non-existent order changes nothing.
#[test]
fn test_idempotent_cancel_law() {
    let book = test_book();
    book.process_order(limit_with_id("0xA", "keep", Side::Buy, dec!(10), dec!(100)));
    let bids_before = book.aggregated_bids_size();
    let len_before = book.len();

    let report = book.process_order(Order::Cancel(CancelOrder::new("0xB", "phantom")));
    assert!(report.cancelled.is_empty());
    assert!(report.trades.is_empty());
    assert_eq!(book.aggregated_bids_size(), bids_before);
    assert_eq!(book.len(), len_before);
}

/// A crossing order against one's own resting order removes the liquidity
/// but emits no trade.
#[test]
fn test_self_trade_law() {
    let book = test_book();
    book.process_order(limit("0xA", Side::Sell, dec!(4), dec!(100)));
    let report = book.process_order(limit("0xA", Side::Buy, dec!(4), dec!(100)));

    assert!(report.trades.is_empty());
    assert!(book.is_empty());
    assert_eq!(book.open_interest(), Decimal::ZERO);
    assert_eq!(book.last_price(), Decimal::ZERO);
    assert_eq!(book.aggregated_asks_size(), Decimal::ZERO);
}

/// Resting sides never cross after any sequence of operations.
#[test]
fn test_no_crossing_at_rest() {
    let book = test_book();
    let orders = [
        ("0xA", Side::Buy, dec!(5), dec!(99)),
        ("0xB", Side::Sell, dec!(3), dec!(101)),
        ("0xC", Side::Buy, dec!(7), dec!(100)),
        ("0xD", Side::Sell, dec!(7), dec!(100)),
        ("0xE", Side::Buy, dec!(2), dec!(98)),
        ("0xF", Side::Sell, dec!(4), dec!(99)),
    ];
    for (addr, side, size, price) in orders {
        book.process_order(limit(addr, side, size, price));
        let bid = book.best_bid_price();
        let ask = book.best_ask_price();
        if !bid.is_zero() && !ask.is_zero() {
            assert!(bid < ask, "crossed book: bid {bid} >= ask {ask}");
        }
    }
}

/// Aggregates equal the sum of resting remainders after partial fills and
/// cancellations.
#[test]
fn test_aggregates_track_remainders() {
    let book = test_book();
    book.process_order(limit_with_id("0xA", "a", Side::Buy, dec!(10), dec!(100)));
    book.process_order(limit_with_id("0xB", "b", Side::Buy, dec!(5), dec!(99)));
    book.process_order(limit("0xC", Side::Sell, dec!(4), dec!(100)));

    // a has 6 left, b untouched.
    assert_eq!(book.aggregated_bids_size(), dec!(11));
    let rows = book.depth(Side::Buy, 10);
    let total: Decimal = rows.iter().map(|(_, remaining)| *remaining).sum();
    assert_eq!(total, book.aggregated_bids_size());

    book.process_order(Order::Cancel(CancelOrder::new("0xA", "a")));
    assert_eq!(book.aggregated_bids_size(), dec!(5));
}

/// Trades always execute at the maker's price.
#[test]
fn test_trade_price_is_maker_price() {
    let book = test_book();
    book.process_order(limit("0xA", Side::Sell, dec!(5), dec!(101)));
    // Aggressive buy at a better price than the resting ask.
    let report = book.process_order(limit("0xB", Side::Buy, dec!(5), dec!(105)));
    assert_eq!(report.trades[0].price, dec!(101));
}

/// Partially filled maker leftover keeps its original queue position.
#[test]
fn test_partial_maker_stays_at_front() {
    let book = test_book();
    book.process_order(limit_with_id("0xA", "front", Side::Sell, dec!(10), dec!(100)));
    book.process_order(limit_with_id("0xB", "back", Side::Sell, dec!(10), dec!(100)));

    book.process_order(limit("0xC", Side::Buy, dec!(4), dec!(100)));
    let report = book.process_order(limit("0xD", Side::Buy, dec!(6), dec!(100)));
    // The front order's remaining 6 fills before "back" sees any flow.
    assert_eq!(report.trades[0].book_order_id, "front");
    assert_eq!(report.trades[0].size, dec!(6));
}

/// Market order with an empty opposite side rests nothing and reports no
/// involvement.
#[test]
fn test_market_residual_dropped_on_empty_book() {
    let book = test_book();
    let report = book.process_order(Order::Market(MarketOrder::new(
        "0xB",
        None,
        Side::Buy,
        dec!(8),
        10,
    )));
    assert!(report.trades.is_empty());
    assert!(book.is_empty());
    assert!(report.updated.is_empty());
    assert!(report.cancelled.is_empty());
}
