//! Controller-level scenarios: collateral, the margin gate, fill
//! application and the RPC envelope.

use derivex::broker::Producer;
use derivex::exchange::{Exchange, OrderRequest, OrderType, RpcRequest};
use derivex::markets::{IndexBus, default_listing};
use derivex::matching::{Side, TimeInForce};
use derivex::risk::{orders_margin, positions_margin};
use derivex::accounts::Direction;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;

const BTC_FUTURE: &str = "BTC-18DEC26";
const ETH_FUTURE: &str = "ETH-18DEC26";

fn test_exchange() -> (Arc<Exchange>, Arc<IndexBus>) {
    let bus = Arc::new(IndexBus::default());
    let listing = default_listing(&bus);
    let exchange = Exchange::new(listing, Arc::clone(&bus), Producer::sink());
    (exchange, bus)
}

fn limit_request(
    from: &str,
    instrument: &str,
    side: Side,
    amount: Decimal,
    price: Decimal,
    leverage: u32,
) -> OrderRequest {
    OrderRequest {
        from: from.to_string(),
        instrument_name: instrument.to_string(),
        side,
        order_type: OrderType::Limit,
        amount,
        leverage,
        price: Some(price),
        time_in_force: TimeInForce::Gtc,
    }
}

fn market_request(
    from: &str,
    instrument: &str,
    side: Side,
    amount: Decimal,
    leverage: u32,
) -> OrderRequest {
    OrderRequest {
        from: from.to_string(),
        instrument_name: instrument.to_string(),
        side,
        order_type: OrderType::Market,
        amount,
        leverage,
        price: None,
        time_in_force: TimeInForce::Gtc,
    }
}

#[test]
fn test_deposit_and_collateral_query() {
    let (exchange, _bus) = test_exchange();
    let transfer = exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();
    assert_eq!(transfer.balance, dec!(1000));
    assert_eq!(transfer.status, "confirmed");

    let transfer = exchange.deposit("0xA", "USDC", dec!(500)).unwrap();
    assert_eq!(transfer.balance, dec!(1500));

    let collateral = exchange.collateral("0xA");
    assert_eq!(collateral["USDC"], json!(1500.0));
}

#[test]
fn test_deposit_unsupported_currency() {
    let (exchange, _bus) = test_exchange();
    let err = exchange.deposit("0xA", "DOGE", dec!(1000)).unwrap_err();
    assert_eq!(err.kind(), "unsupported-collateral");
}

#[test]
fn test_withdraw_respects_available_margin() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();

    // Lock 500 of margin with a resting bid (50 @ 100, 10x).
    exchange
        .place_order(limit_request(
            "0xA",
            ETH_FUTURE,
            Side::Buy,
            dec!(50),
            dec!(100),
            10,
        ))
        .unwrap();

    let err = exchange.withdraw("0xA", "USDC", dec!(600)).unwrap_err();
    assert_eq!(err.kind(), "insufficient-margin");

    let transfer = exchange.withdraw("0xA", "USDC", dec!(400)).unwrap();
    assert_eq!(transfer.balance, dec!(600));
}

/// The margin gate rejects an under-collateralized order and leaves the
/// book untouched.
#[test]
fn test_margin_gate_blocks_order() {
    let (exchange, bus) = test_exchange();
    bus.set("BTC/USDC", dec!(20000));
    exchange.deposit("0xA", "USDC", dec!(100)).unwrap();

    let err = exchange
        .place_order(limit_request(
            "0xA",
            BTC_FUTURE,
            Side::Buy,
            dec!(1),
            dec!(20000),
            10,
        ))
        .unwrap_err();
    assert_eq!(err.kind(), "insufficient-margin");

    let book = exchange.orderbook_data(BTC_FUTURE, 10).unwrap();
    assert!(book["bids"].as_array().unwrap().is_empty());
    assert!(book["asks"].as_array().unwrap().is_empty());

    let open_orders = exchange.open_orders("0xA");
    assert!(open_orders[BTC_FUTURE].is_empty());
}

/// A cross between two funded accounts reshapes both positions and the
/// margin inequality holds for each.
#[test]
fn test_fill_updates_both_accounts() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();
    exchange.deposit("0xB", "USDC", dec!(1000)).unwrap();

    exchange
        .place_order(limit_request(
            "0xB",
            ETH_FUTURE,
            Side::Sell,
            dec!(6),
            dec!(100),
            10,
        ))
        .unwrap();
    let placement = exchange
        .place_order(limit_request(
            "0xA",
            ETH_FUTURE,
            Side::Buy,
            dec!(10),
            dec!(100),
            10,
        ))
        .unwrap();

    assert_eq!(placement.trades.len(), 1);
    assert_eq!(placement.trades[0].size, dec!(6));

    let a_positions = exchange.refresh_account_positions("0xA");
    let a_pos = &a_positions[ETH_FUTURE];
    assert_eq!(a_pos.size, dec!(6));
    assert_eq!(a_pos.average_price, dec!(100));
    assert_eq!(a_pos.direction, Direction::Buy);
    assert_eq!(a_pos.margin, dec!(60));

    let b_positions = exchange.refresh_account_positions("0xB");
    let b_pos = &b_positions[ETH_FUTURE];
    assert_eq!(b_pos.size, dec!(-6));
    assert_eq!(b_pos.direction, Direction::Sell);

    // A's residual 4 rests: margin 40 locked by the open order.
    let a_orders = exchange.open_orders("0xA");
    assert_eq!(a_orders[ETH_FUTURE].len(), 1);
    let resting = a_orders[ETH_FUTURE].values().next().unwrap();
    assert_eq!(resting.remaining, dec!(4));

    // Margin inequality per account: positions + open orders <= collateral.
    for addr in ["0xA", "0xB"] {
        let positions = exchange.refresh_account_positions(addr);
        let orders = exchange.open_orders(addr);
        let required = positions_margin(&positions) + orders_margin(&orders);
        assert!(required <= dec!(1000), "{addr} over-margined: {required}");
    }

    // Maker's open orders are empty, the sell filled completely.
    let b_orders = exchange.open_orders("0xB");
    assert!(b_orders[ETH_FUTURE].is_empty());
}

/// Market sell through an existing long flips the position (long 5 at 100
/// into short 3 at 110).
#[test]
fn test_position_flip_through_market_order() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(10000)).unwrap();
    exchange.deposit("0xB", "USDC", dec!(10000)).unwrap();
    exchange.deposit("0xC", "USDC", dec!(10000)).unwrap();

    // A gets long 5 at 100 against C.
    exchange
        .place_order(limit_request(
            "0xC",
            ETH_FUTURE,
            Side::Sell,
            dec!(5),
            dec!(100),
            10,
        ))
        .unwrap();
    exchange
        .place_order(market_request("0xA", ETH_FUTURE, Side::Buy, dec!(5), 10))
        .unwrap();

    // B bids 8 at 110; A sells 8 at market.
    exchange
        .place_order(limit_request(
            "0xB",
            ETH_FUTURE,
            Side::Buy,
            dec!(8),
            dec!(110),
            10,
        ))
        .unwrap();
    let placement = exchange
        .place_order(market_request("0xA", ETH_FUTURE, Side::Sell, dec!(8), 10))
        .unwrap();
    let filled: Decimal = placement.trades.iter().map(|t| t.size).sum();
    assert_eq!(filled, dec!(8));
    assert!(placement.trades.iter().all(|t| t.price == dec!(110)));

    let positions = exchange.refresh_account_positions("0xA");
    let position = &positions[ETH_FUTURE];
    assert_eq!(position.size, dec!(-3));
    assert_eq!(position.average_price, dec!(110));
    assert_eq!(position.direction, Direction::Sell);
    assert_eq!(position.leverage, 10);
    assert_eq!(position.margin, dec!(33));
    assert_eq!(position.estimated_liquidation_price, dec!(121));
}

#[test]
fn test_exact_close_removes_position() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(5000)).unwrap();
    exchange.deposit("0xB", "USDC", dec!(5000)).unwrap();

    exchange
        .place_order(limit_request(
            "0xB",
            ETH_FUTURE,
            Side::Sell,
            dec!(5),
            dec!(100),
            10,
        ))
        .unwrap();
    exchange
        .place_order(market_request("0xA", ETH_FUTURE, Side::Buy, dec!(5), 10))
        .unwrap();
    assert!(exchange.refresh_account_positions("0xA").contains_key(ETH_FUTURE));

    exchange
        .place_order(limit_request(
            "0xB",
            ETH_FUTURE,
            Side::Buy,
            dec!(5),
            dec!(100),
            10,
        ))
        .unwrap();
    exchange
        .place_order(market_request("0xA", ETH_FUTURE, Side::Sell, dec!(5), 10))
        .unwrap();
    assert!(!exchange.refresh_account_positions("0xA").contains_key(ETH_FUTURE));
}

#[test]
fn test_invalid_order_arguments() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();

    let err = exchange
        .place_order(limit_request("0xA", "DOGE-PERP", Side::Buy, dec!(1), dec!(1), 10))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");

    let err = exchange
        .place_order(limit_request("0xA", ETH_FUTURE, Side::Buy, dec!(0), dec!(100), 10))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");

    let err = exchange
        .place_order(limit_request("0xA", ETH_FUTURE, Side::Buy, dec!(1), dec!(100), 0))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");

    let err = exchange
        .place_order(limit_request("0xA", ETH_FUTURE, Side::Buy, dec!(1), dec!(-5), 10))
        .unwrap_err();
    assert_eq!(err.kind(), "invalid-argument");
}

#[test]
fn test_cancel_rpc_not_found_vs_success() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();

    let err = exchange
        .cancel_order("0xA", ETH_FUTURE, "missing")
        .unwrap_err();
    assert_eq!(err.kind(), "not-found");

    let placement = exchange
        .place_order(limit_request(
            "0xA",
            ETH_FUTURE,
            Side::Buy,
            dec!(2),
            dec!(90),
            10,
        ))
        .unwrap();
    let order_id = placement.order.order_id.clone();
    assert_eq!(exchange.open_orders("0xA")[ETH_FUTURE].len(), 1);

    exchange.cancel_order("0xA", ETH_FUTURE, &order_id).unwrap();
    assert!(exchange.open_orders("0xA")[ETH_FUTURE].is_empty());

    let book = exchange.orderbook_data(ETH_FUTURE, 10).unwrap();
    assert!(book["bids"].as_array().unwrap().is_empty());
}

#[test]
fn test_price_quantized_to_tick() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();

    let placement = exchange
        .place_order(limit_request(
            "0xA",
            ETH_FUTURE,
            Side::Buy,
            dec!(1),
            dec!(99.996),
            10,
        ))
        .unwrap();
    // Tick is 0.01: 99.996 rounds to 100.00.
    assert_eq!(placement.order.price, Some(dec!(100.00)));
}

#[test]
fn test_trades_by_instrument_caps_at_twenty() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(100000)).unwrap();
    exchange.deposit("0xB", "USDC", dec!(100000)).unwrap();

    for _ in 0..25 {
        exchange
            .place_order(limit_request(
                "0xB",
                ETH_FUTURE,
                Side::Sell,
                dec!(1),
                dec!(100),
                10,
            ))
            .unwrap();
        exchange
            .place_order(market_request("0xA", ETH_FUTURE, Side::Buy, dec!(1), 10))
            .unwrap();
    }

    let trades = exchange.trades_by_instrument(ETH_FUTURE).unwrap();
    assert_eq!(trades.len(), 20);
}

#[test]
fn test_account_summary_shape() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();

    let summary = exchange.account_summary("0xA");
    assert_eq!(summary["currency"], "USDC");
    assert_eq!(summary["equity"], json!(1000.0));
    assert_eq!(summary["margin"], json!(1000.0));
    assert_eq!(summary["total_pl"], json!(0.0));
}

#[test]
fn test_rpc_envelope_success_and_failure() {
    let (exchange, bus) = test_exchange();
    bus.set("BTC/USDC", dec!(20000));

    let health = exchange.handle_msg(&RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(json!(1)),
        method: "health_check".to_string(),
        params: json!({}),
    });
    assert_eq!(health.status, "success");
    assert_eq!(health.response, json!("health good"));

    let names = exchange.handle_msg(&RpcRequest {
        jsonrpc: None,
        id: None,
        method: "public/get_index_price_names".to_string(),
        params: json!({}),
    });
    assert_eq!(names.status, "success");
    assert!(names.response.as_array().unwrap().contains(&json!("BTC/USDC")));

    let unknown = exchange.handle_msg(&RpcRequest {
        jsonrpc: None,
        id: None,
        method: "public/frobnicate".to_string(),
        params: json!({}),
    });
    assert_eq!(unknown.status, "failure");

    let bad_params = exchange.handle_msg(&RpcRequest {
        jsonrpc: None,
        id: None,
        method: "private/deposit".to_string(),
        params: json!({"from": "0xA"}),
    });
    assert_eq!(bad_params.status, "failure");
}

#[test]
fn test_rpc_buy_flow() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));

    let deposit = exchange.handle_msg(&RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(json!(1)),
        method: "private/deposit".to_string(),
        params: json!({"from": "0xA", "currency": "USDC", "amount": 1000}),
    });
    assert_eq!(deposit.status, "success");

    let buy = exchange.handle_msg(&RpcRequest {
        jsonrpc: Some("2.0".to_string()),
        id: Some(json!(2)),
        method: "private/buy".to_string(),
        params: json!({
            "from": "0xA",
            "instrument_name": ETH_FUTURE,
            "type": "limit",
            "amount": 2,
            "leverage": 10,
            "price": 95,
        }),
    });
    assert_eq!(buy.status, "success");
    assert!(buy.response["order"]["order_id"].is_string());

    let open_orders = exchange.open_orders("0xA");
    assert_eq!(open_orders[ETH_FUTURE].len(), 1);
}

#[test]
fn test_rpc_pricefeed_update_path() {
    let (exchange, _bus) = test_exchange();
    let response = exchange.handle_msg(&RpcRequest {
        jsonrpc: None,
        id: None,
        method: "private/handle_pricefeed_updates".to_string(),
        params: json!({"index_name": "ETH/USDC", "price": 2000}),
    });
    assert_eq!(response.status, "success");

    let price = exchange.index_price("ETH/USDC").unwrap();
    assert_eq!(price["price"], json!(2000.0));
}

#[test]
fn test_seeder_bypasses_margin_but_updates_accounts() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));

    // No deposits at all: the seeder is exempt from the gate.
    exchange
        .seed_limit_order("0x01", ETH_FUTURE, Side::Buy, dec!(5), dec!(100))
        .unwrap();
    let order_id = exchange
        .seed_limit_order("0x02", ETH_FUTURE, Side::Sell, dec!(2), dec!(100))
        .unwrap();
    let _ = order_id;

    // The cross updated both positions through the normal accounting path.
    let maker = exchange.refresh_account_positions("0x01");
    assert_eq!(maker[ETH_FUTURE].size, dec!(2));
    let taker = exchange.refresh_account_positions("0x02");
    assert_eq!(taker[ETH_FUTURE].size, dec!(-2));
}

#[test]
fn test_ticker_data_fields() {
    let (exchange, bus) = test_exchange();
    bus.set("ETH/USDC", dec!(100));
    exchange.deposit("0xA", "USDC", dec!(1000)).unwrap();
    exchange
        .place_order(limit_request(
            "0xA",
            ETH_FUTURE,
            Side::Buy,
            dec!(2),
            dec!(99),
            10,
        ))
        .unwrap();

    let ticker = exchange.ticker_data(ETH_FUTURE).unwrap();
    assert_eq!(ticker.instrument_name, ETH_FUTURE);
    assert_eq!(ticker.best_bid_price, dec!(99));
    assert_eq!(ticker.best_bid_amount, dec!(2));
    assert_eq!(ticker.index_price, dec!(100));
    assert_eq!(ticker.state, "open");
    assert_eq!(ticker.bids.len(), 1);
    assert!(ticker.asks.is_empty());
}
