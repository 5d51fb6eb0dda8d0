//! Linear standard margin.
//!
//! `margin(position) = |size| · average_price / leverage` (the stored value
//! is authoritative), `margin(open order) = remaining · price / leverage`.
//! The pre-trade gate compares the total requirement plus the hypothetical
//! delta of the new order against USDC collateral.

use crate::accounts::account::Account;
use crate::accounts::position::Position;
use crate::matching::{OrderKind, OrderSnapshot, Side};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Margin locked by one open order. Only resting limit orders lock margin.
pub fn order_margin(order: &OrderSnapshot) -> Decimal {
    match (order.kind, order.price) {
        (OrderKind::Limit, Some(price)) => {
            order.remaining * price / Decimal::from(order.leverage.max(1))
        }
        _ => Decimal::ZERO,
    }
}

/// Sum of stored position margins.
pub fn positions_margin(positions: &HashMap<String, Position>) -> Decimal {
    positions.values().map(|position| position.margin).sum()
}

/// Sum of margins over every open order on every instrument.
pub fn orders_margin(open_orders: &HashMap<String, HashMap<String, OrderSnapshot>>) -> Decimal {
    open_orders
        .values()
        .flat_map(|orders| orders.values())
        .map(order_margin)
        .sum()
}

/// Total margin an account has locked in positions and open orders.
pub fn total_margin_required(account: &Account) -> Decimal {
    positions_margin(&account.positions) + orders_margin(&account.open_orders)
}

/// Change in required margin if an order of `size` contracts at `price` and
/// `leverage` were matched against `existing` on the same instrument.
///
/// Adding exposure costs `size·price/leverage`; reducing costs nothing;
/// crossing through zero costs the margin of the leftover minus what the old
/// position frees up; an exact close costs nothing.
pub fn margin_delta(
    existing: Option<&Position>,
    side: Side,
    size: Decimal,
    price: Decimal,
    leverage: u32,
) -> Decimal {
    let lev = Decimal::from(leverage.max(1));
    let fresh_margin = size * price / lev;

    let position = match existing {
        None => return fresh_margin,
        Some(position) => position,
    };

    let adds_exposure = match side {
        Side::Buy => position.size > Decimal::ZERO,
        Side::Sell => position.size < Decimal::ZERO,
    };
    if adds_exposure {
        return fresh_margin;
    }

    let old_abs = position.size.abs();
    if size < old_abs {
        // Reduction, no new margin required.
        Decimal::ZERO
    } else if size > old_abs {
        // Cross-through: leftover position minus the margin freed up.
        let leftover = size - old_abs;
        (leftover * price / lev - position.margin).max(Decimal::ZERO)
    } else {
        // Exact close.
        Decimal::ZERO
    }
}
