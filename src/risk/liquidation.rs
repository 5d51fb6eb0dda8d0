//! Liquidation price estimate.

use rust_decimal::Decimal;

/// Price at which a position's margin is exhausted.
///
/// With signed size this single expression covers both directions:
/// `avg - margin/size` is below entry for longs and above entry for shorts.
/// The price is reported only; liquidation execution is out of scope.
pub fn liquidation_price(average_price: Decimal, margin: Decimal, size: Decimal) -> Decimal {
    if size.is_zero() {
        return Decimal::ZERO;
    }
    average_price - margin / size
}
