//! Position reshaping on fills.
//!
//! Each fill either opens a position, adds to it, reduces it, flips it
//! through zero, or closes it exactly. The margin model is linear standard
//! margin; reducing fills do not realize P&L into collateral, they only
//! refresh the unrealized figure (the running system's behavior, kept
//! deliberately).

use crate::matching::Side;
use crate::risk::liquidation_price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Net direction of a position. `Zero` never appears on a stored position:
/// an exactly closed position is removed instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
    Zero,
}

impl Direction {
    fn from_size(size: Decimal) -> Direction {
        if size > Decimal::ZERO {
            Direction::Buy
        } else if size < Decimal::ZERO {
            Direction::Sell
        } else {
            Direction::Zero
        }
    }
}

/// An account's net exposure on one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub instrument_name: String,
    pub average_price: Decimal,
    pub contract_size: Decimal,
    pub direction: Direction,
    pub estimated_liquidation_price: Decimal,
    /// Locked margin in USD.
    pub margin: Decimal,
    pub leverage: u32,
    /// Signed size: positive long, negative short.
    pub size: Decimal,
    pub mark_price: Decimal,
    pub index_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_funding: Decimal,
}

impl Position {
    /// Reshape `existing` by a fill of `fill_size` contracts at `fill_price`
    /// on `side`. Returns `None` when the fill closes the position exactly.
    #[allow(clippy::too_many_arguments)]
    pub fn after_fill(
        existing: Option<&Position>,
        instrument_name: &str,
        contract_size: Decimal,
        side: Side,
        fill_size: Decimal,
        fill_price: Decimal,
        leverage: u32,
        mark_price: Decimal,
        index_price: Decimal,
    ) -> Option<Position> {
        let delta = match side {
            Side::Buy => fill_size,
            Side::Sell => -fill_size,
        };
        let lev = Decimal::from(leverage.max(1));

        let mut position = match existing {
            None => {
                let margin = (fill_price * delta.abs()) / lev;
                Position {
                    instrument_name: instrument_name.to_string(),
                    average_price: fill_price,
                    contract_size,
                    direction: Direction::from_size(delta),
                    estimated_liquidation_price: liquidation_price(fill_price, margin, delta),
                    margin,
                    leverage,
                    size: delta,
                    mark_price,
                    index_price,
                    unrealized_pnl: Decimal::ZERO,
                    realized_funding: Decimal::ZERO,
                }
            }
            Some(current) => {
                let old_size = current.size;
                let new_size = old_size + delta;
                let same_sign = (old_size > Decimal::ZERO && delta > Decimal::ZERO)
                    || (old_size < Decimal::ZERO && delta < Decimal::ZERO);

                if same_sign {
                    // Adding exposure: blend the average, stack the margin.
                    let average_price =
                        (current.average_price * old_size + delta * fill_price) / new_size;
                    let margin = current.margin + (fill_price * delta.abs()) / lev;
                    Position {
                        average_price,
                        margin,
                        leverage,
                        size: new_size,
                        estimated_liquidation_price: liquidation_price(
                            average_price,
                            margin,
                            new_size,
                        ),
                        ..current.clone()
                    }
                } else if new_size.is_zero() {
                    // Exact close.
                    return None;
                } else if delta.abs() < old_size.abs() {
                    // Reduction: same average, margin re-based on what is left.
                    let margin = (new_size * fill_price / Decimal::from(current.leverage.max(1)))
                        .abs();
                    Position {
                        margin,
                        size: new_size,
                        estimated_liquidation_price: liquidation_price(
                            current.average_price,
                            margin,
                            new_size,
                        ),
                        ..current.clone()
                    }
                } else {
                    // Flip through zero: the leftover is a fresh position at
                    // the fill price.
                    let margin = (new_size * fill_price / lev).abs();
                    Position {
                        average_price: fill_price,
                        margin,
                        leverage,
                        size: new_size,
                        estimated_liquidation_price: liquidation_price(
                            fill_price,
                            margin,
                            new_size,
                        ),
                        ..current.clone()
                    }
                }
            }
        };

        position.direction = Direction::from_size(position.size);
        position.refresh(mark_price, index_price);
        Some(position)
    }

    /// Recompute mark-dependent fields against fresh prices.
    pub fn refresh(&mut self, mark_price: Decimal, index_price: Decimal) {
        self.mark_price = mark_price;
        self.index_price = index_price;
        self.unrealized_pnl =
            (mark_price - self.average_price) * self.size * self.contract_size;
    }

    /// Quote-denominated size of the position.
    pub fn size_usd(&self) -> Decimal {
        self.average_price * self.size
    }
}
