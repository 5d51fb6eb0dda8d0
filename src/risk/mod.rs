//! Risk engine: standard-margin formulas and liquidation price.

pub mod liquidation;
pub mod standard_margin;

pub use liquidation::liquidation_price;
pub use standard_margin::{
    margin_delta, order_margin, orders_margin, positions_margin, total_margin_required,
};
