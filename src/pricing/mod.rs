//! Mark-price computation: fair impact prices, EMA loops and the
//! funding-rate cycle.

pub mod ema;
pub mod funding;
pub mod impact;

pub use ema::{clamped_mark_price, ema_step, run_ema_loop};
pub use funding::{
    INTEREST_RATE, SAMPLES_PER_CYCLE, funding_rate_from_premium, premium_index, run_funding_loop,
};
pub use impact::fair_impact_price;
