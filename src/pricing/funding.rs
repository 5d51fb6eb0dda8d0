//! Perpetual funding-rate loop.
//!
//! The premium index is sampled every five seconds over an eight-hour cycle
//! (5760 samples) as a time-weighted average; the funding rate derives from
//! the interest-rate constant, a ±5 % band around the average premium, a
//! hard [-0.75, 0.75] clamp, and a division by 100 to scale per cycle.

use crate::matching::{OrderBook, Side};
use crate::pricing::impact::fair_impact_price;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Constant interest-rate component of the funding rate.
pub const INTEREST_RATE: f64 = 0.01;

/// Samples per funding cycle: eight hours at one sample per five seconds.
pub const SAMPLES_PER_CYCLE: u32 = 5_760;

/// Premium index for one sample:
/// `((fair_bid - index)^+ - (index - fair_ask)^+) / index`.
pub fn premium_index(fair_bid: f64, fair_ask: f64, index: f64) -> f64 {
    ((fair_bid - index).max(0.0) - (index - fair_ask).max(0.0)) / index
}

/// Funding rate candidate from the running average premium: the interest
/// rate, pushed into a ±5 % band around the premium, clamped to
/// [-0.75, 0.75] and scaled per cycle.
pub fn funding_rate_from_premium(avg_premium: f64) -> f64 {
    let mut rate = INTEREST_RATE;
    if INTEREST_RATE - avg_premium < -0.05 {
        rate = avg_premium + 0.05;
    } else if INTEREST_RATE - avg_premium > 0.05 {
        rate = avg_premium - 0.05;
    }
    rate = rate.clamp(-0.75, 0.75);
    rate / 100.0
}

/// Drive the 5-second funding loop for one perpetual book.
pub async fn run_funding_loop(book: Arc<OrderBook>) {
    let imn = match book.impact_price_notional() {
        Some(imn) => imn.to_f64().unwrap_or(0.0),
        None => return,
    };
    let contract_size = book.contract_size().to_f64().unwrap_or(1.0);

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        // One eight-hour cycle of time-weighted premium samples.
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for sample_no in 1..=SAMPLES_PER_CYCLE {
            ticker.tick().await;

            let index = book.index_price().to_f64().unwrap_or(0.0);
            if index <= 0.0 {
                continue;
            }

            let fair_bid = fair_impact_price(&book.impact_levels(Side::Buy), imn, contract_size);
            let fair_ask = fair_impact_price(&book.impact_levels(Side::Sell), imn, contract_size);
            let premium = premium_index(fair_bid, fair_ask, index);

            let weight = sample_no as f64;
            weighted_sum += weight * premium;
            weight_total += weight;
            let avg_premium = weighted_sum / weight_total;

            let rate = funding_rate_from_premium(avg_premium);
            book.set_funding_rate(rate);
            trace!(
                instrument = book.instrument_name(),
                premium, avg_premium, rate, "funding sample"
            );
        }

        debug!(
            instrument = book.instrument_name(),
            rate = book.funding_rate(),
            "funding cycle complete"
        );
    }
}
