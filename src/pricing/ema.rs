//! Mark-price EMA loops.
//!
//! Once per second each active book folds the deviation between its fair or
//! market price and the index into a 30-period EMA. The mark price is the
//! index plus the EMA deviation, clamped to a per-book ratio of the index.

use crate::matching::{OrderBook, Side};
use crate::pricing::impact::fair_impact_price;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// EMA period. The smoothing factor is `2 / (N + 1)`.
const EMA_PERIOD: f64 = 30.0;

/// One EMA fold of `sample - index` into the previous value.
pub fn ema_step(previous: f64, sample: f64, index: f64) -> f64 {
    let k = 2.0 / (EMA_PERIOD + 1.0);
    (sample - index) * k + previous * (1.0 - k)
}

/// Mark price from the index and EMA deviation, clamped to
/// `±clamp_ratio · index`.
pub fn clamped_mark_price(index: f64, ema: f64, clamp_ratio: f64) -> f64 {
    if index <= 0.0 {
        return 0.0;
    }
    if ema >= clamp_ratio * index {
        (1.0 + clamp_ratio) * index
    } else if ema <= -clamp_ratio * index {
        (1.0 - clamp_ratio) * index
    } else {
        index + ema
    }
}

impl OrderBook {
    /// One perpetual EMA update: fold the mid of the fair impact bid/ask
    /// prices against the index.
    pub fn update_perp_ema_once(&self) {
        let index = self.index_price().to_f64().unwrap_or(0.0);
        let imn = match self.impact_price_notional() {
            Some(imn) => imn.to_f64().unwrap_or(0.0),
            None => return,
        };
        let contract_size = self.contract_size().to_f64().unwrap_or(1.0);

        let fair_bid = fair_impact_price(&self.impact_levels(Side::Buy), imn, contract_size);
        let fair_ask = fair_impact_price(&self.impact_levels(Side::Sell), imn, contract_size);
        let sample = (fair_bid + fair_ask) / 2.0;

        let next = ema_step(self.ema(), sample, index);
        self.set_ema(next);
        trace!(
            instrument = self.instrument_name(),
            fair_bid, fair_ask, ema = next, "perp ema updated"
        );
    }

    /// One dated-futures EMA update: fold the last trade price, pulled back
    /// inside the touch when it sits on the wrong side of the book.
    pub fn update_futures_ema_once(&self) {
        let index = self.index_price().to_f64().unwrap_or(0.0);
        let mut sample = self.last_price().to_f64().unwrap_or(0.0);

        let best_bid = self.best_bid_price();
        let best_ask = self.best_ask_price();
        if !best_bid.is_zero() {
            sample = sample.max(best_bid.to_f64().unwrap_or(sample));
        }
        if !best_ask.is_zero() {
            sample = sample.min(best_ask.to_f64().unwrap_or(sample));
        }

        let next = ema_step(self.ema(), sample, index);
        self.set_ema(next);
        trace!(
            instrument = self.instrument_name(),
            sample, ema = next, "futures ema updated"
        );
    }
}

/// Drive the 1-second EMA loop for one book. Perpetual books (those with an
/// impact price notional) use the fair-price fold, dated books the
/// last-trade fold.
pub async fn run_ema_loop(book: Arc<OrderBook>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if book.impact_price_notional().is_some() {
            book.update_perp_ema_once();
        } else {
            book.update_futures_ema_once();
        }
    }
}
