//! OHLC bar aggregation at a fixed five-second base resolution.
//!
//! Bars are floor-aligned to UTC. Within a window the first trade opens a
//! new bar and later trades update it in place; the five-second scheduler
//! closes the window, emitting a flat carry-forward bar for instruments that
//! stayed quiet, and advances the frontier. History queries resample the
//! base bars on demand.

use crate::error::{ExchangeError, ExchangeResult};
use crate::utils::floor_to_resolution;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Base bar resolution in milliseconds.
pub const BASE_RESOLUTION_MS: i64 = 5_000;

/// One OHLC candle. `time` is milliseconds since epoch, floor-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    fn flat(time: i64, price: Decimal) -> Self {
        Self {
            time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: Decimal::ZERO,
        }
    }
}

/// Parse a chart resolution into milliseconds.
///
/// A bare integer means minutes; otherwise a trailing unit of `S`, `min`,
/// `H` or `D` is accepted.
pub fn parse_resolution(resolution: &str) -> ExchangeResult<i64> {
    let resolution = resolution.trim();
    if let Ok(minutes) = resolution.parse::<i64>() {
        if minutes > 0 {
            return Ok(minutes * 60_000);
        }
    }

    let (digits, unit_ms) = if let Some(n) = resolution.strip_suffix("min") {
        (n, 60_000)
    } else if let Some(n) = resolution.strip_suffix(['S', 's']) {
        (n, 1_000)
    } else if let Some(n) = resolution.strip_suffix(['H', 'h']) {
        (n, 3_600_000)
    } else if let Some(n) = resolution.strip_suffix(['D', 'd']) {
        (n, 86_400_000)
    } else {
        return Err(ExchangeError::InvalidArgument(format!(
            "unsupported resolution {resolution}"
        )));
    };

    match digits.parse::<i64>() {
        Ok(count) if count > 0 => Ok(count * unit_ms),
        _ => Err(ExchangeError::InvalidArgument(format!(
            "unsupported resolution {resolution}"
        ))),
    }
}

/// Per-instrument bar store with the shared window frontier.
pub struct OhlcAggregator {
    series: HashMap<String, Vec<Bar>>,
    /// True when the next tick for the instrument should open a new bar.
    row_flags: HashMap<String, bool>,
    /// Start of the current base window, milliseconds.
    frontier: i64,
}

impl OhlcAggregator {
    pub fn new(now_ms: i64) -> Self {
        Self {
            series: HashMap::new(),
            row_flags: HashMap::new(),
            frontier: floor_to_resolution(now_ms, BASE_RESOLUTION_MS),
        }
    }

    pub fn frontier(&self) -> i64 {
        self.frontier
    }

    /// Apply one trade tick and return the bar to publish.
    pub fn apply_tick(
        &mut self,
        instrument_name: &str,
        time_ms: i64,
        price: Decimal,
        size: Decimal,
    ) -> Bar {
        let series = self
            .series
            .entry(instrument_name.to_string())
            .or_default();
        let row_flag = self
            .row_flags
            .entry(instrument_name.to_string())
            .or_insert(true);

        let opens_new_bar = (*row_flag && time_ms >= self.frontier) || series.is_empty();
        if opens_new_bar {
            let bar = Bar {
                time: self.frontier,
                open: price,
                high: price,
                low: price,
                close: price,
                volume: size,
            };
            series.push(bar.clone());
            *row_flag = false;
            return bar;
        }

        // The empty case is handled above, so a last bar always exists here.
        let last = series
            .last_mut()
            .expect("series is non-empty on the update path");
        if price > last.high {
            last.high = price;
        }
        if price < last.low {
            last.low = price;
        }
        last.close = price;
        last.volume += size;
        last.clone()
    }

    /// Close the current window: emit a flat carry-forward bar for every
    /// quiet instrument, advance the frontier, and arm every instrument for
    /// a fresh bar. Returns the flat bars to publish.
    pub fn on_close(&mut self, now_ms: i64) -> Vec<(String, Bar)> {
        let mut flat_bars = Vec::new();

        for (name, row_flag) in self.row_flags.iter_mut() {
            if *row_flag {
                if let Some(series) = self.series.get_mut(name) {
                    if let Some(last_close) = series.last().map(|bar| bar.close) {
                        let bar = Bar::flat(self.frontier, last_close);
                        series.push(bar.clone());
                        flat_bars.push((name.clone(), bar));
                    }
                }
            }
            *row_flag = true;
        }

        self.frontier = floor_to_resolution(now_ms, BASE_RESOLUTION_MS);
        flat_bars
    }

    /// Resampled history over `[from_ms, to_ms]`.
    pub fn history(
        &self,
        instrument_name: &str,
        from_ms: i64,
        to_ms: i64,
        resolution: &str,
    ) -> ExchangeResult<Vec<Bar>> {
        let resolution_ms = parse_resolution(resolution)?;
        let series = match self.series.get(instrument_name) {
            Some(series) => series,
            None => return Ok(Vec::new()),
        };

        let from_window = floor_to_resolution(from_ms, resolution_ms);
        Ok(resample(series, resolution_ms)
            .into_iter()
            .filter(|(window, _)| *window >= from_window && *window <= to_ms)
            .map(|(_, bar)| bar)
            .collect())
    }
}

/// Group time-ordered base bars into coarser windows: open = first, high =
/// max, low = min, close = last, volume = sum, time = first bar's time.
fn resample(bars: &[Bar], resolution_ms: i64) -> Vec<(i64, Bar)> {
    let mut windows: Vec<(i64, Bar)> = Vec::new();

    for bar in bars {
        let window = floor_to_resolution(bar.time, resolution_ms);
        match windows.last_mut() {
            Some((current, merged)) if *current == window => {
                if bar.high > merged.high {
                    merged.high = bar.high;
                }
                if bar.low < merged.low {
                    merged.low = bar.low;
                }
                merged.close = bar.close;
                merged.volume += bar.volume;
            }
            _ => windows.push((window, bar.clone())),
        }
    }

    windows
}
