//! OHLC aggregation scenarios.

use derivex::charts::{Bar, OhlcAggregator, parse_resolution};
use rust_decimal_macros::dec;

// A 5-second-aligned frontier (2023-11-14 22:13:20 UTC).
const F: i64 = 1_700_000_000_000;

/// Three trades in one window produce the literal base bar, and a 1-minute
/// resample preserves it.
#[test]
fn test_base_bar_and_minute_resample() {
    let mut agg = OhlcAggregator::new(F);
    agg.apply_tick("ETH-18DEC26", F + 1_000, dec!(100), dec!(1));
    agg.apply_tick("ETH-18DEC26", F + 2_000, dec!(105), dec!(2));
    agg.apply_tick("ETH-18DEC26", F + 3_000, dec!(98), dec!(1));

    // Scheduler closes the window at F+5s.
    let flats = agg.on_close(F + 5_000);
    assert!(flats.is_empty(), "active window must not emit a flat bar");

    let base = agg.history("ETH-18DEC26", F, F + 4_999, "5S").unwrap();
    assert_eq!(
        base,
        vec![Bar {
            time: F,
            open: dec!(100),
            high: dec!(105),
            low: dec!(98),
            close: dec!(98),
            volume: dec!(4),
        }]
    );

    let minute = agg.history("ETH-18DEC26", F - 60_000, F + 60_000, "1min").unwrap();
    assert_eq!(minute.len(), 1);
    assert_eq!(minute[0].open, dec!(100));
    assert_eq!(minute[0].high, dec!(105));
    assert_eq!(minute[0].low, dec!(98));
    assert_eq!(minute[0].close, dec!(98));
    assert_eq!(minute[0].volume, dec!(4));
}

/// Quiet windows carry the close forward as flat zero-volume bars.
#[test]
fn test_inactivity_carries_close_forward() {
    let mut agg = OhlcAggregator::new(F);
    agg.apply_tick("ETH-18DEC26", F + 1_000, dec!(100), dec!(1));
    agg.on_close(F + 5_000);

    let flats = agg.on_close(F + 10_000);
    assert_eq!(flats.len(), 1);
    assert_eq!(flats[0].1.close, dec!(100));
    assert_eq!(flats[0].1.volume, dec!(0));

    let flats = agg.on_close(F + 15_000);
    assert_eq!(flats.len(), 1);
    assert_eq!(flats[0].1.time, F + 10_000);

    // Low <= open/close <= high and floor alignment hold for every bar.
    let bars = agg.history("ETH-18DEC26", 0, i64::MAX, "5S").unwrap();
    assert_eq!(bars.len(), 3);
    for bar in &bars {
        assert!(bar.low <= bar.open && bar.open <= bar.high);
        assert!(bar.low <= bar.close && bar.close <= bar.high);
        assert!(bar.volume >= dec!(0));
        assert_eq!(bar.time % 5_000, 0);
    }
}

/// Resampling aggregates highs, lows and volume across base bars.
#[test]
fn test_resample_across_windows() {
    let mut agg = OhlcAggregator::new(F);
    agg.apply_tick("ETH-18DEC26", F + 1_000, dec!(100), dec!(2));
    agg.on_close(F + 5_000);
    agg.apply_tick("ETH-18DEC26", F + 6_000, dec!(95), dec!(3));
    agg.on_close(F + 10_000);
    agg.apply_tick("ETH-18DEC26", F + 11_000, dec!(108), dec!(1));

    let bars = agg.history("ETH-18DEC26", F - 60_000, F + 60_000, "1").unwrap();
    assert_eq!(bars.len(), 1);
    let bar = &bars[0];
    assert_eq!(bar.open, dec!(100));
    assert_eq!(bar.low, dec!(95));
    assert_eq!(bar.high, dec!(108));
    assert_eq!(bar.close, dec!(108));
    assert_eq!(bar.volume, dec!(6));
}

/// Instruments are independent: one instrument's trades never touch the
/// other's series.
#[test]
fn test_instruments_are_independent() {
    let mut agg = OhlcAggregator::new(F);
    agg.apply_tick("ETH-18DEC26", F + 1_000, dec!(100), dec!(1));
    agg.apply_tick("BTCUSD-PERP", F + 1_000, dec!(20000), dec!(5));

    let eth = agg.history("ETH-18DEC26", 0, i64::MAX, "5S").unwrap();
    let btc = agg.history("BTCUSD-PERP", 0, i64::MAX, "5S").unwrap();
    assert_eq!(eth.len(), 1);
    assert_eq!(btc.len(), 1);
    assert_eq!(eth[0].close, dec!(100));
    assert_eq!(btc[0].close, dec!(20000));
}

#[test]
fn test_unknown_resolution_is_invalid() {
    let agg = OhlcAggregator::new(F);
    assert!(agg.history("ETH-18DEC26", 0, 1, "eon").is_err());
    assert!(parse_resolution("eon").is_err());
}
