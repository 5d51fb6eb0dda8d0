//! Fair impact price: the volume-weighted price required to absorb a fixed
//! quote notional (the impact price notional, IMN) on one book side.

/// Walk `levels` (price, remaining) in priority order and return the fair
/// impact price for absorbing `impact_notional` of quote notional.
///
/// Each level contributes `remaining · price / contract_size` of notional and
/// `remaining` of size. Accumulation stops before the level that would push
/// the running notional past the IMN; the tail is interpolated from the last
/// accepted contribution. Returns zero when the book is too thin to anchor
/// the interpolation.
pub fn fair_impact_price(levels: &[(f64, f64)], impact_notional: f64, contract_size: f64) -> f64 {
    if contract_size <= 0.0 {
        return 0.0;
    }

    let mut notional_total = 0.0;
    let mut size_total = 0.0;
    let mut last_notional = 0.0;
    let mut last_size = 0.0;

    for &(price, remaining) in levels {
        let contribution = remaining * price / contract_size;
        if notional_total + contribution < impact_notional {
            notional_total += contribution;
            size_total += remaining;
            last_notional = contribution;
            last_size = remaining;
        }
    }

    let denom = (impact_notional - notional_total) / (notional_total - last_notional)
        + (size_total - last_size);
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    impact_notional / denom
}
