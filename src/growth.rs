//! Growth-rate derived quantities shared by the per-scenario pipeline and the global aggregates.
//!
//! Infinite values (growth at zero incidence, doubling time at zero growth) are stored as zero.

use std::f64::consts::LN_2;

/// Below this growth rate the second-order R-eff approximation no longer holds.
pub const MIN_GROWTH_FOR_REFF: f64 = -0.35;

/// Growth rates this close to zero give a doubling time too large to be meaningful.
pub const DOUBLING_TIME_DEAD_BAND: f64 = 0.02;

/// At or below this growth rate the halving time drops under a day.
pub const MIN_GROWTH_FOR_DOUBLING_TIME: f64 = -0.9;

/// Relative daily growth: the mean day-over-day delta divided by current incidence, or 0 when
/// there is no incidence to grow from.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn growth_rate(mean_delta: f64, incidence: i64) -> f64 {
    if incidence == 0 {
        return 0.0;
    }
    mean_delta / incidence as f64
}

/// Whether `ln 2 / ln(1 + g)` is reported for this growth rate.
#[must_use]
pub fn has_doubling_time(growth_rate: f64) -> bool {
    (MIN_GROWTH_FOR_DOUBLING_TIME..=-DOUBLING_TIME_DEAD_BAND).contains(&growth_rate)
        || growth_rate > DOUBLING_TIME_DEAD_BAND
}

/// Doubling time in days (negative when halving), or 0 outside the reported domain.
#[must_use]
pub fn doubling_time(growth_rate: f64) -> f64 {
    if has_doubling_time(growth_rate) {
        LN_2 / (1.0 + growth_rate).ln()
    } else {
        0.0
    }
}

/// Effective reproduction number from a growth rate:
///
/// `R = 1 + g·SI + f·(1 − f)·(g·SI)²`
///
/// where `SI` is the serial interval and `f` the transmissible fraction of it. Returns 0 when
/// the approximation is out of range or the result is negative.
#[must_use]
pub fn effective_reproduction(
    growth_rate: f64,
    serial_interval: f64,
    transmissible_fraction: f64,
) -> f64 {
    let scaled = growth_rate * serial_interval;
    let reff =
        1.0 + scaled + transmissible_fraction * (1.0 - transmissible_fraction) * scaled.powi(2);
    if reff < 0.0 || growth_rate < MIN_GROWTH_FOR_REFF {
        0.0
    } else {
        reff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_almost_eq;
    use crate::numeric::ACC;

    #[test]
    fn zero_incidence_has_zero_growth() {
        assert_eq!(growth_rate(25.0, 0), 0.0);
        assert_almost_eq!(growth_rate(25.0, 500), 0.05, ACC);
    }

    #[test]
    fn doubling_time_domain() {
        assert_eq!(doubling_time(0.0), 0.0);
        assert_eq!(doubling_time(0.02), 0.0);
        assert_eq!(doubling_time(-0.01), 0.0);
        assert_eq!(doubling_time(-0.95), 0.0);
        assert!(doubling_time(-0.02) < 0.0);
        assert!(doubling_time(-0.9) < 0.0);
        assert_almost_eq!(doubling_time(1.0), 1.0, ACC);
        assert_almost_eq!(doubling_time(0.1), LN_2 / 1.1f64.ln(), ACC);
    }

    #[test]
    fn reff_at_zero_growth_is_one() {
        assert_almost_eq!(effective_reproduction(0.0, 4.5, 0.6), 1.0, ACC);
    }

    #[test]
    fn reff_second_order_term() {
        // g·SI = 0.5, f(1-f) = 0.24
        assert_almost_eq!(
            effective_reproduction(0.1, 5.0, 0.6),
            1.0 + 0.5 + 0.24 * 0.25,
            ACC
        );
    }

    #[test]
    fn reff_guarded_below_approximation_range() {
        assert_eq!(effective_reproduction(-0.36, 3.5, 0.5), 0.0);
        // g·SI = -1.4 drives the polynomial negative with f = 0 (no second-order term)
        assert_eq!(effective_reproduction(-0.2, 7.0, 0.0), 0.0);
    }
}
