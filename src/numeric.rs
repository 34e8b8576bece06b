//! Floating point helpers shared by the pipeline: tolerant comparison (a thin wrapper around the
//! approx crate), the rounding rules used for integer-valued and fixed-precision outputs, and
//! guarded division.

use approx::AbsDiffEq;

/// Targeted accuracy instantiated over `f64`
pub const ACC: f64 = 10e-11;

/// Compares if two floats are close via `approx::abs_diff_eq` using a maximum absolute difference
/// (epsilon) of `acc`.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

/// Rounds to the nearest integer, ties to even. All integer-valued quantities (admissions,
/// incidence, cases per admission, projected deaths) go through here.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn round_count(value: f64) -> i64 {
    if !value.is_finite() {
        return 0;
    }
    value.round_ties_even() as i64
}

/// Rounds to `places` decimal digits, ties to even.
#[must_use]
pub fn round_places(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round_ties_even() / scale
}

/// `numerator / denominator`, or `None` when the denominator is zero or the quotient is not finite.
#[must_use]
pub fn checked_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let ratio = numerator / denominator;
    ratio.is_finite().then_some(ratio)
}

/// Arithmetic mean, or `None` for an empty input.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_almost_eq;

    #[test]
    fn almost_eq_within_tolerance() {
        let a = 1.0;
        let b = 1.0 + 0.5e-11;
        // within ACC = 10e-11
        assert!(almost_eq(a, b, ACC));
    }

    #[test]
    fn almost_eq_outside_tolerance() {
        let a = 1.0;
        let b = 1.0 + 2e-10;
        assert!(!almost_eq(a, b, ACC));
    }

    #[test]
    fn almost_eq_infinities() {
        assert!(almost_eq(f64::INFINITY, f64::INFINITY, ACC));
        assert!(!almost_eq(f64::INFINITY, f64::NEG_INFINITY, ACC));
    }

    #[test]
    fn round_count_ties_to_even() {
        assert_eq!(round_count(2.5), 2);
        assert_eq!(round_count(3.5), 4);
        assert_eq!(round_count(-2.5), -2);
        assert_eq!(round_count(1000.4), 1000);
        assert_eq!(round_count(f64::NAN), 0);
    }

    #[test]
    fn round_places_fixed_precision() {
        assert_almost_eq!(round_places(1.23456, 2), 1.23, ACC);
        assert_almost_eq!(round_places(12.36, 1), 12.4, 1e-9);
        // 0.125 is exact in binary, so this is a true tie
        assert_almost_eq!(round_places(0.125, 2), 0.12, 1e-9);
        assert_almost_eq!(round_places(0.9049, 2), 0.90, ACC);
    }

    #[test]
    fn checked_ratio_guards_zero() {
        assert_eq!(checked_ratio(1.0, 0.0), None);
        assert_eq!(checked_ratio(0.0, 0.0), None);
        assert_almost_eq!(checked_ratio(3.0, 4.0).unwrap(), 0.75, ACC);
    }

    #[test]
    fn mean_of_empty_is_none() {
        assert_eq!(mean(std::iter::empty()), None);
        assert_almost_eq!(mean([1.0, 2.0, 6.0]).unwrap(), 3.0, ACC);
    }

    #[test]
    fn assert_almost_eq_macro_passes() {
        assert_almost_eq!(3.14159265, 3.14159264, 1e-7);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn assert_almost_eq_macro_panics() {
        assert_almost_eq!(1.0, 1.001, 1e-4);
    }
}
