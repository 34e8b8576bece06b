//! The single most-recent-day summary of the ensemble.

use log::info;
use serde_derive::Serialize;

use crate::define_report;
use crate::ensemble::{Bounds, GlobalBounds};
use crate::growth::doubling_time;
use crate::numeric::{round_count, round_places};

/// An R-eff bound at or above this means the epidemic is clearly growing.
pub const GROWING_REFF: f64 = 1.1;

/// An R-eff bound at or below this means the epidemic is clearly shrinking.
pub const SHRINKING_REFF: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregates {
    pub lower_reff: f64,
    pub baseline_reff: f64,
    pub upper_reff: f64,

    /// Whole days, 0 where the growth rate is outside the doubling-time domain.
    pub lower_doubling_time: i64,
    pub baseline_doubling_time: i64,
    pub upper_doubling_time: i64,

    /// Set unless the R-eff bounds sit clearly on one side of 1 and every doubling time is
    /// defined.
    pub unstable: bool,

    pub lower_seroprevalence: f64,
    pub baseline_seroprevalence: f64,
    pub upper_seroprevalence: f64,

    pub lower_mortality: i64,
    pub baseline_mortality: i64,
    pub upper_mortality: i64,
}

define_report!(Aggregates, "aggregates");

impl Aggregates {
    #[must_use]
    pub fn from_bounds(bounds: &GlobalBounds) -> Self {
        let reff = bounds.reff.map(|r| round_places(*r, 2));
        let doubling = bounds.growth_rate.map(|g| round_count(doubling_time(*g)));
        let unstable = is_unstable(&reff, &doubling);

        let aggregates = Aggregates {
            lower_reff: reff.lower,
            baseline_reff: reff.baseline,
            upper_reff: reff.upper,
            lower_doubling_time: doubling.lower,
            baseline_doubling_time: doubling.baseline,
            upper_doubling_time: doubling.upper,
            unstable,
            lower_seroprevalence: bounds.seroprevalence.lower,
            baseline_seroprevalence: bounds.seroprevalence.baseline,
            upper_seroprevalence: bounds.seroprevalence.upper,
            lower_mortality: bounds.mortality.lower,
            baseline_mortality: bounds.mortality.baseline,
            upper_mortality: bounds.mortality.upper,
        };
        info!(
            "R-eff {:.2} ({:.2} to {:.2}), doubling time {} days, {}",
            aggregates.baseline_reff,
            aggregates.lower_reff,
            aggregates.upper_reff,
            aggregates.baseline_doubling_time,
            if unstable { "unstable" } else { "stable" }
        );
        aggregates
    }
}

fn is_unstable(reff: &Bounds<f64>, doubling: &Bounds<i64>) -> bool {
    let decisive = reff.lower >= GROWING_REFF || reff.upper <= SHRINKING_REFF;
    let defined = doubling.lower != 0 && doubling.baseline != 0 && doubling.upper != 0;
    !(decisive && defined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds<T: Copy>(lower: T, baseline: T, upper: T) -> Bounds<T> {
        Bounds {
            lower,
            baseline,
            upper,
        }
    }

    fn global(growth: Bounds<f64>, reff: Bounds<f64>) -> GlobalBounds {
        GlobalBounds {
            growth_rate: growth,
            reff,
            seroprevalence: bounds(1.2, 1.5, 2.0),
            mortality: bounds(600, 610, 640),
        }
    }

    #[test]
    fn clearly_growing_is_stable() {
        let aggregates =
            Aggregates::from_bounds(&global(bounds(0.05, 0.07, 0.1), bounds(1.2, 1.3, 1.456)));
        assert!(!aggregates.unstable);
        assert_eq!(aggregates.upper_reff, 1.46);
        // ln 2 / ln 1.05 = 14.2
        assert_eq!(aggregates.lower_doubling_time, 14);
        assert_eq!(aggregates.upper_doubling_time, 7);
        assert_eq!(aggregates.baseline_mortality, 610);
        assert_eq!(aggregates.upper_seroprevalence, 2.0);
    }

    #[test]
    fn clearly_shrinking_is_stable() {
        let aggregates = Aggregates::from_bounds(&global(
            bounds(-0.1, -0.07, -0.05),
            bounds(0.6, 0.7, 0.9),
        ));
        assert!(!aggregates.unstable);
        assert!(aggregates.lower_doubling_time < 0);
    }

    #[test]
    fn straddling_one_is_unstable() {
        let aggregates =
            Aggregates::from_bounds(&global(bounds(0.05, 0.07, 0.1), bounds(0.95, 1.05, 1.2)));
        assert!(aggregates.unstable);
    }

    #[test]
    fn undefined_doubling_time_is_unstable() {
        // Growth inside the dead band has no doubling time.
        let aggregates =
            Aggregates::from_bounds(&global(bounds(0.01, 0.05, 0.1), bounds(1.2, 1.3, 1.4)));
        assert_eq!(aggregates.lower_doubling_time, 0);
        assert!(aggregates.unstable);
    }
}
