//! One ensemble member: a fixed parameter set run through the reconstruction pipeline over the
//! whole observed timeline.
//!
//! The pipeline has eight phases and their order is part of its correctness, since each phase
//! reads fields written by the ones before it:
//!
//! 1. admissions inferred from occupancy and discharge churn
//! 2. run-up incidence before the feed starts, from mortality
//! 3. region classification (`SourcedOn`)
//! 4. cases-per-admission autocalibration
//! 5. incidence reconstruction for the non-projected regions
//! 6. local growth rate, doubling time and R-eff
//! 7. growth snapshot and projection of the most recent days
//! 8. cumulative seroprevalence and mortality
//!
//! Scenarios only read the shared `TimeSeries`; they never share mutable state, so any number
//! of them may run concurrently.

mod day;
mod phases;

pub use day::{DayWithAggregates, RunUpDay, SourcedOn};

use log::debug;

use crate::parameters::ScenarioParameters;
use crate::timeseries::{TimeSeries, TimelineIndex};

/// Position of a scenario in the grid enumeration. Used wherever results need to refer back to
/// the scenario that produced them.
pub type ScenarioKey = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    key: ScenarioKey,
    parameters: ScenarioParameters,
    days: Vec<DayWithAggregates>,
    run_up_days: Vec<RunUpDay>,
    current_growth_rate: f64,
    current_reff: f64,
    projected_seroprevalence: f64,
    projected_mortality: i64,
}

impl Scenario {
    /// Runs the full pipeline for one parameter set.
    #[must_use]
    pub fn run(
        key: ScenarioKey,
        parameters: ScenarioParameters,
        series: &TimeSeries,
        population: u64,
    ) -> Self {
        debug!("scenario {key}: running with {parameters:?}");
        let mut scenario = Scenario {
            key,
            parameters,
            days: Vec::with_capacity(series.len()),
            run_up_days: Vec::with_capacity(parameters.death_delay),
            current_growth_rate: 0.0,
            current_reff: 0.0,
            projected_seroprevalence: 0.0,
            projected_mortality: 0,
        };

        scenario.compute_admissions_with_churn(series);
        scenario.compute_run_up_days(series);
        scenario.classify_regions();
        scenario.autocalibrate_cases_per_admission(series);
        scenario.reconstruct_incidence(series);
        scenario.compute_local_growth();
        scenario.project_recent_days();
        scenario.compute_linear_aggregates(series, population);

        debug!(
            "scenario {key}: growth {:.4}, R-eff {:.2}, seroprevalence {:.1}%, mortality {}",
            scenario.current_growth_rate,
            scenario.current_reff,
            scenario.projected_seroprevalence,
            scenario.projected_mortality
        );
        scenario
    }

    #[must_use]
    pub fn key(&self) -> ScenarioKey {
        self.key
    }

    #[must_use]
    pub fn parameters(&self) -> &ScenarioParameters {
        &self.parameters
    }

    /// Observed days, indexed by timeline index.
    #[must_use]
    pub fn days(&self) -> &[DayWithAggregates] {
        &self.days
    }

    /// Run-up days, earliest first. There are `death_delay` of them.
    #[must_use]
    pub fn run_up_days(&self) -> &[RunUpDay] {
        &self.run_up_days
    }

    #[must_use]
    pub fn day(&self, index: usize) -> Option<&DayWithAggregates> {
        self.days.get(index)
    }

    /// The run-up day at a negative timeline index, if this scenario's run-up reaches back that
    /// far.
    #[must_use]
    pub fn run_up_day(&self, index: TimelineIndex) -> Option<&RunUpDay> {
        let position = index.checked_add(i64::try_from(self.parameters.death_delay).ok()?)?;
        if index >= 0 || position < 0 {
            return None;
        }
        self.run_up_days.get(usize::try_from(position).ok()?)
    }

    /// Earliest timeline index this scenario holds data for.
    #[must_use]
    pub fn first_timeline_index(&self) -> TimelineIndex {
        self.run_up_days.first().map_or(0, |day| day.timeline_index)
    }

    /// Mean growth rate over the latest non-projected days.
    #[must_use]
    pub fn current_growth_rate(&self) -> f64 {
        self.current_growth_rate
    }

    /// Mean R-eff over the latest non-projected days, to two decimals.
    #[must_use]
    pub fn current_reff(&self) -> f64 {
        self.current_reff
    }

    /// Percent of the population ever infected, to one decimal.
    #[must_use]
    pub fn projected_seroprevalence(&self) -> f64 {
        self.projected_seroprevalence
    }

    /// Observed deaths plus those still to come from recent infections.
    #[must_use]
    pub fn projected_mortality(&self) -> i64 {
        self.projected_mortality
    }
}
