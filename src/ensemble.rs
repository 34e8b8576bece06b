//! Reduction of the scenario ensemble into per-day lower/baseline/upper bounds.
//!
//! Bounds are positional. For each timeline day, the scenarios holding data for that day are
//! sorted by reconstructed incidence, and the first, middle and last are copied out. Nothing
//! ties a bound to a scenario across days: the scenario in the lower slot on one day may sit
//! in the upper slot on the next.

use std::cmp::Ordering;

use chrono::NaiveDate;
use log::{debug, trace};
use serde_derive::Serialize;

use crate::define_report;
use crate::scenario::{Scenario, ScenarioKey, SourcedOn};
use crate::timeseries::{TimeSeries, TimelineIndex};

/// A lower, baseline and upper value of one quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds<T> {
    pub lower: T,
    pub baseline: T,
    pub upper: T,
}

impl<T> Bounds<T> {
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> Bounds<U> {
        Bounds {
            lower: f(&self.lower),
            baseline: f(&self.baseline),
            upper: f(&self.upper),
        }
    }
}

/// Sorts `candidates` ascending by `key` and picks indices `0`, `n / 2` and `n - 1`. The sort
/// is stable, so candidates with equal keys keep their input order. Returns `None` for an empty
/// input.
pub fn select_bounds<T, K, F>(mut candidates: Vec<T>, key: F) -> Option<Bounds<T>>
where
    T: Clone,
    K: Ord,
    F: FnMut(&T) -> K,
{
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by_key(key);
    let last = candidates.len() - 1;
    Some(Bounds {
        lower: candidates[0].clone(),
        baseline: candidates[candidates.len() / 2].clone(),
        upper: candidates[last].clone(),
    })
}

/// One scenario's values on one timeline day. Run-up days only carry incidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioDay {
    pub key: ScenarioKey,
    pub sourced_on: SourcedOn,
    pub actual_dnc: i64,
    pub admissions: Option<i64>,
    pub mean_delta: Option<f64>,
    pub growth_rate: Option<f64>,
    pub reff: Option<f64>,
    pub doubling_time: Option<f64>,
}

impl ScenarioDay {
    /// `None` if the scenario holds no data for this day, which happens on run-up days older
    /// than its delay to death.
    #[must_use]
    pub fn of(scenario: &Scenario, index: TimelineIndex) -> Option<Self> {
        if index < 0 {
            let day = scenario.run_up_day(index)?;
            return Some(ScenarioDay {
                key: scenario.key(),
                sourced_on: day.sourced_on,
                actual_dnc: day.actual_dnc,
                admissions: None,
                mean_delta: None,
                growth_rate: None,
                reff: None,
                doubling_time: None,
            });
        }
        let day = scenario.day(usize::try_from(index).ok()?)?;
        Some(ScenarioDay {
            key: scenario.key(),
            sourced_on: day.sourced_on,
            actual_dnc: day.actual_dnc,
            admissions: Some(day.admissions_with_churn),
            mean_delta: Some(day.mean_delta),
            growth_rate: Some(day.growth_rate),
            reff: Some(day.reff),
            doubling_time: Some(day.doubling_time),
        })
    }
}

/// Ensemble bounds for a single timeline day, taken across every scenario with data for it.
#[must_use]
pub fn bounds_for_day(scenarios: &[Scenario], index: TimelineIndex) -> Option<Bounds<ScenarioDay>> {
    let candidates: Vec<ScenarioDay> = scenarios
        .iter()
        .filter_map(|scenario| ScenarioDay::of(scenario, index))
        .collect();
    trace!("day {index}: {} contributing scenarios", candidates.len());
    select_bounds(candidates, |day| day.actual_dnc)
}

/// One row of the per-day output: the observed values (empty on run-up days) and the three
/// bounds, each tagged with the region and scenario it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultsDay {
    pub timeline_index: TimelineIndex,
    pub date: NaiveDate,

    pub dnc: Option<u32>,
    pub tests: Option<u32>,
    pub positivity: Option<f64>,
    pub deaths: Option<u32>,
    pub occupancy: Option<u32>,

    pub dnc_5day: Option<f64>,
    pub tests_5day: Option<f64>,
    pub positivity_5day: Option<f64>,
    pub deaths_5day: Option<f64>,
    pub occupancy_5day: Option<f64>,

    pub lower_scenario: ScenarioKey,
    pub lower_sourced_on: SourcedOn,
    pub lower_admissions: Option<i64>,
    pub lower_actual_dnc: i64,
    pub lower_mean_delta: Option<f64>,
    pub lower_growth_rate: Option<f64>,
    pub lower_reff: Option<f64>,
    pub lower_doubling_time: Option<f64>,

    pub baseline_scenario: ScenarioKey,
    pub baseline_sourced_on: SourcedOn,
    pub baseline_admissions: Option<i64>,
    pub baseline_actual_dnc: i64,
    pub baseline_mean_delta: Option<f64>,
    pub baseline_growth_rate: Option<f64>,
    pub baseline_reff: Option<f64>,
    pub baseline_doubling_time: Option<f64>,

    pub upper_scenario: ScenarioKey,
    pub upper_sourced_on: SourcedOn,
    pub upper_admissions: Option<i64>,
    pub upper_actual_dnc: i64,
    pub upper_mean_delta: Option<f64>,
    pub upper_growth_rate: Option<f64>,
    pub upper_reff: Option<f64>,
    pub upper_doubling_time: Option<f64>,
}

define_report!(ResultsDay, "result_days");

impl ResultsDay {
    fn new(series: &TimeSeries, index: TimelineIndex, bounds: &Bounds<ScenarioDay>) -> Self {
        let observed = usize::try_from(index).ok().and_then(|i| series.day(i));
        let raw = observed.map(|day| day.raw);
        let rolling = observed.map(|day| day.rolling);
        let Bounds {
            lower,
            baseline,
            upper,
        } = *bounds;

        ResultsDay {
            timeline_index: index,
            date: series.date_of(index),

            dnc: raw.map(|r| r.dnc),
            tests: raw.map(|r| r.tests),
            positivity: raw.map(|r| r.positivity),
            deaths: raw.map(|r| r.deaths),
            occupancy: raw.map(|r| r.occupancy),

            dnc_5day: rolling.map(|r| r.dnc),
            tests_5day: rolling.map(|r| r.tests),
            positivity_5day: rolling.map(|r| r.positivity),
            deaths_5day: rolling.map(|r| r.deaths),
            occupancy_5day: rolling.map(|r| r.occupancy),

            lower_scenario: lower.key,
            lower_sourced_on: lower.sourced_on,
            lower_admissions: lower.admissions,
            lower_actual_dnc: lower.actual_dnc,
            lower_mean_delta: lower.mean_delta,
            lower_growth_rate: lower.growth_rate,
            lower_reff: lower.reff,
            lower_doubling_time: lower.doubling_time,

            baseline_scenario: baseline.key,
            baseline_sourced_on: baseline.sourced_on,
            baseline_admissions: baseline.admissions,
            baseline_actual_dnc: baseline.actual_dnc,
            baseline_mean_delta: baseline.mean_delta,
            baseline_growth_rate: baseline.growth_rate,
            baseline_reff: baseline.reff,
            baseline_doubling_time: baseline.doubling_time,

            upper_scenario: upper.key,
            upper_sourced_on: upper.sourced_on,
            upper_admissions: upper.admissions,
            upper_actual_dnc: upper.actual_dnc,
            upper_mean_delta: upper.mean_delta,
            upper_growth_rate: upper.growth_rate,
            upper_reff: upper.reff,
            upper_doubling_time: upper.doubling_time,
        }
    }
}

/// One `ResultsDay` per timeline index, from the oldest run-up day of any scenario to the most
/// recent observed day. Empty when there are no scenarios.
#[must_use]
pub fn extract_result_days(series: &TimeSeries, scenarios: &[Scenario]) -> Vec<ResultsDay> {
    let Some(first) = scenarios.iter().map(Scenario::first_timeline_index).min() else {
        return Vec::new();
    };
    let last = TimelineIndex::try_from(series.len()).unwrap_or(TimelineIndex::MAX) - 1;

    let result_days: Vec<ResultsDay> = (first..=last)
        .filter_map(|index| {
            bounds_for_day(scenarios, index).map(|bounds| ResultsDay::new(series, index, &bounds))
        })
        .collect();
    debug!(
        "extracted {} result days from timeline index {first} to {last}",
        result_days.len()
    );
    result_days
}

/// The scenario-level metrics the global aggregates are built from, each bounded separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalBounds {
    pub growth_rate: Bounds<f64>,
    pub reff: Bounds<f64>,
    pub seroprevalence: Bounds<f64>,
    pub mortality: Bounds<i64>,
}

/// Selects the lower, baseline and upper scenarios by incidence on the most recent observed day,
/// then sorts each metric among those three on its own. The scenario with the highest incidence
/// need not have the highest R-eff, so the metrics are never read off a single scenario.
#[must_use]
pub fn extract_global_bounds(scenarios: &[Scenario]) -> Option<GlobalBounds> {
    let selected = select_bounds(scenarios.iter().collect(), |scenario| {
        scenario.days().last().map_or(0, |day| day.actual_dnc)
    })?;
    debug!(
        "global aggregates from scenarios {} / {} / {}",
        selected.lower.key(),
        selected.baseline.key(),
        selected.upper.key()
    );

    Some(GlobalBounds {
        growth_rate: sorted_bounds(selected.map(|s| s.current_growth_rate()), f64::total_cmp),
        reff: sorted_bounds(selected.map(|s| s.current_reff()), f64::total_cmp),
        seroprevalence: sorted_bounds(
            selected.map(|s| s.projected_seroprevalence()),
            f64::total_cmp,
        ),
        mortality: sorted_bounds(selected.map(|s| s.projected_mortality()), i64::cmp),
    })
}

/// Reorders the three values of a bound so `lower <= baseline <= upper`.
fn sorted_bounds<T: Copy>(bounds: Bounds<T>, compare: impl Fn(&T, &T) -> Ordering) -> Bounds<T> {
    let mut values = [bounds.lower, bounds.baseline, bounds.upper];
    values.sort_by(compare);
    Bounds {
        lower: values[0],
        baseline: values[1],
        upper: values[2],
    }
}
