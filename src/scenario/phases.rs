//! The eight pipeline phases, in the order `Scenario::run` calls them.

use log::trace;

use super::{DayWithAggregates, RunUpDay, Scenario, SourcedOn};
use crate::growth::{doubling_time, effective_reproduction, growth_rate};
use crate::numeric::{checked_ratio, mean, round_count, round_places};
use crate::timeseries::{ObservedDay, TimeSeries, TimelineIndex};

/// Cases per admission never drops below this.
pub const MIN_CASES_PER_ADMISSION: i64 = 5;

/// Half-width of the window for the mean day-over-day incidence delta.
const DELTA_WINDOW_RADIUS: usize = 4;

/// Days averaged on each side of a handover or snapshot.
const HANDOVER_WINDOW: usize = 3;

impl Scenario {
    /// Phase 1. Admissions are the change in smoothed occupancy plus churn, the estimated
    /// discharges. Before one hospitalization duration has elapsed, prior occupancy is assumed
    /// flat and churn is `h / m`. Afterwards churn is the discrete form of
    /// `(1 / m) ∫ (h / m) dt` over the trailing duration window.
    pub(super) fn compute_admissions_with_churn(&mut self, series: &TimeSeries) {
        let duration = self.parameters.hospitalization_duration;
        let days = series.days();
        let short = |day: &ObservedDay| day.rolling.occupancy;
        let long = |day: &ObservedDay| day.rolling.long_occupancy;

        self.days = (0..days.len())
            .map(|index| {
                let mut day = DayWithAggregates::new(index);
                if index > 0 {
                    day.admissions_with_churn = admissions_on(days, index, duration, short);
                    day.admissions_with_churn_smooth = admissions_on(days, index, duration, long);
                }
                day
            })
            .collect();

        // Day 0 has no delta and is back-filled.
        if self.days.len() > 1 {
            self.days[0].admissions_with_churn = self.days[1].admissions_with_churn;
            self.days[0].admissions_with_churn_smooth = self.days[1].admissions_with_churn_smooth;
        }
        trace!("scenario {}: admissions with churn computed", self.key);
    }

    /// Phase 2. Incidence for the `death_delay` days before the feed, from the mortality that
    /// many days later.
    pub(super) fn compute_run_up_days(&mut self, series: &TimeSeries) {
        let death_delay = self.parameters.death_delay;
        let ifr = self.parameters.ifr;
        self.run_up_days = series
            .days()
            .iter()
            .take(death_delay)
            .map(|observed| {
                let timeline_index = to_timeline(observed.timeline_index) - to_timeline(death_delay);
                RunUpDay {
                    timeline_index,
                    date: series.date_of(timeline_index),
                    sourced_on: SourcedOn::MortalityOnly,
                    actual_dnc: round_count(observed.rolling.deaths / ifr),
                }
            })
            .collect();
        trace!(
            "scenario {}: {} run-up days",
            self.key,
            self.run_up_days.len()
        );
    }

    /// Phase 3. Tags every observed day with the signal that backs it, counting back from the
    /// most recent day.
    pub(super) fn classify_regions(&mut self) {
        let last = self.days.len().saturating_sub(1);
        for day in &mut self.days {
            day.sourced_on = SourcedOn::classify(last - day.timeline_index, &self.parameters);
        }
    }

    /// Phase 4. Re-anchors cases per admission to mortality and IFR wherever mortality has
    /// matured, using the long-window channels. The last calibrated value is carried into the
    /// admissions-only region.
    pub(super) fn autocalibrate_cases_per_admission(&mut self, series: &TimeSeries) {
        let death_delay = self.parameters.death_delay;
        let admission_delay = self.parameters.admission_delay;
        let ifr = self.parameters.ifr;
        let observed = series.days();

        for index in 0..self.days.len() {
            let mut ratio = 0;
            if self.days[index].sourced_on == SourcedOn::MortalityAndAdmissions {
                let admissions = self.days[index + admission_delay].admissions_with_churn_smooth;
                if admissions > 0 {
                    #[allow(clippy::cast_precision_loss)]
                    let denominator = ifr * admissions as f64;
                    ratio = round_count(observed[index + death_delay].rolling.long_deaths / denominator);
                } else {
                    trace!(
                        "scenario {}: no smoothed admissions on day {}, ratio floored",
                        self.key,
                        index + admission_delay
                    );
                }
            }
            self.days[index].cases_per_admission = ratio.max(MIN_CASES_PER_ADMISSION);
        }

        let carried = self
            .days
            .iter()
            .rev()
            .find(|day| day.sourced_on == SourcedOn::MortalityAndAdmissions)
            .map_or(MIN_CASES_PER_ADMISSION, |day| day.cases_per_admission);
        for day in &mut self.days {
            if day.sourced_on == SourcedOn::AdmissionsOnly {
                day.cases_per_admission = carried;
            }
        }
        trace!("scenario {}: cases per admission carried forward: {carried}", self.key);
    }

    /// Phase 5. Incidence for every region except the projected one.
    pub(super) fn reconstruct_incidence(&mut self, series: &TimeSeries) {
        let death_delay = self.parameters.death_delay;
        let admission_delay = self.parameters.admission_delay;
        let ifr = self.parameters.ifr;
        let observed = series.days();
        let mut handover: Option<TestHandover> = None;

        for index in 0..self.days.len() {
            let cases_per_admission = self.days[index].cases_per_admission;
            let actual_dnc = match self.days[index].sourced_on {
                SourcedOn::MortalityAndAdmissions => {
                    let by_mortality = observed[index + death_delay].rolling.deaths / ifr;
                    #[allow(clippy::cast_precision_loss)]
                    let by_admissions = (self.days[index + admission_delay].admissions_with_churn
                        * cases_per_admission) as f64;
                    round_count((by_mortality + by_admissions) / 2.0)
                }
                SourcedOn::AdmissionsOnly => {
                    self.days[index + admission_delay].admissions_with_churn * cases_per_admission
                }
                SourcedOn::TestResults => {
                    let handover = handover
                        .get_or_insert_with(|| TestHandover::new(&self.days, observed, index, self.key));
                    handover.incidence(&observed[index], self.key)
                }
                SourcedOn::ProjectedCases | SourcedOn::MortalityOnly | SourcedOn::Unclassified => {
                    continue
                }
            };
            self.days[index].actual_dnc = actual_dnc;
        }
    }

    /// Phase 6. Growth rate, doubling time and R-eff from a window of up to nine days, clamped
    /// to the non-projected days.
    pub(super) fn compute_local_growth(&mut self) {
        let settled = self.settled_days();
        let serial_interval = self.parameters.serial_interval;
        let transmissible_fraction = self.parameters.transmissible_fraction;

        for index in 0..settled {
            let first = index.saturating_sub(DELTA_WINDOW_RADIUS);
            let last = (index + DELTA_WINDOW_RADIUS).min(settled - 1);
            #[allow(clippy::cast_precision_loss)]
            let mean_delta = mean(
                self.days[first..=last]
                    .windows(2)
                    .map(|pair| (pair[1].actual_dnc - pair[0].actual_dnc) as f64),
            )
            .unwrap_or(0.0);

            let day = &mut self.days[index];
            day.mean_delta = mean_delta;
            day.growth_rate = growth_rate(mean_delta, day.actual_dnc);
            day.doubling_time = doubling_time(day.growth_rate);
            day.reff = effective_reproduction(day.growth_rate, serial_interval, transmissible_fraction);
        }
    }

    /// Phase 7. Snapshots growth and R-eff from the latest settled days, then extends incidence
    /// into the projected region by exponential growth from the last test-results day.
    pub(super) fn project_recent_days(&mut self) {
        let settled = self.settled_days();
        if settled == 0 {
            return;
        }
        let recent = &self.days[settled.saturating_sub(HANDOVER_WINDOW)..settled];
        self.current_growth_rate = mean(recent.iter().map(|day| day.growth_rate)).unwrap_or(0.0);
        self.current_reff = round_places(mean(recent.iter().map(|day| day.reff)).unwrap_or(0.0), 2);

        #[allow(clippy::cast_precision_loss)]
        let anchor = self
            .days
            .iter()
            .rev()
            .find(|day| day.sourced_on == SourcedOn::TestResults)
            .unwrap_or(&self.days[settled - 1])
            .actual_dnc as f64;

        let growth = self.current_growth_rate;
        let reff = self.current_reff;
        for (offset, day) in self.days[settled..].iter_mut().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let steps = (offset + 1) as f64;
            day.reff = reff;
            day.actual_dnc = round_count(anchor * (growth * steps).exp());
        }
    }

    /// Phase 8. Cumulative seroprevalence over the whole timeline, and projected mortality.
    /// Incidence in the mortality-backed region already shows up in observed deaths, so only
    /// the later regions add projected deaths.
    pub(super) fn compute_linear_aggregates(&mut self, series: &TimeSeries, population: u64) {
        let total_cases: i64 = self.run_up_days.iter().map(|day| day.actual_dnc).sum::<i64>()
            + self.days.iter().map(|day| day.actual_dnc).sum::<i64>();
        #[allow(clippy::cast_precision_loss)]
        let seroprevalence = 100.0 * (total_cases as f64 / population as f64);
        self.projected_seroprevalence = round_places(seroprevalence, 1);

        let recent_cases: i64 = self
            .days
            .iter()
            .filter(|day| {
                matches!(
                    day.sourced_on,
                    SourcedOn::AdmissionsOnly | SourcedOn::TestResults | SourcedOn::ProjectedCases
                )
            })
            .map(|day| day.actual_dnc)
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let pending_deaths = round_count(recent_cases as f64 * self.parameters.ifr);
        let observed_deaths = i64::try_from(series.total_deaths()).unwrap_or(i64::MAX);
        self.projected_mortality = observed_deaths.saturating_add(pending_deaths);
    }

    /// Count of days before the projected region. Regions are contiguous, so these are a prefix.
    fn settled_days(&self) -> usize {
        self.days
            .iter()
            .take_while(|day| day.sourced_on != SourcedOn::ProjectedCases)
            .count()
    }
}

fn to_timeline(index: usize) -> TimelineIndex {
    TimelineIndex::try_from(index).unwrap_or(TimelineIndex::MAX)
}

fn admissions_on(
    days: &[ObservedDay],
    index: usize,
    duration: usize,
    occupancy: impl Fn(&ObservedDay) -> f64,
) -> i64 {
    let delta = round_count(occupancy(&days[index]) - occupancy(&days[index - 1]));
    #[allow(clippy::cast_precision_loss)]
    let churn = if index < duration {
        round_count(occupancy(&days[index]) / duration as f64)
    } else {
        let integral: f64 = days[index - duration..=index].iter().map(&occupancy).sum();
        round_count(integral / (duration * duration) as f64)
    };
    (delta + churn).max(0)
}

/// Reference values snapshotted on the first test-results day. Later incidence scales reported
/// cases by the drift in positivity and test volume since then.
struct TestHandover {
    scale: f64,
    positivity: f64,
    tests: f64,
}

impl TestHandover {
    fn new(
        days: &[DayWithAggregates],
        observed: &[ObservedDay],
        index: usize,
        key: super::ScenarioKey,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let reconstructed = mean(
            days[index.saturating_sub(HANDOVER_WINDOW)..index]
                .iter()
                .map(|day| day.actual_dnc as f64),
        )
        .unwrap_or(0.0);
        let last = (index + HANDOVER_WINDOW - 1).min(observed.len() - 1);
        let reported = mean(observed[index..=last].iter().map(|day| day.rolling.dnc)).unwrap_or(0.0);

        let scale = checked_ratio(reconstructed, reported).unwrap_or_else(|| {
            trace!("scenario {key}: no reported cases at test handover, scale set to 0");
            0.0
        });
        trace!("scenario {key}: test handover on day {index} with scale {scale:.3}");
        TestHandover {
            scale,
            positivity: observed[index].rolling.positivity,
            tests: observed[index].rolling.tests,
        }
    }

    fn incidence(&self, day: &ObservedDay, key: super::ScenarioKey) -> i64 {
        let positivity_ratio = checked_ratio(day.rolling.positivity, self.positivity);
        let volume_ratio = checked_ratio(self.tests, day.rolling.tests);
        match (positivity_ratio, volume_ratio) {
            (Some(positivity_ratio), Some(volume_ratio)) => {
                round_count(positivity_ratio * volume_ratio * self.scale * day.rolling.dnc)
            }
            _ => {
                trace!(
                    "scenario {key}: zero positivity or test volume on day {}, incidence set to 0",
                    day.timeline_index
                );
                0
            }
        }
    }
}
