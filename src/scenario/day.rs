use std::fmt::{self, Display};

use chrono::NaiveDate;
use serde_derive::Serialize;

use crate::parameters::ScenarioParameters;
use crate::timeseries::TimelineIndex;

/// Which surveillance signal backs a day's incidence estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum SourcedOn {
    /// Not yet classified; never present once a scenario has run.
    #[default]
    Unclassified,
    /// Run-up days before the feed starts, inferred from mortality alone.
    MortalityOnly,
    MortalityAndAdmissions,
    AdmissionsOnly,
    TestResults,
    /// Too recent for any lagged signal to have matured.
    ProjectedCases,
}

impl SourcedOn {
    /// Region of an observed day, given how many days separate it from the most recent one.
    #[must_use]
    pub fn classify(days_before_end: usize, parameters: &ScenarioParameters) -> Self {
        if days_before_end >= parameters.death_delay {
            SourcedOn::MortalityAndAdmissions
        } else if days_before_end >= parameters.admission_delay {
            SourcedOn::AdmissionsOnly
        } else if days_before_end >= parameters.test_report_delay {
            SourcedOn::TestResults
        } else {
            SourcedOn::ProjectedCases
        }
    }
}

impl Display for SourcedOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Derived values for one observed day of one scenario. Each field is written by exactly one
/// pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DayWithAggregates {
    pub timeline_index: usize,
    pub sourced_on: SourcedOn,
    pub admissions_with_churn: i64,
    /// Same inference on the long-window occupancy channel, used for calibration.
    pub admissions_with_churn_smooth: i64,
    /// Reconstructed true incidence.
    pub actual_dnc: i64,
    pub cases_per_admission: i64,
    /// Mean day-over-day incidence delta over a window of up to nine days.
    pub mean_delta: f64,
    pub growth_rate: f64,
    pub doubling_time: f64,
    pub reff: f64,
}

impl DayWithAggregates {
    #[must_use]
    pub fn new(timeline_index: usize) -> Self {
        Self {
            timeline_index,
            ..Self::default()
        }
    }
}

/// A day before the feed starts, with incidence projected back from mortality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunUpDay {
    pub timeline_index: TimelineIndex,
    pub date: NaiveDate,
    pub sourced_on: SourcedOn,
    pub actual_dnc: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> ScenarioParameters {
        ScenarioParameters {
            ifr: 0.01,
            test_report_delay: 5,
            admission_delay: 10,
            hospitalization_duration: 10,
            death_delay: 30,
            serial_interval: 4.5,
            transmissible_fraction: 0.6,
        }
    }

    #[test]
    fn classify_region_boundaries() {
        let parameters = parameters();
        assert_eq!(SourcedOn::classify(30, &parameters), SourcedOn::MortalityAndAdmissions);
        assert_eq!(SourcedOn::classify(29, &parameters), SourcedOn::AdmissionsOnly);
        assert_eq!(SourcedOn::classify(10, &parameters), SourcedOn::AdmissionsOnly);
        assert_eq!(SourcedOn::classify(9, &parameters), SourcedOn::TestResults);
        assert_eq!(SourcedOn::classify(5, &parameters), SourcedOn::TestResults);
        assert_eq!(SourcedOn::classify(4, &parameters), SourcedOn::ProjectedCases);
        assert_eq!(SourcedOn::classify(0, &parameters), SourcedOn::ProjectedCases);
    }

    #[test]
    fn display_uses_variant_name() {
        assert_eq!(SourcedOn::TestResults.to_string(), "TestResults");
    }
}
