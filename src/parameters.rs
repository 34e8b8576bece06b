//! The scenario parameter space: a grid of candidate values per epidemiological parameter, and
//! its enumeration into the ordered tuples that make up the ensemble.

use serde_derive::{Deserialize, Serialize};

/// One ensemble member's parameter set. Delays and durations are in days.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    /// Infection fatality ratio.
    pub ifr: f64,
    pub test_report_delay: usize,
    pub admission_delay: usize,
    pub hospitalization_duration: usize,
    pub death_delay: usize,
    pub serial_interval: f64,
    /// Share of the serial interval during which a case is infectious.
    pub transmissible_fraction: f64,
}

impl ScenarioParameters {
    /// Death must lag admission, which must lag the test report. Without these gaps the
    /// signal regions collapse into each other.
    #[must_use]
    pub fn is_physically_ordered(&self) -> bool {
        self.death_delay > self.admission_delay && self.admission_delay > self.test_report_delay
    }
}

/// Candidate values for each of the seven parameter dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterGrid {
    pub ifr: Vec<f64>,
    pub test_report_delay: Vec<usize>,
    pub admission_delay: Vec<usize>,
    pub hospitalization_duration: Vec<usize>,
    pub death_delay: Vec<usize>,
    pub serial_interval: Vec<f64>,
    pub transmissible_fraction: Vec<f64>,
}

impl Default for ParameterGrid {
    /// Ranges from a manual review of the COVID-19 literature.
    fn default() -> Self {
        Self {
            ifr: vec![0.006, 0.008, 0.01],
            test_report_delay: vec![4, 5, 7],
            admission_delay: vec![7, 10, 14],
            hospitalization_duration: vec![7, 10, 14],
            death_delay: vec![26, 30, 34],
            serial_interval: vec![3.5, 4.5, 7.0],
            transmissible_fraction: vec![0.8, 0.6, 0.5],
        }
    }
}

impl ParameterGrid {
    /// Every physically ordered tuple of the Cartesian product. The enumeration order is fixed
    /// (IFR outermost, then admission delay, duration, death delay, test delay, serial interval,
    /// transmissible fraction) so scenario keys are stable between runs.
    #[must_use]
    pub fn enumerate(&self) -> Vec<ScenarioParameters> {
        let mut scenarios = Vec::new();
        for &ifr in &self.ifr {
            for &admission_delay in &self.admission_delay {
                for &hospitalization_duration in &self.hospitalization_duration {
                    for &death_delay in &self.death_delay {
                        for &test_report_delay in &self.test_report_delay {
                            for &serial_interval in &self.serial_interval {
                                for &transmissible_fraction in &self.transmissible_fraction {
                                    let parameters = ScenarioParameters {
                                        ifr,
                                        test_report_delay,
                                        admission_delay,
                                        hospitalization_duration,
                                        death_delay,
                                        serial_interval,
                                        transmissible_fraction,
                                    };
                                    if parameters.is_physically_ordered() {
                                        scenarios.push(parameters);
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        scenarios
    }

    /// Size of the unfiltered Cartesian product.
    #[must_use]
    pub fn cartesian_size(&self) -> usize {
        self.ifr.len()
            * self.test_report_delay.len()
            * self.admission_delay.len()
            * self.hospitalization_duration.len()
            * self.death_delay.len()
            * self.serial_interval.len()
            * self.transmissible_fraction.len()
    }

    /// The longest delay to death in the grid; the feed must be strictly longer than this.
    #[must_use]
    pub fn max_death_delay(&self) -> usize {
        self.death_delay.iter().copied().max().unwrap_or(0)
    }

    /// Checks the grid can be run at all.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first offending dimension.
    pub fn validate(&self) -> Result<(), String> {
        let dimensions = [
            ("ifr", self.ifr.len()),
            ("test_report_delay", self.test_report_delay.len()),
            ("admission_delay", self.admission_delay.len()),
            ("hospitalization_duration", self.hospitalization_duration.len()),
            ("death_delay", self.death_delay.len()),
            ("serial_interval", self.serial_interval.len()),
            ("transmissible_fraction", self.transmissible_fraction.len()),
        ];
        if let Some((name, _)) = dimensions.iter().find(|(_, len)| *len == 0) {
            return Err(format!("grid dimension `{name}` has no values"));
        }
        if let Some(ifr) = self.ifr.iter().find(|ifr| !(**ifr > 0.0 && **ifr <= 1.0)) {
            return Err(format!("ifr must be within (0, 1], found {ifr}"));
        }
        if self.hospitalization_duration.contains(&0) {
            return Err("hospitalization_duration must be positive".to_string());
        }
        if let Some(si) = self.serial_interval.iter().find(|si| !(**si > 0.0)) {
            return Err(format!("serial_interval must be positive, found {si}"));
        }
        if let Some(fraction) = self
            .transmissible_fraction
            .iter()
            .find(|fraction| !(0.0..=1.0).contains(*fraction))
        {
            return Err(format!(
                "transmissible_fraction must be within [0, 1], found {fraction}"
            ));
        }
        if self.enumerate().is_empty() {
            return Err(
                "no parameter tuple satisfies death_delay > admission_delay > test_report_delay"
                    .to_string(),
            );
        }
        Ok(())
    }
}
