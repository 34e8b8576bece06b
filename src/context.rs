//! A `Context` carries one nowcast run from the observation feed to the written reports.
//!
//! The stages must be called in order, each exactly once:
//!
//! 1. `load` (or `load_series`) validates the feed against the parameter grid
//! 2. `generate_scenarios` enumerates the grid
//! 3. `run_scenarios` runs every scenario's pipeline, in parallel with the `parallel` feature
//! 4. `extract_result_days` reduces the ensemble day by day
//! 5. `extract_aggregates` reduces the most recent day into the global summary
//! 6. `write_reports` writes both reports
//!
//! `execute` runs stages 2 to 6 once a feed is loaded. Calling a stage out of order is an
//! error rather than a panic.

use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::aggregates::Aggregates;
use crate::config::ModelConfig;
use crate::ensemble::{extract_global_bounds, extract_result_days, ResultsDay};
use crate::error::NowcastError;
use crate::execution_stats::{
    log_execution_statistics, print_execution_statistics, ExecutionProfilingCollector,
    ExecutionStatistics,
};
#[cfg(not(feature = "parallel"))]
use crate::log::warn;
use crate::log::{debug, info};
use crate::parameters::ScenarioParameters;
#[cfg(feature = "progress_bar")]
use crate::progress::{
    finalize_scenario_progress, increment_scenario_progress, init_scenario_progress_bar,
};
use crate::report::ReportOptions;
use crate::scenario::Scenario;
use crate::timeseries::TimeSeries;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Created,
    Loaded,
    Generated,
    Ran,
    DaysExtracted,
    AggregatesExtracted,
    Written,
}

pub struct Context {
    config: ModelConfig,
    report_options: ReportOptions,
    threads: usize,
    show_progress: bool,
    stage: Stage,
    series: Option<TimeSeries>,
    parameters: Vec<ScenarioParameters>,
    scenarios: Vec<Scenario>,
    result_days: Vec<ResultsDay>,
    aggregates: Option<Aggregates>,
    execution_profiler: ExecutionProfilingCollector,
}

impl Context {
    /// Create a new empty `Context` with the given model configuration.
    #[must_use]
    pub fn new(config: ModelConfig) -> Context {
        Context {
            config,
            report_options: ReportOptions::new(),
            threads: 0,
            show_progress: false,
            stage: Stage::Created,
            series: None,
            parameters: Vec::new(),
            scenarios: Vec::new(),
            result_days: Vec::new(),
            aggregates: None,
            execution_profiler: ExecutionProfilingCollector::new(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Mutable access to the report options, for chained configuration.
    pub fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.report_options
    }

    /// Worker threads for `run_scenarios`. 0 uses every core. Ignored without the `parallel`
    /// feature.
    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads;
    }

    /// Whether `run_scenarios` draws a progress bar. Ignored without the `progress_bar` feature.
    pub fn set_show_progress(&mut self, show_progress: bool) {
        self.show_progress = show_progress;
    }

    fn require(&self, stage: Stage, operation: &str) -> Result<(), NowcastError> {
        if self.stage != stage {
            return Err(NowcastError::NowcastError(format!(
                "{operation} called out of order: expected stage {stage:?}, found {:?}",
                self.stage
            )));
        }
        Ok(())
    }

    fn advance(&mut self, stage: Stage) {
        debug!("stage {:?} -> {stage:?}", self.stage);
        self.stage = stage;
    }

    /// Reads and validates the observation feed.
    ///
    /// # Errors
    ///
    /// `NowcastError::InvalidInput` if a row breaks a feed rule or the feed is too short for
    /// the grid, `NowcastError::IoError` / `NowcastError::CsvError` if it cannot be read.
    pub fn load(&mut self, path: &Path) -> Result<(), NowcastError> {
        info!("Loading observation feed from: {}", path.display());
        let series = TimeSeries::from_path(path)?;
        self.load_series(series)
    }

    /// Takes an already-built series, checking it against the grid's longest delay to death.
    ///
    /// # Errors
    ///
    /// `NowcastError::InvalidInput` with `InsufficientHistory` if the series is too short.
    pub fn load_series(&mut self, series: TimeSeries) -> Result<(), NowcastError> {
        self.require(Stage::Created, "load")?;
        series.check_minimum_length(self.config.grid.max_death_delay())?;
        info!(
            "{} observed days from {} ({} deaths)",
            series.len(),
            series.first_date(),
            series.total_deaths()
        );
        self.series = Some(series);
        self.advance(Stage::Loaded);
        Ok(())
    }

    /// Enumerates the parameter grid. Returns the number of scenarios.
    ///
    /// # Errors
    ///
    /// `NowcastError::NowcastError` if called out of order or if no grid tuple is physically
    /// ordered.
    pub fn generate_scenarios(&mut self) -> Result<usize, NowcastError> {
        self.require(Stage::Loaded, "generate_scenarios")?;
        self.parameters = self.config.grid.enumerate();
        info!(
            "{} of {} parameter tuples kept",
            self.parameters.len(),
            self.config.grid.cartesian_size()
        );
        if self.parameters.is_empty() {
            return Err(NowcastError::NowcastError(
                "no physically ordered scenario in the parameter grid".to_string(),
            ));
        }
        self.advance(Stage::Generated);
        Ok(self.parameters.len())
    }

    /// Runs every scenario to completion. Results are kept in grid enumeration order whether
    /// or not they ran in parallel.
    ///
    /// # Errors
    ///
    /// `NowcastError::NowcastError` if called out of order or if the worker pool cannot be
    /// built.
    pub fn run_scenarios(&mut self) -> Result<(), NowcastError> {
        self.require(Stage::Generated, "run_scenarios")?;
        let Some(series) = self.series.as_ref() else {
            return Err(NowcastError::NowcastError("no series loaded".to_string()));
        };
        let population = self.config.population;
        let show_progress = self.show_progress;
        info!("Running {} scenarios", self.parameters.len());

        #[cfg(feature = "progress_bar")]
        if show_progress {
            init_scenario_progress_bar(self.parameters.len());
        }

        let run_one = |(key, parameters): (usize, &ScenarioParameters)| {
            let scenario = Scenario::run(key, *parameters, series, population);
            #[cfg(feature = "progress_bar")]
            if show_progress {
                increment_scenario_progress();
            }
            scenario
        };

        #[cfg(feature = "parallel")]
        let scenarios: Vec<Scenario> = {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.threads)
                .build()
                .map_err(|e| NowcastError::NowcastError(format!("worker pool: {e}")))?;
            debug!("running on {} worker threads", pool.current_num_threads());
            pool.install(|| self.parameters.par_iter().enumerate().map(run_one).collect())
        };

        #[cfg(not(feature = "parallel"))]
        let scenarios: Vec<Scenario> = {
            if self.threads > 1 {
                warn!("built without the `parallel` feature, running scenarios sequentially");
            }
            self.parameters.iter().enumerate().map(run_one).collect()
        };

        #[cfg(feature = "progress_bar")]
        if show_progress {
            finalize_scenario_progress();
        }

        self.execution_profiler.refresh();
        self.scenarios = scenarios;
        self.advance(Stage::Ran);
        Ok(())
    }

    /// Reduces the ensemble into one `ResultsDay` per timeline day.
    ///
    /// # Errors
    ///
    /// `NowcastError::NowcastError` if called out of order.
    pub fn extract_result_days(&mut self) -> Result<&[ResultsDay], NowcastError> {
        self.require(Stage::Ran, "extract_result_days")?;
        let Some(series) = self.series.as_ref() else {
            return Err(NowcastError::NowcastError("no series loaded".to_string()));
        };
        self.result_days = extract_result_days(series, &self.scenarios);
        self.advance(Stage::DaysExtracted);
        Ok(&self.result_days)
    }

    /// Reduces the most recent day into the global aggregates.
    ///
    /// # Errors
    ///
    /// `NowcastError::NowcastError` if called out of order.
    pub fn extract_aggregates(&mut self) -> Result<&Aggregates, NowcastError> {
        self.require(Stage::DaysExtracted, "extract_aggregates")?;
        let bounds = extract_global_bounds(&self.scenarios)
            .ok_or_else(|| NowcastError::NowcastError("no scenarios to aggregate".to_string()))?;
        self.advance(Stage::AggregatesExtracted);
        Ok(self.aggregates.insert(Aggregates::from_bounds(&bounds)))
    }

    /// Writes both reports. If either file exists and overwrite is off, nothing is written.
    ///
    /// # Errors
    ///
    /// `NowcastError::ReportError` for an existing file, `NowcastError::IoError` /
    /// `NowcastError::CsvError` if writing fails.
    pub fn write_reports(&mut self) -> Result<Vec<PathBuf>, NowcastError> {
        self.require(Stage::AggregatesExtracted, "write_reports")?;
        let Some(aggregates) = self.aggregates.as_ref() else {
            return Err(NowcastError::NowcastError("no aggregates extracted".to_string()));
        };
        self.report_options.check_writable::<ResultsDay>()?;
        self.report_options.check_writable::<Aggregates>()?;
        let paths = vec![
            self.report_options.write_report(&self.result_days)?,
            self.report_options
                .write_report(std::slice::from_ref(aggregates))?,
        ];
        self.advance(Stage::Written);
        Ok(paths)
    }

    /// Runs every stage after `load`.
    ///
    /// # Errors
    ///
    /// The first error any stage returns.
    pub fn execute(&mut self) -> Result<Vec<PathBuf>, NowcastError> {
        self.generate_scenarios()?;
        self.run_scenarios()?;
        self.extract_result_days()?;
        self.extract_aggregates()?;
        let paths = self.write_reports()?;
        info!("Run complete");
        Ok(paths)
    }

    #[must_use]
    pub fn series(&self) -> Option<&TimeSeries> {
        self.series.as_ref()
    }

    /// Grid tuples in enumeration order. A scenario's key is its position here.
    #[must_use]
    pub fn scenario_parameters(&self) -> &[ScenarioParameters] {
        &self.parameters
    }

    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    #[must_use]
    pub fn result_days(&self) -> &[ResultsDay] {
        &self.result_days
    }

    #[must_use]
    pub fn aggregates(&self) -> Option<&Aggregates> {
        self.aggregates.as_ref()
    }

    pub fn get_execution_statistics(&mut self) -> ExecutionStatistics {
        self.execution_profiler
            .compute_final_statistics(self.scenarios.len())
    }

    /// Prints the execution statistics to the console and to the log.
    pub fn print_execution_statistics(&mut self) {
        let stats = self.get_execution_statistics();
        print_execution_statistics(&stats);
        log_execution_statistics(&stats);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}
