//! Ensemble nowcasting of an epidemic from lagged surveillance signals
//!
//! Reported cases undercount true infections, and by a factor that drifts with testing
//! capacity. Deaths and hospital occupancy are more complete but lag infection by weeks. This
//! crate reconstructs a best-estimate daily incidence curve, growth rate and effective
//! reproduction number by chaining those signals together: mortality where it has matured,
//! hospital admissions after that, test positivity after that, and a short exponential
//! projection for the most recent days.
//!
//! Each link depends on parameters that are only known to a range (infection fatality ratio,
//! delays from infection to test, admission and death, hospital stay, serial interval). Rather
//! than fitting them, the reconstruction is run once per point of a parameter grid and the
//! ensemble is reduced per day to a lower, baseline and upper bound.
//!
//! The central object is the [`Context`], which walks a run through its stages:
//! * loading and validating the observation feed ([`timeseries`])
//! * enumerating the parameter grid ([`parameters`])
//! * running every [`scenario::Scenario`] through its eight-phase pipeline
//! * extracting per-day bounds ([`ensemble`]) and the global summary ([`aggregates`])
//! * writing both as CSV reports ([`report`])
//!
//! The `epi-nowcast` binary wraps this in a command line interface ([`runner`]).
pub mod aggregates;
pub mod config;
pub mod context;
pub mod ensemble;
pub mod error;
pub mod execution_stats;
pub mod growth;
pub mod log;
pub mod macros;
pub mod numeric;
pub mod parameters;
#[cfg(feature = "progress_bar")]
pub mod progress;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod timeseries;

pub use aggregates::Aggregates;
pub use config::ModelConfig;
pub use context::Context;
pub use ensemble::{Bounds, ResultsDay};
pub use error::{FeedError, FeedErrorKind, NowcastError};
pub use parameters::{ParameterGrid, ScenarioParameters};
pub use report::{Report, ReportOptions};
pub use runner::{run_with_args, BaseArgs};
pub use scenario::{Scenario, SourcedOn};
pub use timeseries::TimeSeries;
