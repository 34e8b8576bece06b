//! Diagnostic logging for a nowcast run. Logging is about the progress of a run and is separate
//! from _reporting_, which writes the reconstructed results to CSV files.
//!
//! The five `log` macros are re-exported from here. Logging is off until a level is set, either
//! from the command line (`-v`, `--log-level`) or programmatically:
//!
//! ```rust
//! use epi_nowcast::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Stage messages from the run...
//! set_log_level(LevelFilter::Info);
//! // ...and every phase of every scenario.
//! set_module_filter("epi_nowcast::scenario", LevelFilter::Trace);
//! ```
//!
//! A `--log-level` value is a comma separated list of `level` and `module=level` items, parsed
//! by [`LogSpec::parse`] and installed in one step by [`apply_log_spec`].
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(all(feature = "logging", feature = "progress_bar"))]
mod progress_bar_encoder;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::BTreeMap;
#[cfg(feature = "logging")]
use log4rs::Handle;
use std::sync::{LazyLock, Mutex, MutexGuard};

use crate::error::NowcastError;

/// Filters installed before anything else is configured. `sysinfo` logs every process refresh
/// made by the execution statistics collector.
const DEFAULT_MODULE_FILTERS: [(&str, LevelFilter); 1] = [("sysinfo", LevelFilter::Off)];

static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A parsed `--log-level` value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogSpec {
    pub global: Option<LevelFilter>,
    pub modules: Vec<(String, LevelFilter)>,
}

impl LogSpec {
    /// Parses a comma separated list of `level` and `module=level` items. A bare level sets the
    /// global level; the last one wins.
    ///
    /// # Errors
    ///
    /// `NowcastError::InvalidConfig` naming the item that is not a level.
    pub fn parse(spec: &str) -> Result<LogSpec, NowcastError> {
        let mut log_spec = LogSpec::default();
        for item in spec.split(',').map(str::trim).filter(|item| !item.is_empty()) {
            let (module, level) = match item.split_once('=') {
                Some((module, level)) => (Some(module.trim()), level.trim()),
                None => (None, item),
            };
            let level: LevelFilter = level.parse().map_err(|_| {
                NowcastError::InvalidConfig(format!("invalid log level `{level}` in `{item}`"))
            })?;
            match module {
                Some("") => {
                    return Err(NowcastError::InvalidConfig(format!(
                        "missing module name in `{item}`"
                    )));
                }
                Some(module) => log_spec.modules.push((module.to_string(), level)),
                None => log_spec.global = Some(level),
            }
        }
        Ok(log_spec)
    }
}

/// The global level, the per-module filters and the handle of the installed logger. There is
/// one instance, behind `LOG_CONFIGURATION`; the free functions below lock it and rebuild the
/// logger whenever something changed.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for targets without a module filter. `Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    /// Module path to level. Ordered so the rebuilt logger config is stable.
    pub(in crate::log) module_filters: BTreeMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: LevelFilter::Off,
            module_filters: DEFAULT_MODULE_FILTERS
                .iter()
                .map(|(module, level)| ((*module).to_string(), *level))
                .collect(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    /// Merges a spec into the configuration and reports whether anything changed. Modules not
    /// named in the spec keep their filters.
    fn merge(&mut self, spec: &LogSpec) -> bool {
        let mut changed = false;
        if let Some(level) = spec.global {
            changed |= self.global_log_level != level;
            self.global_log_level = level;
        }
        for (module, level) in &spec.modules {
            changed |= self.module_filters.insert(module.clone(), *level) != Some(*level);
        }
        changed
    }

    /// The level a record from `target` is filtered at: the filter of the longest module path
    /// that is `target` or one of its parents, else the global level.
    fn level_for(&self, target: &str) -> LevelFilter {
        self.module_filters
            .iter()
            .filter(|(module, _)| {
                target == module.as_str()
                    || target
                        .strip_prefix(module.as_str())
                        .is_some_and(|rest| rest.starts_with("::"))
            })
            .max_by_key(|(module, _)| module.len())
            .map_or(self.global_log_level, |(_, level)| *level)
    }

    /// Most verbose level anything can be logged at.
    #[cfg(any(test, not(feature = "logging")))]
    pub(in crate::log) fn max_level(&self) -> LevelFilter {
        self.module_filters
            .values()
            .copied()
            .fold(self.global_log_level, std::cmp::max)
    }
}

/// Turns on every log message. Same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Turns off logging for targets without a module filter.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. Module filters are kept.
pub fn set_log_level(level: LevelFilter) {
    apply_log_spec(&LogSpec {
        global: Some(level),
        modules: Vec::new(),
    });
}

/// Sets a level filter for a module path and everything below it.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    apply_log_spec(&LogSpec {
        global: None,
        modules: vec![(module_path.to_string(), level)],
    });
}

/// Drops the filter for a module path so the global level applies to it again.
pub fn remove_module_filter(module_path: &str) {
    let mut configuration = get_log_configuration();
    if configuration.module_filters.remove(module_path).is_some() {
        configuration.set_config();
    }
}

/// Installs a global level and any number of module filters with a single logger rebuild.
pub fn apply_log_spec(spec: &LogSpec) {
    let mut configuration = get_log_configuration();
    // The first call installs the logger even if nothing changed.
    if configuration.merge(spec) || !configuration.is_installed() {
        configuration.set_config();
    }
}

/// The level records from `target` currently pass at.
#[must_use]
pub fn module_level(target: &str) -> LevelFilter {
    get_log_configuration().level_for(target)
}

fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    // A panic while holding the lock leaves the configuration itself intact.
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
