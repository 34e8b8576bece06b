//! A console progress bar counting completed scenarios.
//!
//! Only one progress bar is active at a time. It is initialized with the number of scenarios
//! before the ensemble runs, incremented as each scenario finishes (from any worker thread), and
//! finalized once the last one completes.
//!
//! ```ignore
//! init_scenario_progress_bar(scenarios.len());
//! for parameters in scenarios {
//!     Scenario::run(key, parameters, &series, population);
//!     increment_scenario_progress();
//! }
//! finalize_scenario_progress();
//! ```

use log::trace;
use progress_bar::{
    finalize_progress_bar, inc_progress_bar, init_progress_bar, set_progress_bar_action, Color,
    Style,
};

/// Initializes the progress bar with the number of scenarios to run.
pub fn init_scenario_progress_bar(scenario_count: usize) {
    trace!("initializing scenario progress bar with {scenario_count} scenarios");
    init_progress_bar(scenario_count);
    set_progress_bar_action("Scenarios", Color::Blue, Style::Bold);
}

/// Records one completed scenario.
pub fn increment_scenario_progress() {
    inc_progress_bar();
}

/// Closes the progress bar once every scenario has completed.
pub fn finalize_scenario_progress() {
    finalize_progress_bar();
}
