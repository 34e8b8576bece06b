// Loss of precision is allowable in this module's use cases.
#![allow(clippy::cast_precision_loss)]

use std::time::{Duration, Instant};

use bytesize::ByteSize;
use humantime::format_duration;
use log::{debug, error, info};
use serde_derive::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// How frequently we update the max memory used value.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Final statistics for one run. If no scenarios ran, the per-scenario figures are zero.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionStatistics {
    pub max_memory_usage: u64,
    pub cpu_time: Duration,
    pub wall_time: Duration,

    // Per scenario stats
    pub scenario_count: usize,
    pub cpu_time_per_scenario: Duration,
    pub wall_time_per_scenario: Duration,
}

pub(crate) struct ExecutionProfilingCollector {
    /// Used to compute elapsed wall time for the run
    start_time: Instant,
    /// Client code can call `refresh` as often as it likes; polling is throttled against this.
    last_refresh: Instant,
    /// Accumulated CPU time of the process in CPU-milliseconds when the collector was created
    start_cpu_time: u64,
    /// The maximum amount of real memory used by the process as reported by
    /// `sysinfo::System::process::memory()`, polled during execution.
    max_memory_usage: u64,
    system: System,
    /// `None` on platforms where the current process cannot be inspected
    process_id: Option<Pid>,
}

impl ExecutionProfilingCollector {
    pub fn new() -> ExecutionProfilingCollector {
        let process_id = sysinfo::get_current_pid().ok();
        let now = Instant::now();

        let mut collector = ExecutionProfilingCollector {
            start_time: now,
            last_refresh: now,
            start_cpu_time: 0,
            max_memory_usage: 0,
            system: System::new(),
            process_id,
        };
        if let Some(process_id) = process_id {
            debug!("Process ID: {}", process_id);
            collector.update_system_info(ProcessRefreshKind::nothing().with_cpu().with_memory());
            if let Some(process) = collector.system.process(process_id) {
                collector.max_memory_usage = process.memory();
                collector.start_cpu_time = process.accumulated_cpu_time();
            }
        }

        collector
    }

    /// Polls memory usage if at least `REFRESH_INTERVAL` has passed since the previous poll.
    #[inline]
    pub fn refresh(&mut self) {
        if self.last_refresh.elapsed() >= REFRESH_INTERVAL {
            self.poll_memory();
            self.last_refresh = Instant::now();
        }
    }

    /// Updates maximum memory usage. A relatively expensive system call.
    fn poll_memory(&mut self) {
        if let Some(pid) = self.process_id {
            self.update_system_info(ProcessRefreshKind::nothing().with_memory());
            if let Some(process) = self.system.process(pid) {
                self.max_memory_usage = self.max_memory_usage.max(process.memory());
            }
        }
    }

    #[inline]
    fn update_system_info(&mut self, process_refresh_kind: ProcessRefreshKind) {
        if let Some(pid) = self.process_id {
            if self.system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                process_refresh_kind,
            ) < 1
            {
                error!("could not refresh process statistics");
            }
        }
    }

    /// Computes the final summary statistics
    pub fn compute_final_statistics(&mut self, scenario_count: usize) -> ExecutionStatistics {
        let mut cpu_time_millis = 0;

        if let Some(pid) = self.process_id {
            self.update_system_info(ProcessRefreshKind::nothing().with_cpu().with_memory());
            if let Some(process) = self.system.process(pid) {
                self.max_memory_usage = self.max_memory_usage.max(process.memory());
                cpu_time_millis = process
                    .accumulated_cpu_time()
                    .saturating_sub(self.start_cpu_time);
            }
        }

        let cpu_time = Duration::from_millis(cpu_time_millis);
        let wall_time = self.start_time.elapsed();

        let (cpu_time_per_scenario, wall_time_per_scenario) = if scenario_count > 0 {
            (
                Duration::from_secs_f64(cpu_time_millis as f64 / scenario_count as f64 / 1000.0),
                Duration::from_secs_f64(wall_time.as_secs_f64() / scenario_count as f64),
            )
        } else {
            (Duration::ZERO, Duration::ZERO)
        };

        ExecutionStatistics {
            max_memory_usage: self.max_memory_usage,
            cpu_time,
            wall_time,
            scenario_count,
            cpu_time_per_scenario,
            wall_time_per_scenario,
        }
    }
}

/// Prints execution statistics to the console.
pub fn print_execution_statistics(summary: &ExecutionStatistics) {
    println!("━━━━ Execution Summary ━━━━");
    if summary.max_memory_usage == 0 {
        println!("Memory and CPU statistics are not available on your platform.");
    } else {
        println!(
            "{:<25}{}",
            "Max memory usage:",
            ByteSize::b(summary.max_memory_usage)
        );
        println!("{:<25}{}", "CPU time:", format_duration(summary.cpu_time));
    }

    println!("{:<25}{}", "Wall time:", format_duration(summary.wall_time));

    if summary.scenario_count > 0 {
        println!("{:<25}{}", "Scenarios:", summary.scenario_count);
        if summary.max_memory_usage > 0 {
            println!(
                "{:<25}{}",
                "CPU time per scenario:",
                format_duration(summary.cpu_time_per_scenario)
            );
        }
        println!(
            "{:<25}{}",
            "Wall time per scenario:",
            format_duration(summary.wall_time_per_scenario)
        );
    }
}

/// Logs execution statistics with the logging system.
pub fn log_execution_statistics(stats: &ExecutionStatistics) {
    info!("Execution complete.");
    if stats.max_memory_usage == 0 {
        info!("Memory and CPU statistics are not available on your platform.");
    } else {
        info!("Max memory usage: {}", ByteSize::b(stats.max_memory_usage));
        info!("CPU time: {}", format_duration(stats.cpu_time));
    }
    info!("Wall time: {}", format_duration(stats.wall_time));

    if stats.scenario_count > 0 {
        info!("Scenarios: {}", stats.scenario_count);
        info!(
            "Wall time per scenario: {}",
            format_duration(stats.wall_time_per_scenario)
        );
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn collector_initialization() {
        let collector = ExecutionProfilingCollector::new();
        assert!(collector.max_memory_usage > 0);
    }

    #[test]
    fn refresh_respects_interval() {
        let mut collector = ExecutionProfilingCollector::new();
        let before = collector.max_memory_usage;

        // Immediately after creation, refresh does not poll
        collector.refresh();
        assert_eq!(before, collector.max_memory_usage);

        thread::sleep(Duration::from_millis(1100));
        collector.refresh();
        assert!(collector.max_memory_usage >= before);
    }

    #[test]
    fn final_statistics_per_scenario() {
        let mut collector = ExecutionProfilingCollector::new();
        thread::sleep(Duration::from_millis(50));
        let stats = collector.compute_final_statistics(10);

        assert!(stats.wall_time >= Duration::from_millis(50));
        assert_eq!(stats.scenario_count, 10);
        assert!(stats.wall_time_per_scenario >= Duration::from_millis(4));
    }

    #[test]
    fn zero_scenarios() {
        let mut collector = ExecutionProfilingCollector::new();
        let stats = collector.compute_final_statistics(0);

        assert_eq!(stats.scenario_count, 0);
        assert_eq!(stats.cpu_time_per_scenario, Duration::ZERO);
        assert_eq!(stats.wall_time_per_scenario, Duration::ZERO);
    }
}
