use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::tempdir;

fn nowcast(input: &str, output_dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("epi-nowcast");
    cmd.arg("--input")
        .arg(input)
        .arg("--output-dir")
        .arg(output_dir)
        .arg("--no-progress")
        .arg("--no-stats");
    cmd
}

#[test]
fn writes_both_reports() {
    let temp_dir = tempdir().unwrap();
    nowcast("tests/data/feed_valid.csv", temp_dir.path())
        .arg("--config")
        .arg("tests/data/small_grid.json")
        .assert()
        .success();

    let result_days = fs::read_to_string(temp_dir.path().join("result_days.csv")).unwrap();
    let mut lines = result_days.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("timeline_index,date,dnc,"));
    assert!(header.contains("baseline_sourced_on"));
    // 30 run-up days plus 80 observed days
    assert_eq!(lines.clone().count(), 110);
    let first = lines.next().unwrap();
    assert!(first.starts_with("-30,2020-01-31,,"));
    assert!(first.contains("MortalityOnly"));

    let aggregates = fs::read_to_string(temp_dir.path().join("aggregates.csv")).unwrap();
    assert_eq!(aggregates.lines().count(), 2);
    assert!(aggregates.starts_with("lower_reff,baseline_reff,upper_reff,"));
}

#[test]
fn feed_as_long_as_longest_delay_is_rejected() {
    let temp_dir = tempdir().unwrap();
    let output = nowcast("tests/data/feed_34_rows.csv", temp_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("feed has 34 rows"));
    assert!(!temp_dir.path().join("result_days.csv").exists());
}

#[test]
fn feed_one_day_longer_than_longest_delay_is_accepted() {
    let temp_dir = tempdir().unwrap();
    nowcast("tests/data/feed_35_rows.csv", temp_dir.path())
        .assert()
        .success();
    assert!(temp_dir.path().join("aggregates.csv").exists());
}

#[test]
fn gap_in_dates_reports_row() {
    let temp_dir = tempdir().unwrap();
    let output = nowcast("tests/data/feed_gap.csv", temp_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("row 5: date 2020-03-06 does not follow 2020-03-04"));
}

#[test]
fn positivity_out_of_range_reports_row() {
    let temp_dir = tempdir().unwrap();
    let output = nowcast("tests/data/feed_bad_positivity.csv", temp_dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("row 3: positivity"));
    assert!(!temp_dir.path().join("aggregates.csv").exists());
}

#[test]
fn existing_reports_need_force_overwrite() {
    let temp_dir = tempdir().unwrap();
    let run = |force: bool| {
        let mut cmd = nowcast("tests/data/feed_valid.csv", temp_dir.path());
        cmd.arg("--config").arg("tests/data/small_grid.json");
        if force {
            cmd.arg("--force-overwrite");
        }
        cmd.output().unwrap()
    };

    assert!(run(false).status.success());
    let second = run(false);
    assert!(!second.status.success());
    assert!(String::from_utf8(second.stderr)
        .unwrap()
        .contains("already exists"));
    assert!(run(true).status.success());
}

#[test]
fn repeated_runs_are_identical() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    for (dir, threads) in [(&first, "1"), (&second, "4")] {
        nowcast("tests/data/feed_valid.csv", dir.path())
            .arg("--config")
            .arg("tests/data/small_grid.json")
            .arg("--threads")
            .arg(threads)
            .assert()
            .success();
    }
    for report in ["result_days.csv", "aggregates.csv"] {
        assert_eq!(
            fs::read(first.path().join(report)).unwrap(),
            fs::read(second.path().join(report)).unwrap()
        );
    }
}

#[test]
fn verbose_run_logs_stages() {
    let temp_dir = tempdir().unwrap();
    let output = nowcast("tests/data/feed_valid.csv", temp_dir.path())
        .arg("--config")
        .arg("tests/data/small_grid.json")
        .arg("-v")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Running 8 scenarios"));
    assert!(!stderr.contains("DEBUG"));
}

#[test]
fn module_log_filter() {
    let temp_dir = tempdir().unwrap();
    let output = nowcast("tests/data/feed_valid.csv", temp_dir.path())
        .arg("--config")
        .arg("tests/data/small_grid.json")
        .arg("--log-level")
        .arg("epi_nowcast::scenario=debug")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("scenario 0: running with"));
    assert!(!stderr.contains("Running 8 scenarios"));
}

#[test]
fn prints_execution_summary_by_default() {
    let temp_dir = tempdir().unwrap();
    let output = cargo_bin_cmd!("epi-nowcast")
        .arg("--input")
        .arg("tests/data/feed_valid.csv")
        .arg("--config")
        .arg("tests/data/small_grid.json")
        .arg("--output-dir")
        .arg(temp_dir.path())
        .arg("--file-prefix")
        .arg("summary_")
        .arg("--no-progress")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Execution Summary"));
    assert!(stdout.contains("Scenarios:"));
    assert!(temp_dir.path().join("summary_result_days.csv").exists());
}
