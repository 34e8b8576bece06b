//! The observed daily feed: parsing, the one-time validation gate, and the centered rolling
//! averages every scenario reads.
//!
//! A feed is headerless CSV with one row per calendar day:
//!
//! ```text
//! date, dnc, tests, positivity, deaths, occupancy
//! 2020-03-01, 12, 340, 3.5, 0, 4
//! ```
//!
//! Dates must be contiguous. Any violation rejects the whole feed with the rule and its 1-based
//! row number, and nothing downstream runs.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::{ByteRecord, ReaderBuilder, Trim};
use log::{debug, trace};

use crate::error::{FeedError, FeedErrorKind, NowcastError};

/// Position on the timeline. Day 0 is the first observed day; negative values are run-up days
/// before the feed starts.
pub type TimelineIndex = i64;

/// Number of fields in a feed row.
pub const FEED_COLUMNS: usize = 6;

/// Half-width of the short (5-day) centered window.
pub const SHORT_WINDOW_RADIUS: usize = 2;

/// Half-width of the long (101-day) centered window.
pub const LONG_WINDOW_RADIUS: usize = 50;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One validated feed row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyObservation {
    pub date: NaiveDate,
    /// Reported new confirmed cases.
    pub dnc: u32,
    pub tests: u32,
    /// Test positivity, in percent.
    pub positivity: f64,
    pub deaths: u32,
    /// Hospital bed occupancy.
    pub occupancy: u32,
}

/// Centered rolling means for one day, clamped to the ends of the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RollingAverages {
    pub dnc: f64,
    pub tests: f64,
    pub positivity: f64,
    pub deaths: f64,
    pub occupancy: f64,
    pub long_deaths: f64,
    pub long_occupancy: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedDay {
    pub timeline_index: usize,
    pub raw: DailyObservation,
    pub rolling: RollingAverages,
}

/// A validated, date-contiguous feed. Immutable once built and shared read-only by every
/// scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    days: Vec<ObservedDay>,
}

impl TimeSeries {
    /// Reads and validates a feed file.
    ///
    /// # Errors
    ///
    /// `NowcastError::IoError` if the file cannot be opened, `NowcastError::InvalidInput` for
    /// the first rule a row violates.
    pub fn from_path(path: &Path) -> Result<Self, NowcastError> {
        debug!("reading observation feed from {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Reads and validates a feed from any reader.
    ///
    /// # Errors
    ///
    /// `NowcastError::CsvError` if the underlying reader fails,
    /// `NowcastError::InvalidInput` for the first rule a row violates. A field that is not
    /// valid UTF-8 violates the rule of its column.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, NowcastError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(reader);

        let mut observations = Vec::new();
        let mut previous: Option<NaiveDate> = None;
        for (offset, record) in reader.byte_records().enumerate() {
            let record = record?;
            // Blank lines are skipped by the reader, so report the file line.
            let row = record
                .position()
                .and_then(|position| usize::try_from(position.line()).ok())
                .unwrap_or(offset + 1);
            let observation = parse_row(row, &record)?;
            if let Some(previous) = previous {
                if previous.succ_opt() != Some(observation.date) {
                    return Err(FeedError::new(
                        row,
                        FeedErrorKind::NonContiguousDate {
                            previous,
                            found: observation.date,
                        },
                    )
                    .into());
                }
            }
            previous = Some(observation.date);
            observations.push(observation);
        }

        Ok(Self::from_observations(observations)?)
    }

    /// Builds a series from rows that have already been parsed, checking contiguity and
    /// computing rolling averages.
    ///
    /// # Errors
    ///
    /// `FeedErrorKind::EmptyFeed` or `FeedErrorKind::NonContiguousDate`.
    pub fn from_observations(observations: Vec<DailyObservation>) -> Result<Self, FeedError> {
        if observations.is_empty() {
            return Err(FeedError::new(0, FeedErrorKind::EmptyFeed));
        }
        for (offset, pair) in observations.windows(2).enumerate() {
            if pair[0].date.succ_opt() != Some(pair[1].date) {
                return Err(FeedError::new(
                    offset + 2,
                    FeedErrorKind::NonContiguousDate {
                        previous: pair[0].date,
                        found: pair[1].date,
                    },
                ));
            }
        }

        let rolling = compute_rolling_averages(&observations);
        let days = observations
            .into_iter()
            .zip(rolling)
            .enumerate()
            .map(|(timeline_index, (raw, rolling))| ObservedDay {
                timeline_index,
                raw,
                rolling,
            })
            .collect::<Vec<_>>();

        debug!(
            "loaded {} observed days from {} to {}",
            days.len(),
            days[0].raw.date,
            days[days.len() - 1].raw.date
        );
        Ok(Self { days })
    }

    /// The feed must be strictly longer than the longest delay to death in the grid, so every
    /// scenario has at least one day backed by matured mortality.
    ///
    /// # Errors
    ///
    /// `FeedErrorKind::InsufficientHistory` when `len() <= max_death_delay`.
    pub fn check_minimum_length(&self, max_death_delay: usize) -> Result<(), FeedError> {
        if self.days.len() <= max_death_delay {
            return Err(FeedError::new(
                0,
                FeedErrorKind::InsufficientHistory {
                    rows: self.days.len(),
                    required: max_death_delay,
                },
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.days.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    #[must_use]
    pub fn days(&self) -> &[ObservedDay] {
        &self.days
    }

    #[must_use]
    pub fn day(&self, index: usize) -> Option<&ObservedDay> {
        self.days.get(index)
    }

    #[must_use]
    pub fn first_date(&self) -> NaiveDate {
        self.days[0].raw.date
    }

    /// Calendar date of any timeline index, including run-up days.
    #[must_use]
    pub fn date_of(&self, index: TimelineIndex) -> NaiveDate {
        self.first_date() + chrono::Duration::days(index)
    }

    /// Cumulative observed deaths over the whole feed.
    #[must_use]
    pub fn total_deaths(&self) -> u64 {
        self.days.iter().map(|day| u64::from(day.raw.deaths)).sum()
    }
}

fn parse_row(row: usize, record: &ByteRecord) -> Result<DailyObservation, FeedError> {
    if record.len() != FEED_COLUMNS {
        return Err(FeedError::new(
            row,
            FeedErrorKind::WrongColumnCount {
                expected: FEED_COLUMNS,
                found: record.len(),
            },
        ));
    }

    let date = text(&record[0])
        .and_then(|value| NaiveDate::parse_from_str(value, DATE_FORMAT).ok())
        .ok_or_else(|| {
            FeedError::new(
                row,
                FeedErrorKind::UnparsableDate {
                    found: lossy(&record[0]),
                },
            )
        })?;

    let dnc = parse_count(row, "dnc", &record[1])?;
    let tests = parse_count(row, "tests", &record[2])?;
    let positivity = text(&record[3])
        .and_then(|value| value.parse::<f64>().ok())
        .filter(|value| (0.0..=100.0).contains(value))
        .ok_or_else(|| {
            FeedError::new(
                row,
                FeedErrorKind::PositivityOutOfRange {
                    found: lossy(&record[3]),
                },
            )
        })?;

    let observation = DailyObservation {
        date,
        dnc,
        tests,
        positivity,
        deaths: parse_count(row, "deaths", &record[4])?,
        occupancy: parse_count(row, "occupancy", &record[5])?,
    };
    trace!("row {}: {:?}", row, observation);
    Ok(observation)
}

fn text(field: &[u8]) -> Option<&str> {
    std::str::from_utf8(field).ok()
}

fn lossy(field: &[u8]) -> String {
    String::from_utf8_lossy(field).into_owned()
}

fn parse_count(row: usize, field: &'static str, value: &[u8]) -> Result<u32, FeedError> {
    text(value)
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or_else(|| {
            FeedError::new(
                row,
                FeedErrorKind::InvalidCount {
                    field,
                    found: lossy(value),
                },
            )
        })
}

/// Prefix sums over one channel so any window mean is O(1).
struct PrefixSums(Vec<f64>);

impl PrefixSums {
    fn new<I: IntoIterator<Item = f64>>(values: I) -> Self {
        let mut sums = vec![0.0];
        let mut total = 0.0;
        for value in values {
            total += value;
            sums.push(total);
        }
        PrefixSums(sums)
    }

    /// Mean over the inclusive range `first..=last`.
    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, first: usize, last: usize) -> f64 {
        (self.0[last + 1] - self.0[first]) / (last - first + 1) as f64
    }
}

fn window(index: usize, radius: usize, len: usize) -> (usize, usize) {
    (index.saturating_sub(radius), (index + radius).min(len - 1))
}

fn compute_rolling_averages(observations: &[DailyObservation]) -> Vec<RollingAverages> {
    let len = observations.len();
    let dnc = PrefixSums::new(observations.iter().map(|o| f64::from(o.dnc)));
    let tests = PrefixSums::new(observations.iter().map(|o| f64::from(o.tests)));
    let positivity = PrefixSums::new(observations.iter().map(|o| o.positivity));
    let deaths = PrefixSums::new(observations.iter().map(|o| f64::from(o.deaths)));
    let occupancy = PrefixSums::new(observations.iter().map(|o| f64::from(o.occupancy)));

    (0..len)
        .map(|index| {
            let (first, last) = window(index, SHORT_WINDOW_RADIUS, len);
            let (long_first, long_last) = window(index, LONG_WINDOW_RADIUS, len);
            RollingAverages {
                dnc: dnc.mean(first, last),
                tests: tests.mean(first, last),
                positivity: positivity.mean(first, last),
                deaths: deaths.mean(first, last),
                occupancy: occupancy.mean(first, last),
                long_deaths: deaths.mean(long_first, long_last),
                long_occupancy: occupancy.mean(long_first, long_last),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::assert_almost_eq;
    use crate::numeric::ACC;

    pub(crate) fn observation(date: NaiveDate, deaths: u32, occupancy: u32) -> DailyObservation {
        DailyObservation {
            date,
            dnc: 100,
            tests: 1000,
            positivity: 5.0,
            deaths,
            occupancy,
        }
    }

    /// A flat feed of `len` days starting 2020-03-01.
    pub(crate) fn flat_series(len: usize, deaths: u32, occupancy: u32) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let observations = start
            .iter_days()
            .take(len)
            .map(|date| observation(date, deaths, occupancy))
            .collect();
        TimeSeries::from_observations(observations).unwrap()
    }

    fn parse(text: &str) -> Result<TimeSeries, NowcastError> {
        TimeSeries::from_reader(text.as_bytes())
    }

    fn expect_feed_error(text: &str) -> FeedError {
        match parse(text) {
            Err(NowcastError::InvalidInput(error)) => error,
            Err(other) => panic!("Unexpected error: {other}"),
            Ok(_) => panic!("feed should have been rejected"),
        }
    }

    #[test]
    fn parses_trimmed_rows() {
        let series = parse(
            "2020-03-01 , 12, 340, 3.5, 0, 4\n\
             2020-03-02 , 15, 360, 4.0, 1, 6\n",
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        let day = &series.days()[1];
        assert_eq!(day.timeline_index, 1);
        assert_eq!(day.raw.dnc, 15);
        assert_eq!(day.raw.deaths, 1);
        assert_almost_eq!(day.raw.positivity, 4.0, ACC);
        assert_eq!(series.total_deaths(), 1);
    }

    #[test]
    fn rejects_wrong_column_count() {
        let error = expect_feed_error(
            "2020-03-01, 12, 340, 3.5, 0, 4\n\
             2020-03-02, 15, 360, 4.0, 1\n",
        );
        assert_eq!(error.row, 2);
        assert_eq!(
            error.kind,
            FeedErrorKind::WrongColumnCount {
                expected: 6,
                found: 5
            }
        );
    }

    #[test]
    fn rejects_unparsable_date() {
        let error = expect_feed_error("03/01/2020, 12, 340, 3.5, 0, 4\n");
        assert_eq!(error.row, 1);
        assert!(matches!(error.kind, FeedErrorKind::UnparsableDate { .. }));
    }

    #[test]
    fn rejects_date_gap() {
        let error = expect_feed_error(
            "2020-03-01, 12, 340, 3.5, 0, 4\n\
             2020-03-02, 12, 340, 3.5, 0, 4\n\
             2020-03-04, 12, 340, 3.5, 0, 4\n",
        );
        assert_eq!(error.row, 3);
        assert!(matches!(
            error.kind,
            FeedErrorKind::NonContiguousDate { .. }
        ));
    }

    #[test]
    fn rejects_negative_count() {
        let error = expect_feed_error("2020-03-01, 12, 340, 3.5, -1, 4\n");
        assert_eq!(
            error.kind,
            FeedErrorKind::InvalidCount {
                field: "deaths",
                found: "-1".to_string()
            }
        );
    }

    #[test]
    fn rejects_positivity_out_of_range() {
        let error = expect_feed_error("2020-03-01, 12, 340, 101, 0, 4\n");
        assert!(matches!(
            error.kind,
            FeedErrorKind::PositivityOutOfRange { .. }
        ));
    }

    #[test]
    fn rejects_non_utf8_field() {
        let feed: &[u8] = b"2020-03-01, 12, 340, 3.5, 0, 4\n2020-03-02, 1\xFF2, 340, 3.5, 0, 4\n";
        let error = match TimeSeries::from_reader(feed) {
            Err(NowcastError::InvalidInput(error)) => error,
            Err(other) => panic!("Unexpected error: {other}"),
            Ok(_) => panic!("feed should have been rejected"),
        };
        assert_eq!(error.row, 2);
        assert!(matches!(
            error.kind,
            FeedErrorKind::InvalidCount { field: "dnc", .. }
        ));
    }

    #[test]
    fn non_utf8_date_is_unparsable() {
        let feed: &[u8] = b"2020-03-\xC001, 12, 340, 3.5, 0, 4\n";
        match TimeSeries::from_reader(feed) {
            Err(NowcastError::InvalidInput(error)) => {
                assert_eq!(error.row, 1);
                assert!(matches!(error.kind, FeedErrorKind::UnparsableDate { .. }));
            }
            _ => panic!("feed should have been rejected"),
        }
    }

    #[test]
    fn rows_after_blank_lines_keep_file_line_numbers() {
        let error = expect_feed_error(
            "2020-03-01, 12, 340, 3.5, 0, 4\n\
             \n\
             2020-03-02, 12, 340, 3.5, 0, 4\n\
             2020-03-03, 12, 340, 150, 0, 4\n",
        );
        assert_eq!(error.row, 4);
        assert!(matches!(
            error.kind,
            FeedErrorKind::PositivityOutOfRange { .. }
        ));
    }

    #[test]
    fn rejects_empty_feed() {
        let error = expect_feed_error("");
        assert_eq!(error.kind, FeedErrorKind::EmptyFeed);
    }

    #[test]
    fn minimum_length_boundary() {
        let series = flat_series(34, 10, 100);
        assert!(series.check_minimum_length(34).is_err());
        let series = flat_series(35, 10, 100);
        assert!(series.check_minimum_length(34).is_ok());
    }

    #[test]
    fn short_window_clamps_at_edges() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let observations = start
            .iter_days()
            .take(6)
            .enumerate()
            .map(|(i, date)| observation(date, u32::try_from(i).unwrap(), 0))
            .collect();
        let series = TimeSeries::from_observations(observations).unwrap();
        // day 0 averages days 0..=2
        assert_almost_eq!(series.days()[0].rolling.deaths, 1.0, ACC);
        // day 3 averages days 1..=5
        assert_almost_eq!(series.days()[3].rolling.deaths, 3.0, ACC);
        // day 5 averages days 3..=5
        assert_almost_eq!(series.days()[5].rolling.deaths, 4.0, ACC);
    }

    #[test]
    fn long_window_uses_its_own_span() {
        let start = NaiveDate::from_ymd_opt(2020, 3, 1).unwrap();
        let observations = start
            .iter_days()
            .take(120)
            .enumerate()
            .map(|(i, date)| observation(date, u32::from(i >= 60), 0))
            .collect();
        let series = TimeSeries::from_observations(observations).unwrap();
        // day 60 averages days 10..=110: 51 ones over 101 days
        assert_almost_eq!(series.days()[60].rolling.long_deaths, 51.0 / 101.0, ACC);
        // the short window only sees ones
        assert_almost_eq!(series.days()[62].rolling.deaths, 1.0, ACC);
    }

    #[test]
    fn run_up_dates_precede_first_day() {
        let series = flat_series(40, 10, 100);
        assert_eq!(
            series.date_of(-3),
            NaiveDate::from_ymd_opt(2020, 2, 27).unwrap()
        );
    }
}
