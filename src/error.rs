use std::fmt::{self, Debug, Display};
use std::io;

use chrono::NaiveDate;

/// Provides `NowcastError` and maps to other errors to
/// convert to a `NowcastError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum NowcastError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CsvError(csv::Error),
    InvalidInput(FeedError),
    InvalidConfig(String),
    ReportError(String),
    NowcastError(String),
}

impl From<io::Error> for NowcastError {
    fn from(error: io::Error) -> Self {
        NowcastError::IoError(error)
    }
}

impl From<serde_json::Error> for NowcastError {
    fn from(error: serde_json::Error) -> Self {
        NowcastError::JsonError(error)
    }
}

impl From<csv::Error> for NowcastError {
    fn from(error: csv::Error) -> Self {
        NowcastError::CsvError(error)
    }
}

impl From<FeedError> for NowcastError {
    fn from(error: FeedError) -> Self {
        NowcastError::InvalidInput(error)
    }
}

impl From<String> for NowcastError {
    fn from(error: String) -> Self {
        NowcastError::NowcastError(error)
    }
}

impl From<&str> for NowcastError {
    fn from(error: &str) -> Self {
        NowcastError::NowcastError(error.to_string())
    }
}

impl std::error::Error for NowcastError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NowcastError::IoError(e) => Some(e),
            NowcastError::JsonError(e) => Some(e),
            NowcastError::CsvError(e) => Some(e),
            NowcastError::InvalidInput(e) => Some(e),
            NowcastError::InvalidConfig(_)
            | NowcastError::ReportError(_)
            | NowcastError::NowcastError(_) => None,
        }
    }
}

impl Display for NowcastError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NowcastError::IoError(e) => write!(f, "IO error: {e}"),
            NowcastError::JsonError(e) => write!(f, "config error: {e}"),
            NowcastError::CsvError(e) => write!(f, "CSV error: {e}"),
            NowcastError::InvalidInput(e) => write!(f, "invalid input feed: {e}"),
            NowcastError::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            NowcastError::ReportError(msg) => write!(f, "report error: {msg}"),
            NowcastError::NowcastError(msg) => write!(f, "{msg}"),
        }
    }
}

/// The rule an input row violated.
#[derive(Clone, PartialEq)]
pub enum FeedErrorKind {
    EmptyFeed,
    WrongColumnCount { expected: usize, found: usize },
    UnparsableDate { found: String },
    NonContiguousDate { previous: NaiveDate, found: NaiveDate },
    InvalidCount { field: &'static str, found: String },
    PositivityOutOfRange { found: String },
    InsufficientHistory { rows: usize, required: usize },
}

impl Display for FeedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedErrorKind::EmptyFeed => write!(f, "feed contains no rows"),
            FeedErrorKind::WrongColumnCount { expected, found } => {
                write!(f, "expected {} columns, found {}", expected, found)
            }
            FeedErrorKind::UnparsableDate { found } => {
                write!(f, "unparsable date '{}'", found)
            }
            FeedErrorKind::NonContiguousDate { previous, found } => {
                write!(f, "date {} does not follow {}", found, previous)
            }
            FeedErrorKind::InvalidCount { field, found } => {
                write!(f, "{} must be a non-negative integer, found '{}'", field, found)
            }
            FeedErrorKind::PositivityOutOfRange { found } => {
                write!(f, "positivity must be within [0, 100], found '{}'", found)
            }
            FeedErrorKind::InsufficientHistory { rows, required } => {
                write!(
                    f,
                    "feed has {} rows, more than {} are needed to cover the longest delay to death",
                    rows, required
                )
            }
        }
    }
}

impl Debug for FeedErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// A fatal input defect, located by its 1-based row number. Row 0 is used for
/// defects of the feed as a whole.
#[derive(Clone, PartialEq)]
pub struct FeedError {
    pub row: usize,
    pub kind: FeedErrorKind,
}

impl FeedError {
    #[must_use]
    pub fn new(row: usize, kind: FeedErrorKind) -> Self {
        Self { row, kind }
    }
}

impl Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.row == 0 {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "row {}: {}", self.row, self.kind)
        }
    }
}

impl Debug for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl std::error::Error for FeedError {}
