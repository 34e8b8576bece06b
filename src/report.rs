use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{info, trace};
use serde::Serialize;

use crate::error::NowcastError;

/// A record type written as the rows of its own CSV file. Use `define_report!` to implement it.
pub trait Report: Serialize + 'static {
    /// File name without prefix or extension.
    fn file_stem() -> &'static str;
}

/// Where and how reports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    pub file_prefix: String,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            output_dir: PathBuf::from("."),
            overwrite: false,
        }
    }
}

impl ReportOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix prepended to every report file name.
    pub fn file_prefix(&mut self, file_prefix: String) -> &mut Self {
        self.file_prefix = file_prefix;
        self
    }

    /// Directory the reports are written to. Created if missing.
    pub fn directory(&mut self, directory: PathBuf) -> &mut Self {
        self.output_dir = directory;
        self
    }

    /// Whether existing report files may be replaced.
    pub fn overwrite(&mut self, overwrite: bool) -> &mut Self {
        self.overwrite = overwrite;
        self
    }

    /// Full path of the report file for `T`.
    #[must_use]
    pub fn path_for<T: Report>(&self) -> PathBuf {
        self.output_dir
            .join(format!("{}{}.csv", self.file_prefix, T::file_stem()))
    }

    /// Fails if the report file for `T` already exists and may not be replaced. Run this for
    /// every report before writing any of them, so a refused run leaves no partial output.
    ///
    /// # Errors
    ///
    /// `NowcastError::ReportError` naming the existing file.
    pub fn check_writable<T: Report>(&self) -> Result<(), NowcastError> {
        let path = self.path_for::<T>();
        if !self.overwrite && path.exists() {
            return Err(NowcastError::ReportError(format!(
                "file already exists: {}. Please set `overwrite` to true or use --force-overwrite",
                path.display()
            )));
        }
        Ok(())
    }

    /// Writes `rows` as the report for `T`, with a header row, and returns the path written.
    ///
    /// # Errors
    ///
    /// `NowcastError::ReportError` if the file exists and overwrite is off,
    /// `NowcastError::IoError` / `NowcastError::CsvError` if writing fails.
    pub fn write_report<T: Report>(&self, rows: &[T]) -> Result<PathBuf, NowcastError> {
        self.check_writable::<T>()?;
        let path = self.path_for::<T>();
        let file = generate_validate_filepath(&path)?;

        let mut writer = Writer::from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        info!("wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }
}

// Checks that the path is a CSV file. Creates all parent directories if they do not exist and
// returns the created file.
fn generate_validate_filepath(path: &Path) -> Result<File, NowcastError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                trace!("creating report directory {}", parent.display());
                create_dir_all(parent)?;
            }
            Ok(File::create(path)?)
        }
        _ => Err(NowcastError::ReportError(
            "Report output files must be CSVs".to_string(),
        )),
    }
}
