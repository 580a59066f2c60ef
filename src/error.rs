//! Error types for the aggregation pipeline.
//!
//! Missing sources and rejected candidate files are not errors here; the
//! loader reports them as [`crate::loader::LoadNotice`] values and falls back.
//! What remains in [`PipelineError`] is either a per-file failure that the
//! loader turns into a notice, or a fatal condition (an invalid generator
//! date range, an unreadable explicit configuration).

use std::path::PathBuf;

use snafu::prelude::*;

/// Errors raised while reading, validating or synthesizing dashboard data.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// IO error while opening or reading a candidate file.
    #[snafu(display("IO error reading {}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The delimited-text reader failed on a candidate file.
    #[snafu(display("CSV error in {}", path.display()))]
    Csv { path: PathBuf, source: csv::Error },

    /// A required column is absent from the header row.
    #[snafu(display("{} is missing required column '{column}'", path.display()))]
    MissingColumn { path: PathBuf, column: String },

    /// A row failed validation and the strict row policy is in effect.
    #[snafu(display("{} line {line}: {message}", path.display()))]
    MalformedRecord {
        path: PathBuf,
        line: u64,
        message: String,
    },

    /// Every data row in the file was malformed.
    #[snafu(display("{} has no valid rows ({rejected} rejected)", path.display()))]
    NoValidRows { path: PathBuf, rejected: usize },

    /// The generator was asked for a range whose start is after its end.
    #[snafu(display("Invalid date range: {start} is after {end}"))]
    InvalidDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// The configuration file could not be read.
    #[snafu(display("Failed to read configuration file {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for [`crate::config::DashboardConfig`].
    #[snafu(display("Failed to parse configuration file {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
