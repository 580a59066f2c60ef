//! Delimited-text readers for raw trip tables and pre-aggregated reports.
//!
//! Files ending in `.gz` are transparently gunzipped. Missing required
//! columns always fail the whole file; malformed rows are either dropped or
//! fail the file depending on [`RowPolicy`].

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ByteRecord, StringRecord};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::types::{DailyAggregate, RowError, StationAggregate, TripRecord, TripTable};
use crate::error::{
    CsvSnafu, IoSnafu, MalformedRecordSnafu, MissingColumnSnafu, NoValidRowsSnafu, Result,
};

/// What to do with a row that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Log the row, leave it out, keep reading.
    #[default]
    Drop,
    /// Fail the whole file on the first bad row.
    Reject,
}

/// Column names used to read a raw trip table. Each field lists accepted
/// header spellings in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TripColumns {
    pub station: Vec<String>,
    pub started_at: Vec<String>,
    pub temperature: Vec<String>,
}

impl Default for TripColumns {
    fn default() -> Self {
        Self {
            station: vec!["start_station_name".into()],
            started_at: vec!["started_at".into()],
            temperature: vec!["temperature".into(), "avgTemp".into()],
        }
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Parses a trip start timestamp. Accepts the common Citi Bike export
/// layouts, RFC 3339 with an offset (the offset is dropped), and a bare
/// date (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parses a calendar date, also accepting a full timestamp whose date part is used.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date()))
}

fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<u64>() {
        return Some(n);
    }
    // pandas writes integer columns as floats once they have passed through a NaN
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 => Some(v as u64),
        _ => None,
    }
}

fn parse_temperature(raw: &str) -> std::result::Result<Option<f64>, String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(format!("invalid temperature '{raw}'")),
    }
}

/// Opens `path` for reading, gunzipping when the extension is `gz`.
pub fn open_source(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).context(IoSnafu { path })?;
    let reader = BufReader::new(file);
    if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

fn find_column(headers: &StringRecord, names: &[String]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h.trim() == name))
}

fn require_column(headers: &StringRecord, names: &[String], path: &Path) -> Result<usize> {
    match find_column(headers, names) {
        Some(idx) => Ok(idx),
        None => MissingColumnSnafu {
            path,
            column: names.first().cloned().unwrap_or_default(),
        }
        .fail(),
    }
}

/// Collects rejected rows and applies the [`RowPolicy`].
struct RowValidator<'a> {
    path: &'a Path,
    policy: RowPolicy,
    errors: Vec<RowError>,
}

impl<'a> RowValidator<'a> {
    fn new(path: &'a Path, policy: RowPolicy) -> Self {
        Self {
            path,
            policy,
            errors: Vec::new(),
        }
    }

    fn reject(&mut self, line: u64, message: String) -> Result<()> {
        if self.policy == RowPolicy::Reject {
            return MalformedRecordSnafu {
                path: self.path,
                line,
                message,
            }
            .fail();
        }
        self.errors.push(RowError { line, message });
        Ok(())
    }

    fn finish(self, rows_used: usize) -> Result<Vec<RowError>> {
        if rows_used == 0 && !self.errors.is_empty() {
            return NoValidRowsSnafu {
                path: self.path,
                rejected: self.errors.len(),
            }
            .fail();
        }
        if !self.errors.is_empty() {
            let first_lines: Vec<u64> = self.errors.iter().take(5).map(|e| e.line).collect();
            warn!(
                path = %self.path.display(),
                dropped = self.errors.len(),
                ?first_lines,
                "Dropped malformed rows"
            );
        }
        Ok(self.errors)
    }
}

fn line_of(record: &ByteRecord, fallback: u64) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(fallback)
}

/// Decodes field `idx`; a missing trailing field reads as empty.
fn field(record: &ByteRecord, idx: usize) -> std::result::Result<&str, String> {
    match record.get(idx) {
        Some(bytes) => {
            std::str::from_utf8(bytes).map_err(|_| format!("invalid UTF-8 in column {}", idx + 1))
        }
        None => Ok(""),
    }
}

/// Reads a raw trip table from `path`.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_trip_table(path: &Path, columns: &TripColumns, policy: RowPolicy) -> Result<TripTable> {
    let reader = open_source(path)?;
    read_trip_table_from_reader(reader, path, columns, policy)
}

/// Reads a raw trip table from any reader; `path` is only used for reporting.
pub fn read_trip_table_from_reader<R: Read>(
    reader: R,
    path: &Path,
    columns: &TripColumns,
    policy: RowPolicy,
) -> Result<TripTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().context(CsvSnafu { path })?.clone();

    let station_idx = require_column(&headers, &columns.station, path)?;
    let started_idx = require_column(&headers, &columns.started_at, path)?;
    let temperature_idx = find_column(&headers, &columns.temperature);

    let mut validator = RowValidator::new(path, policy);
    let mut trips = Vec::new();
    let mut rows_read = 0usize;

    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record).context(CsvSnafu { path })? {
        rows_read += 1;
        let line = line_of(&record, rows_read as u64 + 1);

        let fields = field(&record, station_idx).and_then(|station| {
            let raw_ts = field(&record, started_idx)?;
            let raw_temp = match temperature_idx {
                Some(i) => Some(field(&record, i)?),
                None => None,
            };
            Ok((station.trim(), raw_ts, raw_temp))
        });
        let (station, raw_ts, raw_temp) = match fields {
            Ok(fields) => fields,
            Err(message) => {
                validator.reject(line, message)?;
                continue;
            }
        };

        if station.is_empty() {
            validator.reject(line, "missing station name".to_string())?;
            continue;
        }

        let Some(started_at) = parse_timestamp(raw_ts) else {
            validator.reject(line, format!("unparseable timestamp '{raw_ts}'"))?;
            continue;
        };

        let temperature = match raw_temp.map(parse_temperature) {
            Some(Ok(t)) => t,
            Some(Err(message)) => {
                validator.reject(line, message)?;
                continue;
            }
            None => None,
        };

        trips.push(TripRecord {
            start_station_name: station.to_string(),
            started_at,
            temperature,
        });
    }

    let row_errors = validator.finish(trips.len())?;
    debug!(rows_read, rows_used = trips.len(), "Trip table parsed");

    Ok(TripTable {
        source: path.to_path_buf(),
        trips,
        has_temperature: temperature_idx.is_some(),
        rows_read,
        row_errors,
    })
}

/// Reads a pre-aggregated station table: `start_station_name, trip_count`.
///
/// A station name may appear only once; a repeat fails the file.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_station_aggregates(path: &Path, policy: RowPolicy) -> Result<Vec<StationAggregate>> {
    let reader = open_source(path)?;
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().context(CsvSnafu { path })?.clone();

    let name_idx = require_column(&headers, &["start_station_name".to_string()], path)?;
    let count_idx = require_column(&headers, &["trip_count".to_string()], path)?;

    let mut validator = RowValidator::new(path, policy);
    let mut stations = Vec::new();
    let mut seen = HashSet::new();
    let mut row = 0u64;

    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record).context(CsvSnafu { path })? {
        row += 1;
        let line = line_of(&record, row + 1);

        let fields = field(&record, name_idx)
            .and_then(|name| Ok((name.trim(), field(&record, count_idx)?)));
        let (name, raw_count) = match fields {
            Ok(fields) => fields,
            Err(message) => {
                validator.reject(line, message)?;
                continue;
            }
        };

        let count = match (name.is_empty(), parse_count(raw_count)) {
            (false, Some(count)) => count,
            (true, _) => {
                validator.reject(line, "missing station name".to_string())?;
                continue;
            }
            (false, None) => {
                validator.reject(line, format!("invalid trip_count '{raw_count}'"))?;
                continue;
            }
        };

        if !seen.insert(name.to_string()) {
            return MalformedRecordSnafu {
                path,
                line,
                message: format!("duplicate station '{name}'"),
            }
            .fail();
        }

        stations.push(StationAggregate::new(name, count));
    }

    validator.finish(stations.len())?;
    Ok(stations)
}

/// Reads a pre-aggregated daily table: `date, daily_trips, temperature`.
///
/// Rows are returned ordered by date. A repeated date fails the file, since
/// it cannot be resolved without guessing which row is authoritative.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_daily_aggregates(path: &Path, policy: RowPolicy) -> Result<Vec<DailyAggregate>> {
    let reader = open_source(path)?;
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers().context(CsvSnafu { path })?.clone();

    let date_idx = require_column(&headers, &["date".to_string()], path)?;
    let trips_idx = require_column(
        &headers,
        &["daily_trips".to_string(), "trip_count".to_string()],
        path,
    )?;
    let temp_idx = require_column(
        &headers,
        &["temperature".to_string(), "avgTemp".to_string()],
        path,
    )?;

    let mut validator = RowValidator::new(path, policy);
    let mut rows = Vec::new();
    let mut seen = HashSet::new();
    let mut row = 0u64;

    let mut record = ByteRecord::new();
    while rdr.read_byte_record(&mut record).context(CsvSnafu { path })? {
        row += 1;
        let line = line_of(&record, row + 1);

        let fields = field(&record, date_idx).and_then(|raw_date| {
            Ok((raw_date, field(&record, trips_idx)?, field(&record, temp_idx)?))
        });
        let (raw_date, raw_trips, raw_temp) = match fields {
            Ok(fields) => fields,
            Err(message) => {
                validator.reject(line, message)?;
                continue;
            }
        };

        let Some(date) = parse_date(raw_date) else {
            validator.reject(line, format!("unparseable date '{raw_date}'"))?;
            continue;
        };
        let Some(daily_trips) = parse_count(raw_trips) else {
            validator.reject(line, format!("invalid daily_trips '{raw_trips}'"))?;
            continue;
        };
        let temperature = match parse_temperature(raw_temp) {
            Ok(Some(t)) => t,
            Ok(None) => {
                validator.reject(line, "missing temperature".to_string())?;
                continue;
            }
            Err(message) => {
                validator.reject(line, message)?;
                continue;
            }
        };

        if !seen.insert(date) {
            return MalformedRecordSnafu {
                path,
                line,
                message: format!("duplicate date {date}"),
            }
            .fail();
        }

        rows.push(DailyAggregate {
            date,
            daily_trips,
            temperature,
        });
    }

    validator.finish(rows.len())?;
    rows.sort_by_key(|r| r.date);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn read(csv: &str, policy: RowPolicy) -> Result<TripTable> {
        read_trip_table_from_reader(
            csv.as_bytes(),
            &PathBuf::from("inline.csv"),
            &TripColumns::default(),
            policy,
        )
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = NaiveDate::from_ymd_opt(2022, 1, 21)
            .unwrap()
            .and_hms_opt(13, 13, 43)
            .unwrap();
        assert_eq!(parse_timestamp("2022-01-21 13:13:43"), Some(expected));
        assert_eq!(parse_timestamp("2022-01-21T13:13:43"), Some(expected));
        assert_eq!(parse_timestamp("2022-01-21T13:13:43-05:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2022-01-21 13:13:43.392").map(|t| t.date()),
            Some(expected.date())
        );
        assert_eq!(
            parse_timestamp("2022-01-21").map(|t| t.date()),
            Some(expected.date())
        );
        assert_eq!(parse_timestamp("not a date"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_parse_count_accepts_integral_floats() {
        assert_eq!(parse_count("45000"), Some(45000));
        assert_eq!(parse_count("45000.0"), Some(45000));
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count("-3"), None);
    }

    #[test]
    fn test_read_trips_basic() {
        let csv = "ride_id,started_at,start_station_name\n\
                   r1,2022-01-01 08:00:00,A\n\
                   r2,2022-01-02 09:30:00,B\n";
        let table = read(csv, RowPolicy::Drop).unwrap();
        assert_eq!(table.rows_read, 2);
        assert_eq!(table.trips.len(), 2);
        assert!(!table.has_temperature);
        assert_eq!(table.trips[1].start_station_name, "B");
    }

    #[test]
    fn test_read_trips_with_temperature_alias() {
        let csv = "started_at,start_station_name,avgTemp\n\
                   2022-01-01 08:00:00,A,30.5\n\
                   2022-01-01 09:00:00,A,\n";
        let table = read(csv, RowPolicy::Drop).unwrap();
        assert!(table.has_temperature);
        assert_eq!(table.trips[0].temperature, Some(30.5));
        assert_eq!(table.trips[1].temperature, None);
    }

    #[test]
    fn test_missing_column_fails() {
        let csv = "started_at,end_station_name\n2022-01-01 08:00:00,A\n";
        let err = read(csv, RowPolicy::Drop).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::MissingColumn { ref column, .. }
                if column == "start_station_name"
        ));
    }

    #[test]
    fn test_malformed_rows_dropped_under_drop_policy() {
        let csv = "started_at,start_station_name\n\
                   2022-01-01 08:00:00,A\n\
                   garbage,B\n\
                   2022-01-02 08:00:00,\n\
                   2022-01-03 08:00:00,C\n";
        let table = read(csv, RowPolicy::Drop).unwrap();
        assert_eq!(table.rows_read, 4);
        assert_eq!(table.rows_used(), 2);
        assert_eq!(table.row_errors.len(), 2);
        assert_eq!(table.row_errors[0].line, 3);
        assert_eq!(table.row_errors[1].line, 4);
    }

    #[test]
    fn test_malformed_row_rejects_under_reject_policy() {
        let csv = "started_at,start_station_name\n\
                   2022-01-01 08:00:00,A\n\
                   garbage,B\n";
        let err = read(csv, RowPolicy::Reject).unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn test_all_rows_malformed_fails() {
        let csv = "started_at,start_station_name\ngarbage,A\nworse,B\n";
        let err = read(csv, RowPolicy::Drop).unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::NoValidRows { rejected: 2, .. }));
    }

    #[test]
    fn test_invalid_utf8_row_is_dropped() {
        let bytes: &[u8] = b"started_at,start_station_name\n\
                             2022-01-01 08:00:00,A\n\
                             2022-01-01 09:00:00,B\xff\n\
                             2022-01-01 10:00:00,C\n";
        let path = PathBuf::from("inline.csv");

        let table =
            read_trip_table_from_reader(bytes, &path, &TripColumns::default(), RowPolicy::Drop)
                .unwrap();
        let names: Vec<_> = table.trips.iter().map(|t| t.start_station_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
        assert_eq!(table.row_errors.len(), 1);
        assert_eq!(table.row_errors[0].line, 3);

        let err =
            read_trip_table_from_reader(bytes, &path, &TripColumns::default(), RowPolicy::Reject)
                .unwrap_err();
        assert!(matches!(err, crate::error::PipelineError::MalformedRecord { line: 3, .. }));
    }

    #[test]
    fn test_station_aggregates_reject_repeated_name() {
        let path = std::env::temp_dir().join("citibike_insights_parser_dup_station.csv");
        std::fs::write(&path, "start_station_name,trip_count\nA,10\nB,7\nA,5\n").unwrap();

        let err = read_station_aggregates(&path, RowPolicy::Drop).unwrap_err();
        assert!(matches!(
            err,
            crate::error::PipelineError::MalformedRecord { line: 4, ref message, .. }
                if message.contains("duplicate station")
        ));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_station_aggregates_drop_invalid_utf8_row() {
        let path = std::env::temp_dir().join("citibike_insights_parser_utf8_station.csv");
        std::fs::write(&path, b"start_station_name,trip_count\nA,10\nB\xff,7\nC,5\n").unwrap();

        let stations = read_station_aggregates(&path, RowPolicy::Drop).unwrap();
        assert_eq!(stations, vec![StationAggregate::new("A", 10), StationAggregate::new("C", 5)]);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = read("started_at,start_station_name\n", RowPolicy::Drop).unwrap();
        assert!(table.trips.is_empty());
        assert!(table.row_errors.is_empty());
    }
}
