//! Data types shared by the loader, the aggregation pipeline and the generator.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// One bicycle rental, as read from a raw trip table.
#[derive(Debug, Clone, PartialEq)]
pub struct TripRecord {
    pub start_station_name: String,
    pub started_at: NaiveDateTime,
    /// Ambient temperature in °F, when the source carries a temperature column.
    pub temperature: Option<f64>,
}

impl TripRecord {
    pub fn new(start_station_name: impl Into<String>, started_at: NaiveDateTime) -> Self {
        Self {
            start_station_name: start_station_name.into(),
            started_at,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Calendar date used as the daily aggregation key.
    pub fn date(&self) -> NaiveDate {
        self.started_at.date()
    }
}

/// A row that failed validation while reading a trip table.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    /// 1-based line number in the source file (header is line 1).
    pub line: u64,
    pub message: String,
}

/// Validated raw trips read from a single source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripTable {
    pub source: PathBuf,
    pub trips: Vec<TripRecord>,
    /// Whether the source declared a temperature column.
    pub has_temperature: bool,
    pub rows_read: usize,
    pub row_errors: Vec<RowError>,
}

impl TripTable {
    pub fn from_trips(trips: Vec<TripRecord>) -> Self {
        let has_temperature = trips.iter().any(|t| t.temperature.is_some());
        Self {
            rows_read: trips.len(),
            trips,
            has_temperature,
            ..Default::default()
        }
    }

    pub fn rows_used(&self) -> usize {
        self.trips.len()
    }
}

/// Total trips started at one station over the whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationAggregate {
    pub start_station_name: String,
    pub trip_count: u64,
}

impl StationAggregate {
    pub fn new(start_station_name: impl Into<String>, trip_count: u64) -> Self {
        Self {
            start_station_name: start_station_name.into(),
            trip_count,
        }
    }
}

/// Trips per calendar date joined with the mean temperature of that date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub daily_trips: u64,
    pub temperature: f64,
}

impl DailyAggregate {
    pub fn season(&self) -> Season {
        Season::from_month(self.date.month())
    }
}

/// Meteorological season of a calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Maps a month number (1-12) to its season. Out-of-range input is
    /// treated as winter.
    pub fn from_month(month: u32) -> Self {
        match month {
            3..=5 => Season::Spring,
            6..=8 => Season::Summer,
            9..=11 => Season::Fall,
            _ => Season::Winter,
        }
    }

    /// Spring and summer form the high-demand half of the year.
    pub fn is_warm(self) -> bool {
        matches!(self, Season::Spring | Season::Summer)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        };
        f.write_str(name)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "winter" => Ok(Season::Winter),
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "fall" | "autumn" => Ok(Season::Fall),
            other => {
                let known: Vec<String> = Season::ALL.iter().map(|s| s.to_string()).collect();
                Err(format!("unknown season '{other}', expected one of {}", known.join(", ")))
            }
        }
    }
}
