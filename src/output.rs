//! Output formatting and persistence for dashboard tables.
//!
//! Supports log-based rendering, JSON serialization, and CSV export in the
//! same layout the loader accepts as pre-aggregated input.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzers::types::{DailyAggregate, StationAggregate};
use crate::pipeline::Dashboard;
use crate::stats::DashboardStats;

pub const STATIONS_FILE: &str = "top_20_stations.csv";
pub const DAILY_FILE: &str = "daily_aggregated_data.csv";

/// Logs a value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs the load notices, warnings first-class so they reach the terminal.
pub fn log_notices(dashboard: &Dashboard) {
    for notice in &dashboard.notices {
        warn!(%notice, "Data notice");
    }
}

/// Logs the KPI block of the overview page.
pub fn log_stats(stats: &DashboardStats) {
    let d = &stats.daily;
    info!(
        days = d.days,
        first_date = ?d.first_date,
        last_date = ?d.last_date,
        total_trips = d.total_trips,
        avg_daily_trips = d.avg_daily_trips.map(|v| v.round()),
        daily_trips_stddev = d.daily_trips_stddev.map(|v| v.round()),
        peak_daily_trips = d.peak_daily_trips,
        peak_date = ?d.peak_date,
        "Daily trips"
    );
    info!(
        avg_temperature_f = d.avg_temperature.map(|v| (v * 10.0).round() / 10.0),
        correlation = d.temperature_correlation.map(|v| (v * 1000.0).round() / 1000.0),
        seasonal_difference = d.seasonal_difference.map(|v| v.round()),
        "Weather impact"
    );

    let s = &stats.stations;
    info!(
        stations = s.stations,
        total_rides = s.total_rides,
        avg_per_station = s.avg_per_station.map(|v| v.round()),
        top_station = s.top_station.as_deref().unwrap_or("-"),
        top_station_trips = s.top_station_trips,
        top_share_pct = (s.top_share_pct() * 10.0).round() / 10.0,
        "Station ranking"
    );
}

/// Logs the station ranking, one line per station.
pub fn log_stations(stations: &[StationAggregate]) {
    if stations.is_empty() {
        info!("No station data");
        return;
    }
    for (rank, s) in stations.iter().enumerate() {
        info!(rank = rank + 1, station = %s.start_station_name, trips = s.trip_count, "Station");
    }
}

/// Logs the daily series, one line per date.
pub fn log_daily(daily: &[DailyAggregate]) {
    if daily.is_empty() {
        info!("No daily data");
        return;
    }
    for d in daily {
        info!(
            date = %d.date,
            season = %d.season(),
            trips = d.daily_trips,
            temperature_f = (d.temperature * 10.0).round() / 10.0,
            "Day"
        );
    }
}

/// Writes `records` to a new CSV file at `path`, replacing any existing file.
pub fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = records.len(), "Writing CSV");

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes both tables into `dir` under the file names the loader probes for.
/// Returns the station and daily file paths.
pub fn export_tables(
    dir: &Path,
    stations: &[StationAggregate],
    daily: &[DailyAggregate],
) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let stations_path = dir.join(STATIONS_FILE);
    let daily_path = dir.join(DAILY_FILE);
    write_records(&stations_path, stations)?;
    write_records(&daily_path, daily)?;

    info!(
        stations = %stations_path.display(),
        daily = %daily_path.display(),
        "Exported aggregate tables"
    );
    Ok((stations_path, daily_path))
}
