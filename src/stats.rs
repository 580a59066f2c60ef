use chrono::NaiveDate;
use serde::Serialize;

use crate::analyzers::types::{DailyAggregate, StationAggregate};
use crate::analyzers::utility::{mean, pearson, stddev};

/// Headline figures for the daily series.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DailyStats {
    pub days: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub total_trips: u64,
    pub avg_daily_trips: Option<f64>,
    /// Population standard deviation of daily trips.
    pub daily_trips_stddev: Option<f64>,
    pub peak_daily_trips: Option<u64>,
    pub peak_date: Option<NaiveDate>,
    pub avg_temperature: Option<f64>,
    /// Pearson r between daily trips and temperature.
    pub temperature_correlation: Option<f64>,
    /// Mean daily trips in spring and summer minus the mean in fall and winter.
    pub seasonal_difference: Option<f64>,
}

impl DailyStats {
    pub fn from_daily(daily: &[DailyAggregate]) -> Self {
        let trips: Vec<f64> = daily.iter().map(|d| d.daily_trips as f64).collect();
        let temps: Vec<f64> = daily.iter().map(|d| d.temperature).collect();

        // first maximum wins, so the earliest peak date is reported
        let peak = daily
            .iter()
            .fold(None::<&DailyAggregate>, |best, d| match best {
                Some(b) if b.daily_trips >= d.daily_trips => Some(b),
                _ => Some(d),
            });

        let warm: Vec<f64> = daily
            .iter()
            .filter(|d| d.season().is_warm())
            .map(|d| d.daily_trips as f64)
            .collect();
        let cold: Vec<f64> = daily
            .iter()
            .filter(|d| !d.season().is_warm())
            .map(|d| d.daily_trips as f64)
            .collect();

        DailyStats {
            days: daily.len(),
            first_date: daily.iter().map(|d| d.date).min(),
            last_date: daily.iter().map(|d| d.date).max(),
            total_trips: daily.iter().map(|d| d.daily_trips).sum(),
            avg_daily_trips: mean(&trips),
            daily_trips_stddev: mean(&trips).map(|m| stddev(&trips, m)),
            peak_daily_trips: peak.map(|d| d.daily_trips),
            peak_date: peak.map(|d| d.date),
            avg_temperature: mean(&temps),
            temperature_correlation: pearson(&trips, &temps),
            seasonal_difference: match (mean(&warm), mean(&cold)) {
                (Some(w), Some(c)) => Some(w - c),
                _ => None,
            },
        }
    }
}

/// Headline figures for the station ranking.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct StationStats {
    pub stations: usize,
    pub total_rides: u64,
    pub avg_per_station: Option<f64>,
    pub top_station: Option<String>,
    pub top_station_trips: Option<u64>,
}

impl StationStats {
    pub fn from_stations(stations: &[StationAggregate]) -> Self {
        let counts: Vec<f64> = stations.iter().map(|s| s.trip_count as f64).collect();
        StationStats {
            stations: stations.len(),
            total_rides: stations.iter().map(|s| s.trip_count).sum(),
            avg_per_station: mean(&counts),
            top_station: stations.first().map(|s| s.start_station_name.clone()),
            top_station_trips: stations.first().map(|s| s.trip_count),
        }
    }

    /// Share of the listed rides taken at the busiest station, in percent.
    pub fn top_share_pct(&self) -> f64 {
        Self::pct(self.top_station_trips.unwrap_or(0), self.total_rides)
    }

    pub fn pct(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }
}

/// All KPIs shown on the overview page.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    pub daily: DailyStats,
    pub stations: StationStats,
}

impl DashboardStats {
    pub fn new(stations: &[StationAggregate], daily: &[DailyAggregate]) -> Self {
        Self {
            daily: DailyStats::from_daily(daily),
            stations: StationStats::from_stations(stations),
        }
    }
}
