//! Deterministic stand-in data for when no real trip source is available.
//!
//! Every calendar date gets its own RNG stream derived from `(seed, date)`, so
//! a day's values never depend on which other days were requested. The first
//! draw of that stream is the temperature noise, which lets the daily
//! aggregator fill a missing temperature column with exactly the value the
//! generator would produce for the same date and seed.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analyzers::types::{DailyAggregate, StationAggregate};
use crate::error::{InvalidDateRangeSnafu, Result};

/// Average NYC temperature (°F) per month, January first.
pub const MONTHLY_TEMPS_F: [f64; 12] = [
    32.0, 35.0, 42.0, 53.0, 63.0, 72.0, 77.0, 76.0, 68.0, 57.0, 48.0, 38.0,
];
pub const TEMPERATURE_NOISE_SD: f64 = 5.0;

const TRIPS_BASE: f64 = 40_000.0;
const TRIPS_PER_DEGREE: f64 = 800.0;
const TRIPS_BASE_TEMP_F: f64 = 32.0;
const TRIPS_NOISE_SD: f64 = 3_000.0;
const WEEKEND_MULTIPLIER: f64 = 1.2;
pub const MIN_DAILY_TRIPS: u64 = 15_000;

const TOP_STATION_TRIPS: f64 = 129_018.0;
const STATION_DECAY: f64 = 0.0067;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_STATION_COUNT: usize = 20;

/// Illustrative station names, busiest first.
pub const SAMPLE_STATIONS: [&str; 20] = [
    "W 21 St & 6 Ave",
    "West St & Chambers St",
    "Broadway & W 58 St",
    "6 Ave & W 33 St",
    "1 Ave & E 68 St",
    "Broadway & E 14 St",
    "Broadway & W 25 St",
    "University Pl & E 14 St",
    "Broadway & E 21 St",
    "W 31 St & 7 Ave",
    "E 33 St & 1 Ave",
    "Cleveland Pl & Spring St",
    "12 Ave & W 40 St",
    "6 Ave & W 34 St",
    "West St & Liberty St",
    "11 Ave & W 41 St",
    "Lafayette St & E 8 St",
    "Central Park S & 6 Ave",
    "E 40 St & Park Ave",
    "8 Ave & W 33 St",
];

/// Parameters of a full synthetic dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub stations: usize,
    pub seed: u64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap_or_default(),
            stations: DEFAULT_STATION_COUNT,
            seed: DEFAULT_SEED,
        }
    }
}

/// Seasonal temperature model: monthly base plus seeded Gaussian noise.
#[derive(Debug, Clone, Copy)]
pub struct TemperatureModel {
    seed: u64,
}

impl TemperatureModel {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Monthly base temperature for `date`, without noise.
    pub fn base(date: NaiveDate) -> f64 {
        MONTHLY_TEMPS_F[date.month0() as usize]
    }

    pub fn temperature(&self, date: NaiveDate) -> f64 {
        let mut rng = day_rng(self.seed, date);
        Self::draw(date, &mut rng)
    }

    fn draw(date: NaiveDate, rng: &mut StdRng) -> f64 {
        let z: f64 = rng.sample(StandardNormal);
        Self::base(date) + TEMPERATURE_NOISE_SD * z
    }
}

fn day_rng(seed: u64, date: NaiveDate) -> StdRng {
    let day = date.num_days_from_ce() as u64;
    StdRng::seed_from_u64(seed ^ day.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Returns `count` stations with smoothly decaying, strictly decreasing
/// trip counts (until the floor of one trip is reached).
pub fn generate_stations(count: usize) -> Vec<StationAggregate> {
    let mut stations = Vec::with_capacity(count);
    let mut previous: Option<u64> = None;

    for rank in 0..count {
        let name = SAMPLE_STATIONS[rank % SAMPLE_STATIONS.len()];
        let name = match rank / SAMPLE_STATIONS.len() {
            0 => name.to_string(),
            cycle => format!("{name} #{}", cycle + 1),
        };

        let mut trips = (TOP_STATION_TRIPS * (-STATION_DECAY * rank as f64).exp()).round() as u64;
        if let Some(prev) = previous {
            trips = trips.min(prev.saturating_sub(1));
        }
        let trips = trips.max(1);
        previous = Some(trips);

        stations.push(StationAggregate::new(name, trips));
    }

    stations
}

/// Generates one row per date in `[start, end]`.
///
/// Output is bit-reproducible for a given `(start, end, seed)`.
///
/// # Errors
///
/// Returns [`crate::error::PipelineError::InvalidDateRange`] when `start > end`.
pub fn generate_daily_series(
    start: NaiveDate,
    end: NaiveDate,
    seed: u64,
) -> Result<Vec<DailyAggregate>> {
    if start > end {
        return InvalidDateRangeSnafu { start, end }.fail();
    }

    let series: Vec<DailyAggregate> = start
        .iter_days()
        .take_while(|d| *d <= end)
        .map(|date| {
            let mut rng = day_rng(seed, date);
            let temperature = TemperatureModel::draw(date, &mut rng);

            let weekend = match date.weekday() {
                Weekday::Sat | Weekday::Sun => WEEKEND_MULTIPLIER,
                _ => 1.0,
            };
            let base = TRIPS_BASE + (temperature - TRIPS_BASE_TEMP_F) * TRIPS_PER_DEGREE;
            let z: f64 = rng.sample(StandardNormal);
            let trips = (base * weekend + TRIPS_NOISE_SD * z).round();
            let daily_trips = if trips.is_finite() && trips > MIN_DAILY_TRIPS as f64 {
                trips as u64
            } else {
                MIN_DAILY_TRIPS
            };

            DailyAggregate {
                date,
                daily_trips,
                temperature,
            }
        })
        .collect();

    debug!(%start, %end, seed, days = series.len(), "Generated synthetic daily series");
    Ok(series)
}

/// Generates both reporting tables from `params`.
pub fn generate_sample(
    params: &SyntheticParams,
) -> Result<(Vec<StationAggregate>, Vec<DailyAggregate>)> {
    let daily = generate_daily_series(params.start, params.end, params.seed)?;
    Ok((generate_stations(params.stations), daily))
}
