//! Source resolution for the dashboard.
//!
//! The loader probes candidate locations in priority order and stops at the
//! first file that reads cleanly. Pre-aggregated tables are preferred (both
//! the station and the daily table must be present); raw trips come next.
//! When nothing usable exists it falls back to the synthetic generator and
//! reports that through [`LoadNotice::UsingSampleData`] instead of failing.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::analyzers::types::{DailyAggregate, StationAggregate, TripTable};
use crate::config::DashboardConfig;
use crate::error::{PipelineError, Result};
use crate::parser::{read_daily_aggregates, read_station_aggregates, read_trip_table};
use crate::synthetic::{SyntheticParams, generate_sample};

/// The kind of table a candidate path is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Trips,
    Stations,
    Daily,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Trips => f.write_str("trip table"),
            SourceKind::Stations => f.write_str("station table"),
            SourceKind::Daily => f.write_str("daily table"),
        }
    }
}

/// Non-fatal conditions met while loading, meant to be shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum LoadNotice {
    /// No candidate of this kind exists on disk.
    SourceNotFound { kind: SourceKind },
    /// A candidate existed but could not be used.
    Rejected {
        kind: SourceKind,
        path: PathBuf,
        reason: String,
    },
    /// Only one of the two pre-aggregated tables was found.
    IncompleteAggregates { found: PathBuf },
    /// Malformed rows were left out of a trip table.
    RowsDropped { path: PathBuf, dropped: usize },
    /// The dashboard is showing generated sample data.
    UsingSampleData,
}

impl fmt::Display for LoadNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadNotice::SourceNotFound { kind } => {
                write!(f, "No {kind} found in expected locations")
            }
            LoadNotice::Rejected { kind, path, reason } => {
                write!(f, "Skipped {kind} {}: {reason}", path.display())
            }
            LoadNotice::IncompleteAggregates { found } => write!(
                f,
                "Ignoring {} because its companion aggregate file is missing",
                found.display()
            ),
            LoadNotice::RowsDropped { path, dropped } => {
                write!(f, "Dropped {dropped} malformed rows from {}", path.display())
            }
            LoadNotice::UsingSampleData => {
                f.write_str("Using sample data - CSV files not found in expected locations")
            }
        }
    }
}

/// Where a pair of aggregate tables came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateOrigin {
    Files { stations: PathBuf, daily: PathBuf },
    Synthetic { params: SyntheticParams },
}

/// What the loader produced. Raw trips still need aggregating; aggregates
/// go straight to presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedData {
    Trips(TripTable),
    Aggregates {
        stations: Vec<StationAggregate>,
        daily: Vec<DailyAggregate>,
        origin: AggregateOrigin,
    },
}

/// Loaded data plus everything worth telling the user about how it was found.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOutcome {
    pub data: LoadedData,
    pub notices: Vec<LoadNotice>,
}

impl LoadOutcome {
    pub fn is_synthetic(&self) -> bool {
        matches!(
            self.data,
            LoadedData::Aggregates {
                origin: AggregateOrigin::Synthetic { .. },
                ..
            }
        )
    }
}

/// Result of probing one candidate list.
enum Probe<T> {
    Found(PathBuf, T),
    /// At least one candidate existed, none was usable.
    AllRejected,
    NotFound,
}

pub struct Loader<'a> {
    config: &'a DashboardConfig,
}

impl<'a> Loader<'a> {
    pub fn new(config: &'a DashboardConfig) -> Self {
        Self { config }
    }

    /// Resolves the dashboard's input data.
    ///
    /// # Errors
    ///
    /// Only fails when the synthetic fallback itself fails (an invalid date
    /// range in the synthetic parameters). Missing or malformed files are
    /// reported through [`LoadOutcome::notices`].
    #[tracing::instrument(skip_all)]
    pub fn load(&self) -> Result<LoadOutcome> {
        let mut notices = Vec::new();
        let policy = self.config.row_policy();

        let stations = probe(
            &self.config.station_candidates,
            SourceKind::Stations,
            &mut notices,
            |p| read_station_aggregates(p, policy),
        );
        let daily = probe(
            &self.config.daily_candidates,
            SourceKind::Daily,
            &mut notices,
            |p| read_daily_aggregates(p, policy),
        );

        let (stations, daily) = match (stations, daily) {
            (Probe::Found(stations_path, stations), Probe::Found(daily_path, daily)) => {
                info!(
                    stations = %stations_path.display(),
                    daily = %daily_path.display(),
                    "Loaded pre-aggregated tables"
                );
                return Ok(LoadOutcome {
                    data: LoadedData::Aggregates {
                        stations,
                        daily,
                        origin: AggregateOrigin::Files {
                            stations: stations_path,
                            daily: daily_path,
                        },
                    },
                    notices,
                });
            }
            (Probe::Found(found, _), daily) => {
                notices.push(LoadNotice::IncompleteAggregates { found });
                (Probe::AllRejected, daily)
            }
            (stations, Probe::Found(found, _)) => {
                notices.push(LoadNotice::IncompleteAggregates { found });
                (stations, Probe::AllRejected)
            }
            other => other,
        };

        let columns = &self.config.columns;
        let trips = probe(
            &self.config.trip_candidates,
            SourceKind::Trips,
            &mut notices,
            |p| read_trip_table(p, columns, policy),
        );

        let trips = match trips {
            Probe::Found(path, table) => {
                info!(
                    path = %path.display(),
                    rows_read = table.rows_read,
                    rows_used = table.rows_used(),
                    "Loaded raw trip table"
                );
                if !table.row_errors.is_empty() {
                    notices.push(LoadNotice::RowsDropped {
                        path,
                        dropped: table.row_errors.len(),
                    });
                }
                return Ok(LoadOutcome {
                    data: LoadedData::Trips(table),
                    notices,
                });
            }
            other => other,
        };

        for (kind, not_found) in [
            (SourceKind::Stations, matches!(stations, Probe::NotFound)),
            (SourceKind::Daily, matches!(daily, Probe::NotFound)),
            (SourceKind::Trips, matches!(trips, Probe::NotFound)),
        ] {
            if not_found {
                notices.push(LoadNotice::SourceNotFound { kind });
            }
        }

        let params = self.config.synthetic.clone();
        warn!(?params, "No usable data source, falling back to sample data");
        let (stations, daily) = generate_sample(&params)?;
        notices.push(LoadNotice::UsingSampleData);

        Ok(LoadOutcome {
            data: LoadedData::Aggregates {
                stations,
                daily,
                origin: AggregateOrigin::Synthetic { params },
            },
            notices,
        })
    }
}

/// Tries each candidate in order and returns the first that reads cleanly.
fn probe<T>(
    candidates: &[PathBuf],
    kind: SourceKind,
    notices: &mut Vec<LoadNotice>,
    read: impl Fn(&Path) -> Result<T>,
) -> Probe<T> {
    let mut any_existed = false;

    for path in candidates {
        if !path.is_file() {
            debug!(%kind, path = %path.display(), "Candidate not present");
            continue;
        }
        any_existed = true;

        match read(path) {
            Ok(value) => return Probe::Found(path.clone(), value),
            Err(e) => {
                warn!(%kind, path = %path.display(), error = %e, "Candidate rejected");
                notices.push(LoadNotice::Rejected {
                    kind,
                    path: path.clone(),
                    reason: describe(&e),
                });
            }
        }
    }

    if any_existed {
        Probe::AllRejected
    } else {
        Probe::NotFound
    }
}

fn describe(err: &PipelineError) -> String {
    match std::error::Error::source(err) {
        Some(source) => format!("{err}: {source}"),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{DEFAULT_SEED, generate_daily_series, generate_stations};
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("citibike_insights_loader_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_all_missing_falls_back_to_generator_defaults() {
        let config = DashboardConfig::with_base_dir(Path::new("/nonexistent/citibike"));
        let outcome = Loader::new(&config).load().unwrap();

        assert!(outcome.is_synthetic());
        let params = SyntheticParams::default();
        let expected_daily = generate_daily_series(params.start, params.end, DEFAULT_SEED).unwrap();
        match &outcome.data {
            LoadedData::Aggregates { stations, daily, .. } => {
                assert_eq!(stations, &generate_stations(20));
                assert_eq!(daily, &expected_daily);
            }
            LoadedData::Trips(_) => panic!("expected synthetic aggregates"),
        }
        assert_eq!(outcome.notices.last(), Some(&LoadNotice::UsingSampleData));
        assert!(outcome.notices.contains(&LoadNotice::SourceNotFound {
            kind: SourceKind::Trips
        }));
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let dir = scratch_dir("first_wins");
        let first = dir.join("first.csv");
        let second = dir.join("second.csv");
        fs::write(&first, "started_at,start_station_name\n2022-01-01 08:00:00,First\n").unwrap();
        fs::write(&second, "started_at,start_station_name\n2022-01-01 08:00:00,Second\n").unwrap();

        let config = DashboardConfig {
            station_candidates: vec![],
            daily_candidates: vec![],
            trip_candidates: vec![dir.join("missing.csv"), first.clone(), second],
            ..DashboardConfig::with_base_dir(&dir)
        };
        let outcome = Loader::new(&config).load().unwrap();
        match outcome.data {
            LoadedData::Trips(table) => {
                assert_eq!(table.source, first);
                assert_eq!(table.trips[0].start_station_name, "First");
            }
            other => panic!("expected trips, got {other:?}"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_malformed_candidate_skipped() {
        let dir = scratch_dir("malformed_skipped");
        let bad = dir.join("bad.csv");
        let good = dir.join("good.csv");
        fs::write(&bad, "ride_id,started_at\nr1,2022-01-01 08:00:00\n").unwrap();
        fs::write(&good, "started_at,start_station_name\n2022-01-01 08:00:00,Good\n").unwrap();

        let config = DashboardConfig {
            station_candidates: vec![],
            daily_candidates: vec![],
            trip_candidates: vec![bad.clone(), good.clone()],
            ..DashboardConfig::with_base_dir(&dir)
        };
        let outcome = Loader::new(&config).load().unwrap();
        assert!(matches!(outcome.data, LoadedData::Trips(ref t) if t.source == good));
        assert!(matches!(
            &outcome.notices[0],
            LoadNotice::Rejected { kind: SourceKind::Trips, path, .. } if path == &bad
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_all_candidates_malformed_falls_back_without_not_found() {
        let dir = scratch_dir("all_malformed");
        let bad = dir.join("bad.csv");
        fs::write(&bad, "started_at,start_station_name\nnope,A\n").unwrap();

        let config = DashboardConfig {
            station_candidates: vec![],
            daily_candidates: vec![],
            trip_candidates: vec![bad],
            ..DashboardConfig::with_base_dir(&dir)
        };
        let outcome = Loader::new(&config).load().unwrap();
        assert!(outcome.is_synthetic());
        assert!(!outcome.notices.contains(&LoadNotice::SourceNotFound {
            kind: SourceKind::Trips
        }));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_aggregates_preferred_over_trips() {
        let dir = scratch_dir("aggregates_preferred");
        fs::write(
            dir.join("top_20_stations.csv"),
            "start_station_name,trip_count\nA,10\nB,7\n",
        )
        .unwrap();
        fs::write(
            dir.join("daily_aggregated_data.csv"),
            "date,daily_trips,temperature\n2022-01-02,5,30.0\n2022-01-01,4,31.5\n",
        )
        .unwrap();
        fs::write(
            dir.join("trips.csv"),
            "started_at,start_station_name\n2022-01-01 08:00:00,Z\n",
        )
        .unwrap();

        let config = DashboardConfig {
            trip_candidates: vec![dir.join("trips.csv")],
            ..DashboardConfig::with_base_dir(&dir)
        };
        let outcome = Loader::new(&config).load().unwrap();
        match outcome.data {
            LoadedData::Aggregates {
                stations,
                daily,
                origin: AggregateOrigin::Files { .. },
            } => {
                assert_eq!(stations.len(), 2);
                assert_eq!(daily.len(), 2);
                assert!(daily[0].date < daily[1].date);
            }
            other => panic!("expected file aggregates, got {other:?}"),
        }
        assert!(outcome.notices.is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_lone_aggregate_file_falls_through_to_trips() {
        let dir = scratch_dir("lone_aggregate");
        let stations = dir.join("top_20_stations.csv");
        fs::write(&stations, "start_station_name,trip_count\nA,10\n").unwrap();
        fs::write(
            dir.join("trips.csv"),
            "started_at,start_station_name\n2022-01-01 08:00:00,Z\n",
        )
        .unwrap();

        let config = DashboardConfig {
            trip_candidates: vec![dir.join("trips.csv")],
            ..DashboardConfig::with_base_dir(&dir)
        };
        let outcome = Loader::new(&config).load().unwrap();
        assert!(matches!(outcome.data, LoadedData::Trips(_)));
        assert!(outcome
            .notices
            .contains(&LoadNotice::IncompleteAggregates { found: stations }));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_invalid_synthetic_range_is_fatal() {
        let mut config = DashboardConfig::with_base_dir(Path::new("/nonexistent/citibike"));
        config.synthetic.start = chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        config.synthetic.end = chrono::NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert!(Loader::new(&config).load().is_err());
    }

    #[test]
    fn test_notice_display() {
        assert_eq!(
            LoadNotice::UsingSampleData.to_string(),
            "Using sample data - CSV files not found in expected locations"
        );
        assert_eq!(
            LoadNotice::SourceNotFound {
                kind: SourceKind::Daily
            }
            .to_string(),
            "No daily table found in expected locations"
        );
    }
}
