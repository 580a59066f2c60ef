//! Dashboard configuration.
//!
//! Candidate paths are tried in the order listed. A config file is plain
//! JSON; any omitted field takes its default:
//! ```json
//! {
//!   "trip_candidates": ["data/processed/nyc_citibike_2022_processed.csv"],
//!   "top_n": 20,
//!   "strict_rows": true,
//!   "synthetic": { "start": "2021-01-01", "end": "2022-12-31", "seed": 7 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::path::{Path, PathBuf};

use crate::analyzers::aggregate::DEFAULT_TOP_N;
use crate::error::{ConfigParseSnafu, ConfigReadSnafu, Result};
use crate::parser::{RowPolicy, TripColumns};
use crate::synthetic::SyntheticParams;

const STATION_FILES: &[&str] = &["top_20_stations_full.csv", "top_20_stations.csv"];
const DAILY_FILES: &[&str] = &["daily_aggregated_data_full.csv", "daily_aggregated_data.csv"];
const TRIP_FILES: &[&str] = &["nyc_citibike_2022_processed.csv", "nyc_citibike_reduced.csv"];
const MAP_FILE: &str = "nyc_bike_trips_aggregated.html";

/// Everything the pipeline needs to produce a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub station_candidates: Vec<PathBuf>,
    pub daily_candidates: Vec<PathBuf>,
    pub trip_candidates: Vec<PathBuf>,
    pub map_candidates: Vec<PathBuf>,
    pub columns: TripColumns,
    pub top_n: usize,
    /// Reject a whole file on its first malformed row instead of dropping the row.
    pub strict_rows: bool,
    /// Generator parameters. `synthetic.seed` also drives the temperatures
    /// filled in for raw trips that carry none.
    pub synthetic: SyntheticParams,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::with_base_dir(Path::new("."))
    }
}

impl DashboardConfig {
    /// Default candidate lists resolved against `base`.
    ///
    /// Pre-aggregated files are looked up next to `base`, then under
    /// `../data/processed` and `data/processed`; raw trips only under the
    /// processed-data directories.
    pub fn with_base_dir(base: &Path) -> Self {
        let processed = [base.join("../data/processed"), base.join("data/processed")];

        let aggregate_paths = |files: &[&str]| -> Vec<PathBuf> {
            let mut dirs = vec![base.to_path_buf()];
            dirs.extend(processed.iter().cloned());
            dirs.iter()
                .flat_map(|dir| files.iter().map(move |f| dir.join(f)))
                .collect()
        };

        let trip_candidates = processed
            .iter()
            .rev()
            .flat_map(|dir| TRIP_FILES.iter().map(move |f| dir.join(f)))
            .collect();

        let map_candidates = vec![
            base.join(MAP_FILE),
            base.join("notebooks").join(MAP_FILE),
            base.join("maps").join(MAP_FILE),
            base.join("../maps").join(MAP_FILE),
            base.join("../notebooks").join(MAP_FILE),
        ];

        Self {
            station_candidates: aggregate_paths(STATION_FILES),
            daily_candidates: aggregate_paths(DAILY_FILES),
            trip_candidates,
            map_candidates,
            columns: TripColumns::default(),
            top_n: DEFAULT_TOP_N,
            strict_rows: false,
            synthetic: SyntheticParams::default(),
        }
    }

    /// Loads the config from a JSON file at `path`. Relative candidate paths
    /// in the file are kept as written (resolved against the working directory).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).context(ConfigReadSnafu { path })?;
        serde_json::from_str(&content).context(ConfigParseSnafu { path })
    }

    pub fn row_policy(&self) -> RowPolicy {
        if self.strict_rows {
            RowPolicy::Reject
        } else {
            RowPolicy::Drop
        }
    }
}
