//! Loader → Aggregator composition.
//!
//! [`Dashboard`] is what the presentation layer renders. It does not expose
//! whether its tables came from raw trips, aggregate files or the generator
//! beyond the informational [`DataOrigin`] and notices.

use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::analyzers::aggregate::{compute_daily_series, compute_top_stations, rank_stations};
use crate::analyzers::types::{DailyAggregate, Season, StationAggregate};
use crate::config::DashboardConfig;
use crate::error::Result;
use crate::loader::{AggregateOrigin, LoadNotice, LoadOutcome, LoadedData, Loader};
use crate::synthetic::SyntheticParams;

/// How the dashboard's tables were produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataOrigin {
    RawTrips {
        path: PathBuf,
        rows_read: usize,
        rows_used: usize,
    },
    AggregateFiles {
        stations: PathBuf,
        daily: PathBuf,
    },
    Synthetic {
        params: SyntheticParams,
    },
}

/// The two reporting tables plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub top_stations: Vec<StationAggregate>,
    pub daily: Vec<DailyAggregate>,
    pub origin: DataOrigin,
    pub notices: Vec<LoadNotice>,
}

impl Dashboard {
    /// Aggregates raw trips if needed; aggregate tables pass through with
    /// only the top-N cut applied.
    pub fn from_outcome(outcome: LoadOutcome, top_n: usize, seed: u64) -> Self {
        let LoadOutcome { data, notices } = outcome;

        match data {
            LoadedData::Trips(table) => Dashboard {
                top_stations: compute_top_stations(&table.trips, top_n),
                daily: compute_daily_series(&table.trips, seed),
                origin: DataOrigin::RawTrips {
                    rows_read: table.rows_read,
                    rows_used: table.rows_used(),
                    path: table.source,
                },
                notices,
            },
            LoadedData::Aggregates {
                stations,
                daily,
                origin,
            } => Dashboard {
                top_stations: rank_stations(stations, top_n),
                daily,
                origin: match origin {
                    AggregateOrigin::Files { stations, daily } => {
                        DataOrigin::AggregateFiles { stations, daily }
                    }
                    AggregateOrigin::Synthetic { params } => DataOrigin::Synthetic { params },
                },
                notices,
            },
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.origin, DataOrigin::Synthetic { .. })
    }

    /// Daily rows restricted to the given months and seasons. An empty
    /// selection does not filter.
    pub fn filtered_daily(&self, months: &[u32], seasons: &[Season]) -> Vec<DailyAggregate> {
        use chrono::Datelike;

        self.daily
            .iter()
            .filter(|d| months.is_empty() || months.contains(&d.date.month()))
            .filter(|d| seasons.is_empty() || seasons.contains(&d.season()))
            .cloned()
            .collect()
    }
}

/// Runs the whole pipeline for `config`.
#[tracing::instrument(skip_all, fields(top_n = config.top_n))]
pub fn build_dashboard(config: &DashboardConfig) -> Result<Dashboard> {
    let outcome = Loader::new(config).load()?;
    let dashboard = Dashboard::from_outcome(outcome, config.top_n, config.synthetic.seed);

    info!(
        stations = dashboard.top_stations.len(),
        days = dashboard.daily.len(),
        synthetic = dashboard.is_synthetic(),
        "Dashboard data ready"
    );
    Ok(dashboard)
}
