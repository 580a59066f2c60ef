use crate::analyzers::types::{DailyAggregate, StationAggregate, TripRecord};
use crate::synthetic::TemperatureModel;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Number of stations shown on the ranking page.
pub const DEFAULT_TOP_N: usize = 20;

/// Orders stations by `trip_count` descending and keeps the first `n`.
///
/// The sort is stable, so stations with equal counts keep their input order.
pub fn rank_stations(mut stations: Vec<StationAggregate>, n: usize) -> Vec<StationAggregate> {
    stations.sort_by(|a, b| b.trip_count.cmp(&a.trip_count));
    stations.truncate(n);
    stations
}

/// Counts trips per `start_station_name` and returns the `n` busiest stations.
///
/// Ties are broken by first appearance in `trips`. Empty input yields an
/// empty ranking.
pub fn compute_top_stations(trips: &[TripRecord], n: usize) -> Vec<StationAggregate> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut stations: Vec<StationAggregate> = Vec::new();

    for trip in trips {
        let name = trip.start_station_name.as_str();
        match index.get(name) {
            Some(&i) => stations[i].trip_count += 1,
            None => {
                index.insert(name, stations.len());
                stations.push(StationAggregate::new(name, 1));
            }
        }
    }

    let distinct = stations.len();
    let top = rank_stations(stations, n);
    debug!(trips = trips.len(), distinct, kept = top.len(), "Ranked stations");
    top
}

#[derive(Default)]
struct DayAccumulator {
    trips: u64,
    temperature_sum: f64,
    temperature_samples: u64,
}

/// Counts trips per calendar date and joins each date with its mean temperature.
///
/// Dates come out in ascending order with no gap filling. The mean is taken
/// over the trips of that date that carry a temperature; dates with none
/// (including every date when the source has no temperature column) get the
/// seasonal model's value for `seed`, so the temperature is never missing.
pub fn compute_daily_series(trips: &[TripRecord], seed: u64) -> Vec<DailyAggregate> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();

    for trip in trips {
        let acc = days.entry(trip.date()).or_default();
        acc.trips += 1;
        if let Some(t) = trip.temperature {
            acc.temperature_sum += t;
            acc.temperature_samples += 1;
        }
    }

    let model = TemperatureModel::new(seed);
    let mut synthesized = 0usize;

    let series: Vec<DailyAggregate> = days
        .into_iter()
        .map(|(date, acc)| {
            let temperature = if acc.temperature_samples > 0 {
                acc.temperature_sum / acc.temperature_samples as f64
            } else {
                synthesized += 1;
                model.temperature(date)
            };
            DailyAggregate {
                date,
                daily_trips: acc.trips,
                temperature,
            }
        })
        .collect();

    debug!(days = series.len(), synthesized, "Built daily series");
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn trips(counts: &[(&str, usize)]) -> Vec<TripRecord> {
        counts
            .iter()
            .flat_map(|(name, n)| (0..*n).map(move |_| TripRecord::new(*name, at(2022, 1, 1, 8))))
            .collect()
    }

    fn pairs(stations: &[StationAggregate]) -> Vec<(&str, u64)> {
        stations
            .iter()
            .map(|s| (s.start_station_name.as_str(), s.trip_count))
            .collect()
    }

    #[test]
    fn test_top_stations_empty() {
        assert!(compute_top_stations(&[], 20).is_empty());
    }

    #[test]
    fn test_top_stations_single_station_repeated() {
        let trips = trips(&[("A", 5), ("B", 3)]);
        let top = compute_top_stations(&trips, 2);
        assert_eq!(pairs(&top), vec![("A", 5), ("B", 3)]);
    }

    #[test]
    fn test_top_stations_selects_highest_descending() {
        let trips = trips(&[("low", 1), ("mid", 4), ("top", 9), ("second", 6), ("tiny", 2)]);
        let top = compute_top_stations(&trips, 3);
        assert_eq!(pairs(&top), vec![("top", 9), ("second", 6), ("mid", 4)]);
    }

    #[test]
    fn test_top_stations_tie_at_cutoff_uses_first_seen() {
        let trips = trips(&[("big", 10), ("w", 3), ("x", 3), ("y", 3), ("z", 3)]);
        let top = compute_top_stations(&trips, 3);
        assert_eq!(pairs(&top), vec![("big", 10), ("w", 3), ("x", 3)]);
    }

    #[test]
    fn test_top_stations_tie_order_follows_interleaved_first_appearance() {
        let mut input = Vec::new();
        for name in ["q", "p", "q", "r", "p", "r"] {
            input.push(TripRecord::new(name, at(2022, 1, 1, 8)));
        }
        let top = compute_top_stations(&input, 10);
        assert_eq!(pairs(&top), vec![("q", 2), ("p", 2), ("r", 2)]);
    }

    #[test]
    fn test_top_stations_n_larger_than_distinct() {
        let trips = trips(&[("A", 2), ("B", 1)]);
        assert_eq!(compute_top_stations(&trips, 20).len(), 2);
        assert!(compute_top_stations(&trips, 0).is_empty());
    }

    #[test]
    fn test_top_stations_doubling_keeps_order() {
        let trips = trips(&[("c", 2), ("a", 7), ("b", 2), ("d", 5)]);
        let first = compute_top_stations(&trips, 10);

        let expanded: Vec<TripRecord> = first
            .iter()
            .flat_map(|s| {
                (0..s.trip_count)
                    .map(move |_| TripRecord::new(s.start_station_name.clone(), at(2022, 1, 1, 8)))
            })
            .collect();
        let doubled: Vec<TripRecord> = expanded.iter().chain(expanded.iter()).cloned().collect();
        let second = compute_top_stations(&doubled, 10);

        let names = |v: &[StationAggregate]| {
            v.iter()
                .map(|s| s.start_station_name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
        for (a, b) in first.iter().zip(&second) {
            assert_eq!(b.trip_count, a.trip_count * 2);
        }
    }

    #[test]
    fn test_daily_series_empty() {
        assert!(compute_daily_series(&[], 42).is_empty());
    }

    #[test]
    fn test_daily_series_one_row_per_date_sorted() {
        let trips = vec![
            TripRecord::new("A", at(2022, 3, 2, 9)),
            TripRecord::new("B", at(2022, 3, 1, 23)),
            TripRecord::new("A", at(2022, 3, 2, 18)),
            TripRecord::new("C", at(2022, 3, 5, 7)),
        ];
        let series = compute_daily_series(&trips, 42);
        let dates: Vec<_> = series.iter().map(|d| (d.date, d.daily_trips)).collect();
        assert_eq!(
            dates,
            vec![
                (NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(), 1),
                (NaiveDate::from_ymd_opt(2022, 3, 2).unwrap(), 2),
                (NaiveDate::from_ymd_opt(2022, 3, 5).unwrap(), 1),
            ]
        );
        let total: u64 = series.iter().map(|d| d.daily_trips).sum();
        assert_eq!(total, trips.len() as u64);
    }

    #[test]
    fn test_daily_series_mean_temperature() {
        let trips = vec![
            TripRecord::new("A", at(2022, 7, 1, 9)).with_temperature(80.0),
            TripRecord::new("A", at(2022, 7, 1, 10)).with_temperature(70.0),
            TripRecord::new("A", at(2022, 7, 1, 11)),
        ];
        let series = compute_daily_series(&trips, 42);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].daily_trips, 3);
        assert_eq!(series[0].temperature, 75.0);
    }

    #[test]
    fn test_daily_series_synthesizes_missing_temperature() {
        let trips = vec![
            TripRecord::new("A", at(2022, 1, 10, 9)),
            TripRecord::new("A", at(2022, 1, 11, 9)),
        ];
        let series = compute_daily_series(&trips, 42);
        let model = TemperatureModel::new(42);
        for row in &series {
            assert!(row.temperature.is_finite());
            assert_eq!(row.temperature, model.temperature(row.date));
        }
        assert_eq!(series, compute_daily_series(&trips, 42));
    }
}
