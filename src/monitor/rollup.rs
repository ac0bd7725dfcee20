//! Daily rollup: one `DailyAggregate` per city for a closed local day.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::monitor::ingest::{with_retries, IngestSettings};
use crate::monitor::types::{DailyAggregate, Reading};
use crate::monitor::units::StorageUnit;
use crate::state::AppState;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Default, Serialize)]
pub struct RollupReport {
    pub date: Option<NaiveDate>,
    pub written: Vec<String>,
    pub failed: Vec<(String, String)>,
    /// Configured cities with no readings for the day; no row is written for them.
    pub without_data: Vec<String>,
}

/// UTC half-open window `[start, end)` covering `day` at `offset`.
pub fn local_day_window(day: NaiveDate, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let start = (day.and_time(NaiveTime::MIN) - shift).and_utc();
    (start, start + Duration::days(1))
}

/// The local day that most recently closed as of `now`.
pub fn previous_local_day(now: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    let today = now.with_timezone(&offset).date_naive();
    today.pred_opt().unwrap_or(today)
}

/// Most frequent label; ties go to whichever label appeared first.
pub fn dominant_condition<'a>(labels: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for label in labels {
        match counts.iter_mut().find(|(seen, _)| *seen == label) {
            Some((_, n)) => *n += 1,
            None => counts.push((label, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (label, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((label, n));
        }
    }
    best.map(|(label, _)| label.to_string())
}

/// Aggregate one city's readings for `date`. `None` when there are none.
///
/// Readings are folded in timestamp order, so identical inputs always produce
/// bit-identical rows.
pub fn aggregate_city(
    date: NaiveDate,
    city: &str,
    readings: &[&Reading],
    unit: StorageUnit,
) -> Option<DailyAggregate> {
    let mut ordered: Vec<&Reading> = readings.to_vec();
    ordered.sort_by_key(|r| r.timestamp);

    let temps: Vec<f64> = ordered.iter().map(|r| unit.convert(r.temp, r.unit)).collect();
    if temps.is_empty() {
        return None;
    }

    let sum: f64 = temps.iter().sum();
    let max_temp = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min_temp = temps.iter().copied().fold(f64::INFINITY, f64::min);
    let dominant = dominant_condition(ordered.iter().map(|r| r.condition.as_str()))?;

    Some(DailyAggregate {
        date,
        city: city.to_string(),
        avg_temp: sum / temps.len() as f64,
        max_temp,
        min_temp,
        dominant_condition: dominant,
        reading_count: u32::try_from(temps.len()).unwrap_or(u32::MAX),
        unit,
    })
}

/// Group a day's readings by city and aggregate each group.
pub fn aggregate_day(date: NaiveDate, readings: &[Reading], unit: StorageUnit) -> Vec<DailyAggregate> {
    let mut by_city: BTreeMap<&str, Vec<&Reading>> = BTreeMap::new();
    for reading in readings {
        by_city.entry(reading.city.as_str()).or_default().push(reading);
    }

    by_city
        .into_iter()
        .filter_map(|(city, group)| aggregate_city(date, city, &group, unit))
        .collect()
}

async fn write_aggregate(
    store: Arc<Store>,
    settings: Arc<IngestSettings>,
    aggregate: DailyAggregate,
) -> (String, Result<(), StoreError>) {
    let written = with_retries(
        "upsert_daily_aggregate",
        settings.store_max_retries,
        settings.retry_backoff,
        || async { store.upsert_daily_aggregate(&aggregate) },
        |e: &StoreError| matches!(e, StoreError::Sled(_)),
    )
    .await;
    (aggregate.city, written)
}

/// Roll up `day` for every city that has readings.
///
/// Waits on the day barrier until no ingestion tick for `day` is in flight,
/// then holds it while reading. Each city's row is written independently;
/// a failed write is reported and does not stop the others. Re-running for
/// the same day overwrites rows with identical values.
pub async fn run_for_day(state: &AppState, day: NaiveDate) -> Result<RollupReport, StoreError> {
    let settings = Arc::new(IngestSettings::from_config(state.config()));
    let (from, to) = local_day_window(day, state.config().local_offset());

    let _permit = state.barrier().begin_rollup(day).await;
    tracing::info!(%day, %from, %to, "Rollup started");

    let readings = state.store().query_readings(None, from, to)?;
    let aggregates = aggregate_day(day, &readings, settings.storage_unit);

    let without_data: Vec<String> = state
        .config()
        .cities
        .iter()
        .filter(|c| !aggregates.iter().any(|a| &a.city == *c))
        .cloned()
        .collect();

    let results: Vec<(String, Result<(), StoreError>)> = stream::iter(aggregates)
        .map({
            let store = Arc::clone(state.store());
            let settings = settings.clone();
            move |aggregate| write_aggregate(Arc::clone(&store), settings.clone(), aggregate)
        })
        .buffer_unordered(settings.max_concurrency)
        .collect()
        .await;

    let mut report = RollupReport {
        date: Some(day),
        ..RollupReport::default()
    };
    for (city, result) in results {
        match result {
            Ok(()) => report.written.push(city),
            Err(e) => {
                tracing::error!(%day, city = %city, error = %e, "Failed to write daily aggregate");
                report.failed.push((city, e.to_string()));
            }
        }
    }
    report.written.sort();
    report.without_data = without_data;

    if !report.without_data.is_empty() {
        tracing::warn!(%day, cities = ?report.without_data, "No readings for day, no aggregate written");
    }
    tracing::info!(
        %day,
        written = report.written.len(),
        failed = report.failed.len(),
        readings = readings.len(),
        "Rollup complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn reading(city: &str, minute: u32, temp: f64, condition: &str) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 10, minute, 0).unwrap(),
            city: city.to_string(),
            temp,
            feels_like: temp,
            pressure: 1010.0,
            humidity: 40.0,
            rain: 0.0,
            clouds: 10.0,
            condition: condition.to_string(),
            unit: StorageUnit::Celsius,
        }
    }

    #[test]
    fn computes_mean_max_min() {
        let readings = vec![
            reading("Delhi", 0, 20.0, "Clear"),
            reading("Delhi", 5, 25.0, "Clear"),
            reading("Delhi", 10, 15.0, "Clear"),
        ];
        let rows = aggregate_day(day(), &readings, StorageUnit::Celsius);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.avg_temp, 20.0);
        assert_eq!(row.max_temp, 25.0);
        assert_eq!(row.min_temp, 15.0);
        assert_eq!(row.reading_count, 3);
    }

    #[test]
    fn dominant_condition_majority_and_tie() {
        assert_eq!(dominant_condition(["Rain", "Rain", "Clear"]).as_deref(), Some("Rain"));
        assert_eq!(dominant_condition(["Rain", "Clear"]).as_deref(), Some("Rain"));
        assert_eq!(dominant_condition(["Clear", "Rain", "Rain", "Clear"]).as_deref(), Some("Clear"));
        assert_eq!(dominant_condition(Vec::<&str>::new()), None);
    }

    #[test]
    fn tie_break_follows_timestamp_order_not_input_order() {
        let readings = vec![reading("Delhi", 30, 20.0, "Clear"), reading("Delhi", 0, 20.0, "Rain")];
        let rows = aggregate_day(day(), &readings, StorageUnit::Celsius);
        assert_eq!(rows[0].dominant_condition, "Rain");
    }

    #[test]
    fn cities_are_aggregated_separately() {
        let readings = vec![
            reading("Mumbai", 0, 30.0, "Haze"),
            reading("Delhi", 0, 40.0, "Clear"),
            reading("Mumbai", 5, 32.0, "Rain"),
        ];
        let rows = aggregate_day(day(), &readings, StorageUnit::Celsius);
        let cities: Vec<&str> = rows.iter().map(|r| r.city.as_str()).collect();
        assert_eq!(cities, ["Delhi", "Mumbai"]);
        assert_eq!(rows[1].avg_temp, 31.0);
        assert_eq!(rows[1].dominant_condition, "Haze");
    }

    #[test]
    fn no_readings_no_rows() {
        assert!(aggregate_day(day(), &[], StorageUnit::Celsius).is_empty());
    }

    #[test]
    fn mixed_units_are_normalized_to_target() {
        let mut hot = reading("Delhi", 0, 212.0, "Clear");
        hot.unit = StorageUnit::Fahrenheit;
        let readings = vec![hot, reading("Delhi", 5, 0.0, "Clear")];
        let rows = aggregate_day(day(), &readings, StorageUnit::Celsius);
        assert!((rows[0].max_temp - 100.0).abs() < 1e-9);
        assert!((rows[0].avg_temp - 50.0).abs() < 1e-9);
    }

    #[test]
    fn local_day_window_respects_offset() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        let (from, to) = local_day_window(day(), ist);
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 5, 31, 18, 30, 0).unwrap());
        assert_eq!(to - from, Duration::days(1));
    }

    #[test]
    fn previous_day_is_computed_in_local_time() {
        let ist = FixedOffset::east_opt(330 * 60).unwrap();
        // 2024-06-01 18:31 UTC is 2024-06-02 00:01 IST.
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 18, 31, 0).unwrap();
        assert_eq!(previous_local_day(now, ist), day());
        assert_eq!(
            previous_local_day(now, FixedOffset::east_opt(0).unwrap()),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()
        );
    }

    proptest! {
        #[test]
        fn aggregate_bounds_hold(
            samples in prop::collection::vec((-60.0f64..60.0, 0usize..3), 1..40)
        ) {
            let labels = ["Clear", "Rain", "Clouds"];
            let readings: Vec<Reading> = samples
                .iter()
                .enumerate()
                .map(|(i, (t, c))| {
                    let mut r = reading("Delhi", 0, *t, labels[*c]);
                    r.timestamp += Duration::seconds(i as i64);
                    r
                })
                .collect();

            let rows = aggregate_day(day(), &readings, StorageUnit::Celsius);
            prop_assert_eq!(rows.len(), 1);
            let row = &rows[0];
            prop_assert!(row.min_temp <= row.avg_temp + 1e-9);
            prop_assert!(row.avg_temp <= row.max_temp + 1e-9);
            prop_assert_eq!(row.reading_count as usize, samples.len());

            let count = |label: &str| readings.iter().filter(|r| r.condition == label).count();
            let top = labels.iter().map(|l| count(l)).max().unwrap_or(0);
            prop_assert_eq!(count(&row.dominant_condition), top);

            let again = aggregate_day(day(), &readings, StorageUnit::Celsius);
            prop_assert_eq!(&rows, &again);
        }
    }
}
