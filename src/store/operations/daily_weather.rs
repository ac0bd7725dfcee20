use chrono::NaiveDate;

use crate::monitor::types::DailyAggregate;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Write the rollup row for `(date, city)`, replacing any previous one.
    pub fn upsert_daily_aggregate(&self, aggregate: &DailyAggregate) -> Result<(), StoreError> {
        let key = keys::daily_key(aggregate.date, &aggregate.city);
        self.daily_weather
            .insert(key.as_bytes(), Self::serialize(aggregate)?)?;
        Ok(())
    }

    pub fn get_daily_aggregate(
        &self,
        date: NaiveDate,
        city: &str,
    ) -> Result<Option<DailyAggregate>, StoreError> {
        let key = keys::daily_key(date, city);
        match self.daily_weather.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// Rollups with `from_date <= date <= to_date`, ordered by date then city.
    pub fn query_daily_aggregates(
        &self,
        city: Option<&str>,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        if from_date > to_date {
            return Ok(Vec::new());
        }

        let start = keys::daily_lower_bound(from_date);
        let mut rows = Vec::new();

        for item in self.daily_weather.range(start.as_bytes()..) {
            let (_, raw) = item?;
            let row: DailyAggregate = Self::deserialize(&raw)?;
            if row.date > to_date {
                break;
            }
            if city.map_or(true, |c| row.city == c) {
                rows.push(row);
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use crate::monitor::units::StorageUnit;

    use super::*;

    fn row(date: NaiveDate, city: &str, avg: f64) -> DailyAggregate {
        DailyAggregate {
            date,
            city: city.to_string(),
            avg_temp: avg,
            max_temp: avg + 5.0,
            min_temp: avg - 5.0,
            dominant_condition: "Clouds".to_string(),
            reading_count: 3,
            unit: StorageUnit::Celsius,
        }
    }

    #[test]
    fn upsert_overwrites_and_query_filters() {
        let store = Store::temporary().unwrap();
        let d1 = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();

        store.upsert_daily_aggregate(&row(d1, "Delhi", 20.0)).unwrap();
        store.upsert_daily_aggregate(&row(d1, "Delhi", 22.0)).unwrap();
        store.upsert_daily_aggregate(&row(d2, "Mumbai", 27.0)).unwrap();
        store.upsert_daily_aggregate(&row(d3, "Delhi", 24.0)).unwrap();

        let all = store.query_daily_aggregates(None, d1, d2).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].avg_temp, 22.0);
        assert_eq!(all[1].city, "Mumbai");

        let delhi = store.query_daily_aggregates(Some("Delhi"), d1, d3).unwrap();
        let dates: Vec<NaiveDate> = delhi.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d1, d3]);

        assert!(store.get_daily_aggregate(d2, "Delhi").unwrap().is_none());
    }
}
