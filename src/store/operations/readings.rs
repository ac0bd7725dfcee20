use chrono::{DateTime, Utc};

use crate::monitor::types::Reading;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    /// Insert or replace the reading for `(timestamp, city)`. Last write wins.
    pub fn upsert_reading(&self, reading: &Reading) -> Result<(), StoreError> {
        let key = keys::reading_key(reading.timestamp, &reading.city);
        self.readings
            .insert(key.as_bytes(), Self::serialize(reading)?)?;
        Ok(())
    }

    /// Readings with `from <= timestamp < to`, oldest first, optionally for one city.
    pub fn query_readings(
        &self,
        city: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        if from >= to {
            return Ok(Vec::new());
        }

        let start = keys::reading_lower_bound(from);
        let end = keys::reading_lower_bound(to);
        let mut readings = Vec::new();

        for item in self.readings.range(start.as_bytes()..end.as_bytes()) {
            let (_, raw) = item?;
            let reading: Reading = match Self::deserialize(&raw) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping undecodable reading");
                    continue;
                }
            };
            if city.map_or(true, |c| reading.city == c) {
                readings.push(reading);
            }
        }

        Ok(readings)
    }

    /// Delete every reading with `timestamp < cutoff` in one atomic batch.
    pub fn delete_readings_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let end = keys::reading_lower_bound(cutoff);
        let mut batch = sled::Batch::default();
        let mut removed = 0usize;

        for item in self.readings.range(..end.as_bytes()) {
            let (key, _) = item?;
            batch.remove(key);
            removed += 1;
        }

        if removed > 0 {
            self.readings.apply_batch(batch)?;
        }
        Ok(removed)
    }

    pub fn count_readings(&self) -> usize {
        self.readings.len()
    }
}
