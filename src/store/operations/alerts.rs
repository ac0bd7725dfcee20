use chrono::{DateTime, Utc};

use crate::monitor::types::AlertEvent;
use crate::store::keys;
use crate::store::{Store, StoreError};

impl Store {
    pub fn append_alert(&self, event: &AlertEvent) -> Result<(), StoreError> {
        let key = keys::alert_key(event.timestamp, &event.id);
        // Identifiers are generated per event; an existing key means a caller reused one.
        let previous = self.alert_events.compare_and_swap(
            key.as_bytes(),
            None as Option<&[u8]>,
            Some(Self::serialize(event)?),
        )?;
        if previous.is_err() {
            return Err(StoreError::Validation(format!(
                "alert event {} already recorded",
                event.id
            )));
        }
        Ok(())
    }

    /// Alerts with `from <= timestamp < to`, oldest first, optionally for one city.
    pub fn query_alerts(
        &self,
        city: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        if from >= to {
            return Ok(Vec::new());
        }

        let start = keys::alert_lower_bound(from);
        let end = keys::alert_lower_bound(to);
        let mut events = Vec::new();

        for item in self.alert_events.range(start.as_bytes()..end.as_bytes()) {
            let (_, raw) = item?;
            let event: AlertEvent = Self::deserialize(&raw)?;
            if city.map_or(true, |c| event.city == c) {
                events.push(event);
            }
        }

        Ok(events)
    }

    pub fn count_alerts(&self) -> usize {
        self.alert_events.len()
    }
}
