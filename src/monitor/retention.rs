use chrono::{DateTime, Duration, Utc};

use crate::constants::RETENTION_HOURS;
use crate::store::{Store, StoreError};

pub fn retention_window() -> Duration {
    Duration::hours(RETENTION_HOURS)
}

/// Delete raw readings older than `now - window`, across all cities, in one batch.
///
/// Anything that old belongs to a day whose rollup has already run, so this
/// never removes data a pending rollup still needs.
pub fn prune_expired(store: &Store, now: DateTime<Utc>, window: Duration) -> Result<usize, StoreError> {
    let cutoff = now - window;
    let removed = store.delete_readings_older_than(cutoff)?;
    if removed > 0 {
        tracing::info!(removed, %cutoff, "Retention: pruned expired readings");
    } else {
        tracing::debug!(%cutoff, "Retention: nothing to prune");
    }
    Ok(removed)
}
