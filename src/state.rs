use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::config::Config;
use crate::monitor::barrier::DayBarrier;
use crate::monitor::retention::retention_window;
use crate::monitor::thresholds::{ThresholdConfig, ThresholdError, ThresholdStore, ThresholdUpdate};
use crate::monitor::types::{AlertEvent, DailyAggregate, Reading};
use crate::shutdown::{Shutdown, ShutdownTrigger};
use crate::source::ReadingSource;
use crate::store::{Store, StoreError};

/// Everything the scheduled jobs and the outer API layer share.
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    thresholds: Arc<ThresholdStore>,
    source: Arc<dyn ReadingSource>,
    barrier: Arc<DayBarrier>,
    config: Arc<Config>,
    shutdown: ShutdownTrigger,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        thresholds: Arc<ThresholdStore>,
        source: Arc<dyn ReadingSource>,
        config: &Config,
        shutdown: ShutdownTrigger,
    ) -> Self {
        Self {
            store,
            thresholds,
            source,
            barrier: Arc::new(DayBarrier::new()),
            config: Arc::new(config.clone()),
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    pub fn source(&self) -> &dyn ReadingSource {
        self.source.as_ref()
    }

    pub fn barrier(&self) -> &DayBarrier {
        &self.barrier
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> Shutdown {
        self.shutdown.subscribe()
    }

    pub fn shutdown_trigger(&self) -> &ShutdownTrigger {
        &self.shutdown
    }

    /// Alert listing, oldest first.
    pub fn list_alerts(
        &self,
        city: Option<&str>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        self.store.query_alerts(city, from, to)
    }

    /// Daily statistics, ordered by date.
    pub fn daily_statistics(
        &self,
        city: Option<&str>,
        from_date: NaiveDate,
        to_date: NaiveDate,
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        self.store.query_daily_aggregates(city, from_date, to_date)
    }

    /// The live rolling window ("last 24h" view).
    pub fn recent_readings(
        &self,
        city: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reading>, StoreError> {
        self.store
            .query_readings(city, now - retention_window(), now + chrono::Duration::seconds(1))
    }

    pub async fn threshold_snapshot(&self) -> Arc<ThresholdConfig> {
        self.thresholds.snapshot().await
    }

    pub async fn update_thresholds(
        &self,
        update: ThresholdUpdate,
    ) -> Result<Arc<ThresholdConfig>, ThresholdError> {
        self.thresholds.update(update).await
    }
}
