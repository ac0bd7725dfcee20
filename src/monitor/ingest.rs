//! One ingestion tick: fetch every configured city concurrently, normalize,
//! persist, evaluate thresholds, then prune the rolling window.
//!
//! Per city: `Fetching -> Normalizing -> Persisted -> Evaluated`, or back to
//! idle as failed when the fetch fails. The tick reaches `Pruned` once every
//! city has settled either way.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::config::Config;
use crate::constants::UNKNOWN_CONDITION;
use crate::monitor::evaluator;
use crate::monitor::retention::{self, retention_window};
use crate::monitor::types::{Observation, Reading};
use crate::monitor::units::StorageUnit;
use crate::shutdown::Shutdown;
use crate::source::FetchError;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub storage_unit: StorageUnit,
    pub max_concurrency: usize,
    pub fetch_timeout: Duration,
    pub fetch_max_retries: u32,
    pub store_max_retries: u32,
    pub retry_backoff: Duration,
    pub retention: chrono::Duration,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            storage_unit: config.storage_unit,
            max_concurrency: config.worker.max_concurrency.max(1),
            fetch_timeout: config.worker.fetch_timeout(),
            fetch_max_retries: config.worker.fetch_max_retries,
            store_max_retries: config.worker.store_max_retries,
            retry_backoff: config.worker.retry_backoff(),
            retention: retention_window(),
        }
    }
}

/// Last stage a city reached within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CityStage {
    Fetching,
    Normalizing,
    Persisted,
    Evaluated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CityOutcome {
    Evaluated { alerts: usize, alerts_failed: usize },
    FetchFailed { error: String, transient: bool },
    StoreFailed { error: String },
    Abandoned { stage: CityStage },
}

#[derive(Debug, Clone, Serialize)]
pub struct CityResult {
    pub city: String,
    pub outcome: CityOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub cities: Vec<CityResult>,
    /// `None` when pruning itself failed.
    pub pruned: Option<usize>,
}

impl TickReport {
    pub fn succeeded(&self) -> usize {
        self.cities
            .iter()
            .filter(|c| matches!(c.outcome, CityOutcome::Evaluated { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.cities.len() - self.succeeded()
    }

    pub fn alerts_raised(&self) -> usize {
        self.cities
            .iter()
            .map(|c| match c.outcome {
                CityOutcome::Evaluated { alerts, .. } => alerts,
                _ => 0,
            })
            .sum()
    }

    /// Some city or the prune step did not fully complete.
    pub fn is_partial_failure(&self) -> bool {
        self.pruned.is_none()
            || self.cities.iter().any(|c| match c.outcome {
                CityOutcome::Evaluated { alerts_failed, .. } => alerts_failed > 0,
                _ => true,
            })
    }

    pub fn outcome_for(&self, city: &str) -> Option<&CityOutcome> {
        self.cities.iter().find(|c| c.city == city).map(|c| &c.outcome)
    }
}

/// Convert a source observation into a storable reading.
///
/// Timestamps are truncated to whole seconds; temperatures move from Kelvin
/// to the storage unit.
pub fn normalize(observation: Observation, unit: StorageUnit) -> Reading {
    let timestamp = DateTime::<Utc>::from_timestamp(observation.timestamp.timestamp(), 0)
        .unwrap_or(observation.timestamp);
    let condition = match observation.condition.trim() {
        "" => UNKNOWN_CONDITION.to_string(),
        label => label.to_string(),
    };

    Reading {
        timestamp,
        city: observation.city,
        temp: unit.from_kelvin(observation.temp_kelvin),
        feels_like: unit.from_kelvin(observation.feels_like_kelvin),
        pressure: observation.pressure,
        humidity: observation.humidity,
        rain: observation.rain,
        clouds: observation.clouds,
        condition,
        unit,
    }
}

/// Run `attempt` until it succeeds, fails with a non-retryable error, or
/// `max_retries` retries are spent. The delay doubles after every failure.
pub async fn with_retries<T, E, F, Fut>(
    what: &str,
    max_retries: u32,
    backoff: Duration,
    mut attempt: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut retries = 0u32;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if retries < max_retries && is_retryable(&e) => {
                let delay = backoff.saturating_mul(2u32.saturating_pow(retries));
                tracing::warn!(
                    what,
                    error = %e,
                    retry = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Retrying after failure"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn store_error_is_retryable(error: &StoreError) -> bool {
    matches!(error, StoreError::Sled(_))
}

async fn fetch_with_policy(
    state: &AppState,
    settings: &IngestSettings,
    city: &str,
) -> Result<Observation, FetchError> {
    with_retries(
        "fetch",
        settings.fetch_max_retries,
        settings.retry_backoff,
        || async {
            match tokio::time::timeout(settings.fetch_timeout, state.source().fetch(city)).await {
                Ok(result) => result,
                Err(_) => Err(FetchError::Transient(format!(
                    "timed out after {}s",
                    settings.fetch_timeout.as_secs()
                ))),
            }
        },
        FetchError::is_transient,
    )
    .await
}

async fn ingest_city_inner(
    state: &AppState,
    settings: &IngestSettings,
    city: &str,
    stage: &mut CityStage,
) -> CityOutcome {
    *stage = CityStage::Fetching;
    let observation = match fetch_with_policy(state, settings, city).await {
        Ok(obs) => obs,
        Err(e) => {
            tracing::warn!(city, error = %e, "Fetch failed, city skipped for this tick");
            return CityOutcome::FetchFailed {
                transient: e.is_transient(),
                error: e.to_string(),
            };
        }
    };

    *stage = CityStage::Normalizing;
    let mut reading = normalize(observation, settings.storage_unit);
    if reading.city != city {
        tracing::debug!(city, reported = %reading.city, "Source reported a different city name");
        reading.city = city.to_string();
    }

    let store = state.store();
    let persisted = with_retries(
        "upsert_reading",
        settings.store_max_retries,
        settings.retry_backoff,
        || async { store.upsert_reading(&reading) },
        store_error_is_retryable,
    )
    .await;
    if let Err(e) = persisted {
        tracing::error!(city, error = %e, "Failed to store reading, dropping city result");
        return CityOutcome::StoreFailed {
            error: e.to_string(),
        };
    }
    *stage = CityStage::Persisted;

    // One snapshot per reading, never per metric.
    let snapshot = state.thresholds().snapshot().await;
    let events = evaluator::evaluate(&reading, &snapshot);

    let mut alerts = 0usize;
    let mut alerts_failed = 0usize;
    for event in &events {
        let appended = with_retries(
            "append_alert",
            settings.store_max_retries,
            settings.retry_backoff,
            || async { store.append_alert(event) },
            store_error_is_retryable,
        )
        .await;
        match appended {
            Ok(()) => {
                alerts += 1;
                tracing::info!(
                    city,
                    trigger = %event.trigger,
                    value = event.value,
                    threshold = event.threshold,
                    "Threshold breached"
                );
            }
            Err(e) => {
                alerts_failed += 1;
                tracing::error!(city, trigger = %event.trigger, error = %e, "Failed to record alert");
            }
        }
    }
    *stage = CityStage::Evaluated;

    CityOutcome::Evaluated {
        alerts,
        alerts_failed,
    }
}

/// Ingest one city. Cancellation is honoured at every suspension point;
/// writes themselves are single atomic inserts, so abandoning never leaves a partial row.
///
/// Takes everything by value so the future is `'static` and can be fanned
/// out or spawned freely.
pub async fn ingest_city(
    state: AppState,
    settings: Arc<IngestSettings>,
    city: String,
    shutdown: Shutdown,
) -> CityResult {
    let mut stage = CityStage::Fetching;
    let outcome = tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        outcome = ingest_city_inner(&state, &settings, &city, &mut stage) => Some(outcome),
    };

    let outcome = outcome.unwrap_or_else(|| {
        tracing::warn!(city = %city, ?stage, "City ingestion abandoned on shutdown");
        CityOutcome::Abandoned { stage }
    });

    CityResult { city, outcome }
}

/// Run one ingestion tick over the configured cities.
///
/// Registers with the day barrier for its whole duration, so a running
/// rollup delays (never drops) the tick. Retention runs after every city has
/// settled, whatever their outcome.
pub async fn run_tick(state: &AppState, now: DateTime<Utc>) -> TickReport {
    let settings = Arc::new(IngestSettings::from_config(state.config()));
    let shutdown = state.shutdown_rx();
    let day = now.with_timezone(&state.config().local_offset()).date_naive();

    let _permit = state.barrier().begin_tick(day).await;
    tracing::debug!(%day, cities = state.config().cities.len(), "Ingestion tick started");

    let cities: Vec<CityResult> = stream::iter(state.config().cities.clone())
        .map({
            let state = state.clone();
            let settings = settings.clone();
            move |city| ingest_city(state.clone(), settings.clone(), city, shutdown.clone())
        })
        .buffer_unordered(settings.max_concurrency)
        .collect()
        .await;

    let pruned = match retention::prune_expired(state.store(), now, settings.retention) {
        Ok(removed) => Some(removed),
        Err(e) => {
            tracing::error!(error = %e, "Retention pruning failed");
            None
        }
    };

    let report = TickReport {
        started_at: now,
        cities,
        pruned,
    };

    if report.is_partial_failure() {
        tracing::warn!(
            ok = report.succeeded(),
            failed = report.failed(),
            alerts = report.alerts_raised(),
            pruned = ?report.pruned,
            "Ingestion tick partially failed"
        );
    } else {
        tracing::info!(
            ok = report.succeeded(),
            alerts = report.alerts_raised(),
            pruned = ?report.pruned,
            "Ingestion tick complete"
        );
    }

    report
}
