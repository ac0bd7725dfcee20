//! Process-wide breach thresholds.
//!
//! Readers take an `Arc` snapshot under a read lock, so one evaluation always
//! sees a single fully-applied version. Updates are validated on a copy,
//! persisted, and only then swapped in; a rejected or unpersisted update
//! leaves the previous version in effect.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::monitor::types::Metric;
use crate::monitor::units::StorageUnit;
use crate::store::{Store, StoreError};

/// Breach limits for one metric. A value strictly above `max` or strictly below `min` breaches.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ThresholdBound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ThresholdBound {
    pub fn max(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn range(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    fn validate(&self, metric: Metric) -> Result<(), String> {
        if self.min.is_none() && self.max.is_none() {
            return Err(format!("{metric}: at least one of min/max is required"));
        }
        for value in [self.min, self.max].into_iter().flatten() {
            if !value.is_finite() {
                return Err(format!("{metric}: threshold must be a finite number"));
            }
            if metric.is_non_negative() && value < 0.0 {
                return Err(format!("{metric}: threshold must be >= 0"));
            }
            if metric.is_percentage() && value > 100.0 {
                return Err(format!("{metric}: threshold must be in [0,100]"));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min >= max {
                return Err(format!("{metric}: min must be < max"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdConfig {
    pub version: u32,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Unit of the `temp` and `feels_like` bounds, independent of the storage unit.
    #[serde(default)]
    pub unit: StorageUnit,
    pub limits: BTreeMap<Metric, ThresholdBound>,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let limits = BTreeMap::from([
            (Metric::Temp, ThresholdBound::max(35.0)),
            (Metric::FeelsLike, ThresholdBound::max(40.0)),
            (Metric::Pressure, ThresholdBound::range(980.0, 1040.0)),
            (Metric::Humidity, ThresholdBound::max(90.0)),
            (Metric::Rain, ThresholdBound::max(50.0)),
        ]);
        Self {
            version: 1,
            updated_at: None,
            unit: StorageUnit::Celsius,
            limits,
        }
    }
}

impl ThresholdConfig {
    pub fn get(&self, metric: Metric) -> Option<&ThresholdBound> {
        self.limits.get(&metric)
    }

    pub fn validate(&self) -> Result<(), String> {
        for (metric, bound) in &self.limits {
            bound.validate(*metric)?;
        }
        Ok(())
    }
}

/// Partial update: `Some(bound)` sets a metric, `None` removes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdUpdate {
    pub limits: BTreeMap<Metric, Option<ThresholdBound>>,
}

impl ThresholdUpdate {
    pub fn set(mut self, metric: Metric, bound: ThresholdBound) -> Self {
        self.limits.insert(metric, Some(bound));
        self
    }

    pub fn clear(mut self, metric: Metric) -> Self {
        self.limits.insert(metric, None);
        self
    }
}

#[derive(Debug, Error)]
pub enum ThresholdError {
    #[error("invalid threshold update: {0}")]
    Validation(String),
    #[error("failed to persist thresholds: {0}")]
    Store(#[from] StoreError),
}

pub struct ThresholdStore {
    current: RwLock<Arc<ThresholdConfig>>,
    store: Arc<Store>,
}

impl ThresholdStore {
    /// Load the persisted config, seeding the defaults when none exists yet.
    pub fn load(store: Arc<Store>) -> Result<Self, StoreError> {
        let config = match store.load_threshold_config()? {
            Some(config) => {
                if let Err(reason) = config.validate() {
                    tracing::warn!(%reason, version = config.version, "Persisted thresholds invalid");
                }
                config
            }
            None => {
                let config = ThresholdConfig::default();
                store.save_threshold_config(&config)?;
                config
            }
        };
        tracing::info!(version = config.version, "Threshold config loaded");

        Ok(Self {
            current: RwLock::new(Arc::new(config)),
            store,
        })
    }

    pub async fn snapshot(&self) -> Arc<ThresholdConfig> {
        self.current.read().await.clone()
    }

    /// Validate and apply `update` atomically. Updates are serialized by the write lock.
    pub async fn update(
        &self,
        update: ThresholdUpdate,
    ) -> Result<Arc<ThresholdConfig>, ThresholdError> {
        if update.limits.is_empty() {
            return Err(ThresholdError::Validation(
                "update contains no thresholds".to_string(),
            ));
        }

        let mut guard = self.current.write().await;
        let mut next = ThresholdConfig::clone(&guard);

        for (metric, bound) in update.limits {
            match bound {
                Some(bound) => {
                    next.limits.insert(metric, bound);
                }
                None => {
                    next.limits.remove(&metric);
                }
            }
        }
        next.validate().map_err(ThresholdError::Validation)?;

        next.version = guard.version.saturating_add(1);
        next.updated_at = Some(Utc::now());
        self.store.save_threshold_config(&next)?;

        let next = Arc::new(next);
        *guard = next.clone();
        tracing::info!(version = next.version, "Threshold config updated");
        Ok(next)
    }
}
