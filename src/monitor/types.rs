use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::monitor::units::StorageUnit;

/// Metrics a reading carries and a threshold can be set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temp,
    FeelsLike,
    Pressure,
    Humidity,
    Rain,
    Clouds,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::Temp,
        Metric::FeelsLike,
        Metric::Pressure,
        Metric::Humidity,
        Metric::Rain,
        Metric::Clouds,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temp => "temp",
            Self::FeelsLike => "feels_like",
            Self::Pressure => "pressure",
            Self::Humidity => "humidity",
            Self::Rain => "rain",
            Self::Clouds => "clouds",
        }
    }

    /// Metrics expressed as a 0..=100 percentage.
    pub fn is_percentage(self) -> bool {
        matches!(self, Self::Humidity | Self::Clouds)
    }

    pub fn is_temperature(self) -> bool {
        matches!(self, Self::Temp | Self::FeelsLike)
    }

    /// Metrics that cannot be negative.
    pub fn is_non_negative(self) -> bool {
        matches!(
            self,
            Self::Pressure | Self::Humidity | Self::Rain | Self::Clouds
        )
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

/// Snapshot as delivered by a reading source: absolute temperatures in Kelvin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub temp_kelvin: f64,
    pub feels_like_kelvin: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub rain: f64,
    pub clouds: f64,
    pub condition: String,
}

/// One stored telemetry sample. Identity is `(timestamp, city)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub city: String,
    pub temp: f64,
    pub feels_like: f64,
    pub pressure: f64,
    pub humidity: f64,
    pub rain: f64,
    pub clouds: f64,
    pub condition: String,
    #[serde(default)]
    pub unit: StorageUnit,
}

impl Reading {
    pub fn metric(&self, metric: Metric) -> Option<f64> {
        let value = match metric {
            Metric::Temp => self.temp,
            Metric::FeelsLike => self.feels_like,
            Metric::Pressure => self.pressure,
            Metric::Humidity => self.humidity,
            Metric::Rain => self.rain,
            Metric::Clouds => self.clouds,
        };
        value.is_finite().then_some(value)
    }
}

/// Rollup of one city's readings for one local day. Identity is `(date, city)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub city: String,
    pub avg_temp: f64,
    pub max_temp: f64,
    pub min_temp: f64,
    pub dominant_condition: String,
    pub reading_count: u32,
    #[serde(default)]
    pub unit: StorageUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachKind {
    Above,
    Below,
}

/// Append-only breach notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub city: String,
    pub reason: String,
    pub trigger: Metric,
    pub value: f64,
    pub threshold: f64,
    pub breach: BreachKind,
}
