use chrono::{DateTime, Utc};

use weather_monitor::constants::KELVIN_OFFSET;
use weather_monitor::monitor::types::{Observation, Reading};
use weather_monitor::monitor::units::StorageUnit;
use weather_monitor::store::Store;

/// Mild conditions that breach none of the default thresholds.
pub fn observation(city: &str, at: DateTime<Utc>, temp_celsius: f64, condition: &str) -> Observation {
    Observation {
        city: city.to_string(),
        timestamp: at,
        temp_kelvin: temp_celsius + KELVIN_OFFSET,
        feels_like_kelvin: temp_celsius + KELVIN_OFFSET,
        pressure: 1008.0,
        humidity: 45.0,
        rain: 0.0,
        clouds: 20.0,
        condition: condition.to_string(),
    }
}

pub fn reading(city: &str, at: DateTime<Utc>, temp: f64, condition: &str) -> Reading {
    Reading {
        timestamp: at,
        city: city.to_string(),
        temp,
        feels_like: temp,
        pressure: 1008.0,
        humidity: 45.0,
        rain: 0.0,
        clouds: 20.0,
        condition: condition.to_string(),
        unit: StorageUnit::Celsius,
    }
}

pub fn seed_readings(store: &Store, readings: &[Reading]) {
    for reading in readings {
        store.upsert_reading(reading).expect("seed reading");
    }
}
