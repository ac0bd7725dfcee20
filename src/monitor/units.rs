use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::KELVIN_OFFSET;

/// Unit every stored temperature field is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

impl StorageUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Celsius => "celsius",
            Self::Fahrenheit => "fahrenheit",
        }
    }

    pub fn from_kelvin(self, kelvin: f64) -> f64 {
        match self {
            Self::Celsius => kelvin_to_celsius(kelvin),
            Self::Fahrenheit => kelvin_to_fahrenheit(kelvin),
        }
    }

    /// Re-express a temperature stored in `from` in this unit.
    pub fn convert(self, value: f64, from: StorageUnit) -> f64 {
        match (from, self) {
            (Self::Celsius, Self::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
            (Self::Fahrenheit, Self::Celsius) => (value - 32.0) * 5.0 / 9.0,
            _ => value,
        }
    }
}

impl fmt::Display for StorageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "celsius" => Ok(Self::Celsius),
            "f" | "fahrenheit" => Ok(Self::Fahrenheit),
            other => Err(format!("unsupported storage unit: {other}")),
        }
    }
}

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

pub fn kelvin_to_fahrenheit(kelvin: f64) -> f64 {
    (kelvin - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn kelvin_conversions() {
        assert!(close(kelvin_to_celsius(273.15), 0.0));
        assert!(close(kelvin_to_celsius(309.15), 36.0));
        assert!(close(kelvin_to_fahrenheit(273.15), 32.0));
        assert!(close(kelvin_to_fahrenheit(373.15), 212.0));
    }

    #[test]
    fn unit_dispatch_matches_helpers() {
        assert!(close(StorageUnit::Celsius.from_kelvin(300.0), kelvin_to_celsius(300.0)));
        assert!(close(
            StorageUnit::Fahrenheit.from_kelvin(300.0),
            kelvin_to_fahrenheit(300.0)
        ));
    }

    #[test]
    fn converts_between_storage_units() {
        assert!(close(StorageUnit::Fahrenheit.convert(100.0, StorageUnit::Celsius), 212.0));
        assert!(close(StorageUnit::Celsius.convert(212.0, StorageUnit::Fahrenheit), 100.0));
        assert!(close(StorageUnit::Celsius.convert(21.5, StorageUnit::Celsius), 21.5));
    }

    #[test]
    fn parses_unit_names() {
        assert_eq!("C".parse::<StorageUnit>(), Ok(StorageUnit::Celsius));
        assert_eq!(" fahrenheit ".parse::<StorageUnit>(), Ok(StorageUnit::Fahrenheit));
        assert!("kelvin".parse::<StorageUnit>().is_err());
    }
}
