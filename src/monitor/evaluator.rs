use crate::monitor::thresholds::ThresholdConfig;
use crate::monitor::types::{AlertEvent, BreachKind, Reading};

/// Compare one reading against one threshold snapshot.
///
/// Only metrics present in both the reading and the config are checked.
/// Temperatures are compared (and reported) in the config's unit, whatever
/// unit the reading was stored in. No state is kept between calls, so a
/// metric that stays out of bounds raises an event on every reading.
pub fn evaluate(reading: &Reading, config: &ThresholdConfig) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    for (metric, bound) in &config.limits {
        let Some(raw) = reading.metric(*metric) else {
            continue;
        };
        let value = if metric.is_temperature() {
            config.unit.convert(raw, reading.unit)
        } else {
            raw
        };

        let breach = match (bound.max, bound.min) {
            (Some(max), _) if value > max => Some((BreachKind::Above, max)),
            (_, Some(min)) if value < min => Some((BreachKind::Below, min)),
            _ => None,
        };

        if let Some((kind, threshold)) = breach {
            let side = match kind {
                BreachKind::Above => "max",
                BreachKind::Below => "min",
            };
            events.push(AlertEvent {
                id: uuid::Uuid::new_v4().to_string(),
                timestamp: reading.timestamp,
                city: reading.city.clone(),
                reason: format!("Found {metric}: {value} but threshold is {side} {threshold}"),
                trigger: *metric,
                value,
                threshold,
                breach: kind,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{TimeZone, Utc};

    use crate::monitor::thresholds::ThresholdBound;
    use crate::monitor::types::Metric;
    use crate::monitor::units::StorageUnit;

    use super::*;

    fn reading(temp: f64, humidity: f64) -> Reading {
        Reading {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 20, 14, 0, 0).unwrap(),
            city: "Delhi".to_string(),
            temp,
            feels_like: temp,
            pressure: 1005.0,
            humidity,
            rain: 0.0,
            clouds: 0.0,
            condition: "Clear".to_string(),
            unit: StorageUnit::Celsius,
        }
    }

    fn temp_only(max: f64) -> ThresholdConfig {
        ThresholdConfig {
            version: 1,
            updated_at: None,
            unit: StorageUnit::Celsius,
            limits: BTreeMap::from([(Metric::Temp, ThresholdBound::max(max))]),
        }
    }

    #[test]
    fn breach_above_max_raises_one_event() {
        let events = evaluate(&reading(36.0, 40.0), &temp_only(35.0));
        assert_eq!(events.len(), 1);

        let event = &events[0];
        assert_eq!(event.city, "Delhi");
        assert_eq!(event.trigger, Metric::Temp);
        assert_eq!(event.trigger.as_str(), "temp");
        assert_eq!(event.value, 36.0);
        assert_eq!(event.threshold, 35.0);
        assert_eq!(event.breach, BreachKind::Above);
        assert_eq!(event.reason, "Found temp: 36 but threshold is max 35");
    }

    #[test]
    fn value_equal_to_max_does_not_breach() {
        assert!(evaluate(&reading(35.0, 40.0), &temp_only(35.0)).is_empty());
    }

    #[test]
    fn metrics_missing_from_config_are_ignored() {
        // humidity 99 would breach the defaults, but this config only knows temp
        assert!(evaluate(&reading(20.0, 99.0), &temp_only(35.0)).is_empty());
    }

    #[test]
    fn lower_bound_breach_is_reported() {
        let config = ThresholdConfig {
            version: 1,
            updated_at: None,
            unit: StorageUnit::Celsius,
            limits: BTreeMap::from([(Metric::Temp, ThresholdBound::range(0.0, 35.0))]),
        };
        let events = evaluate(&reading(-2.5, 40.0), &config);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].breach, BreachKind::Below);
        assert_eq!(events[0].threshold, 0.0);
    }

    #[test]
    fn several_metrics_can_breach_at_once() {
        let events = evaluate(&reading(41.0, 95.0), &ThresholdConfig::default());
        let triggers: Vec<Metric> = events.iter().map(|e| e.trigger).collect();
        assert_eq!(triggers, vec![Metric::Temp, Metric::FeelsLike, Metric::Humidity]);
        let ids: std::collections::HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn fahrenheit_readings_are_compared_in_threshold_unit() {
        let mut mild = reading(68.0, 40.0);
        mild.unit = StorageUnit::Fahrenheit;
        assert!(evaluate(&mild, &ThresholdConfig::default()).is_empty());

        let mut hot = reading(100.4, 40.0);
        hot.unit = StorageUnit::Fahrenheit;
        let events = evaluate(&hot, &temp_only(35.0));
        assert_eq!(events.len(), 1);
        assert!((events[0].value - 38.0).abs() < 1e-9);
        assert_eq!(events[0].threshold, 35.0);
    }

    #[test]
    fn repeated_breach_fires_every_time() {
        let config = temp_only(35.0);
        let first = evaluate(&reading(36.0, 40.0), &config);
        let second = evaluate(&reading(36.0, 40.0), &config);
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_ne!(first[0].id, second[0].id);
    }
}
