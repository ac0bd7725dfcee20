use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tempfile::TempDir;

use weather_monitor::config::{Config, OpenWeatherConfig, WorkerConfig};
use weather_monitor::monitor::thresholds::ThresholdStore;
use weather_monitor::monitor::types::Observation;
use weather_monitor::monitor::units::StorageUnit;
use weather_monitor::shutdown::{self, ShutdownTrigger};
use weather_monitor::source::{FetchError, ReadingSource};
use weather_monitor::state::AppState;
use weather_monitor::store::Store;

use super::fixtures;

/// What the scripted source answers for one city.
#[derive(Debug, Clone)]
pub enum Script {
    Weather { temp_celsius: f64, condition: String },
    Fail(FetchError),
    /// Never answers.
    Hang,
    /// Answers after `delay` with an observation stamped `observed_at`.
    Late {
        delay: std::time::Duration,
        observed_at: DateTime<Utc>,
        temp_celsius: f64,
        condition: String,
    },
}

/// In-process `ReadingSource` driven by per-city scripts.
#[derive(Debug)]
pub struct FakeSource {
    scripts: Mutex<HashMap<String, Script>>,
    observed_at: Mutex<DateTime<Utc>>,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl FakeSource {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            observed_at: Mutex::new(at),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, city: &str, script: Script) {
        self.scripts.lock().unwrap().insert(city.to_string(), script);
    }

    pub fn weather(&self, city: &str, temp_celsius: f64, condition: &str) {
        self.set(
            city,
            Script::Weather {
                temp_celsius,
                condition: condition.to_string(),
            },
        );
    }

    pub fn observe_at(&self, at: DateTime<Utc>) {
        *self.observed_at.lock().unwrap() = at;
    }

    pub fn calls(&self, city: &str) -> usize {
        self.calls.lock().unwrap().get(city).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

impl ReadingSource for FakeSource {
    fn fetch<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<Observation, FetchError>> {
        *self.calls.lock().unwrap().entry(city.to_string()).or_insert(0) += 1;
        self.total.fetch_add(1, Ordering::SeqCst);

        let script = self.scripts.lock().unwrap().get(city).cloned();
        let at = *self.observed_at.lock().unwrap();
        Box::pin(async move {
            match script {
                Some(Script::Weather {
                    temp_celsius,
                    condition,
                }) => Ok(fixtures::observation(city, at, temp_celsius, &condition)),
                Some(Script::Fail(e)) => Err(e),
                Some(Script::Hang) => futures::future::pending().await,
                Some(Script::Late {
                    delay,
                    observed_at,
                    temp_celsius,
                    condition,
                }) => {
                    tokio::time::sleep(delay).await;
                    Ok(fixtures::observation(city, observed_at, temp_celsius, &condition))
                }
                None => Err(FetchError::NotFound(city.to_string())),
            }
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    pub config: Config,
    pub source: Arc<FakeSource>,
    pub abandon: ShutdownTrigger,
    _temp_dir: TempDir,
}

pub fn test_config(sled_path: String, cities: &[&str]) -> Config {
    Config {
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cities: cities.iter().map(|c| c.to_string()).collect(),
        storage_unit: StorageUnit::Celsius,
        utc_offset_minutes: 0,
        worker: WorkerConfig {
            is_leader: false,
            fetch_timeout_secs: 1,
            retry_backoff_ms: 1,
            shutdown_grace_secs: 0,
            ..WorkerConfig::default()
        },
        openweather: OpenWeatherConfig {
            api_url: "http://127.0.0.1:9/unused".to_string(),
            api_key: String::new(),
            timeout_secs: 1,
        },
    }
}

pub fn spawn(cities: &[&str], now: DateTime<Utc>) -> TestApp {
    spawn_with(cities, now, |_| {})
}

/// Build an app on a throwaway on-disk store; `tweak` adjusts the config first.
pub fn spawn_with(cities: &[&str], now: DateTime<Utc>, tweak: impl FnOnce(&mut Config)) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("weather-test.sled");

    let mut config = test_config(sled_path.to_string_lossy().to_string(), cities);
    tweak(&mut config);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("migrations");
    let thresholds = Arc::new(ThresholdStore::load(store.clone()).expect("thresholds"));
    let source = Arc::new(FakeSource::new(now));
    let (abandon, _) = shutdown::channel();

    let state = AppState::new(store, thresholds, source.clone(), &config, abandon.clone());

    TestApp {
        state,
        config,
        source,
        abandon,
        _temp_dir: temp_dir,
    }
}
