use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

use crate::constants::{
    DEFAULT_CITIES, DEFAULT_FETCH_MAX_RETRIES, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_INGEST_CRON,
    DEFAULT_MAX_CONCURRENCY, DEFAULT_OPENWEATHER_API_URL, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_ROLLUP_CRON, DEFAULT_SHUTDOWN_GRACE_SECS, DEFAULT_STORE_MAX_RETRIES,
};
use crate::monitor::units::StorageUnit;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub cities: Vec<String>,
    pub storage_unit: StorageUnit,
    /// Offset that defines the "local day" for rollups and the rollup schedule.
    pub utc_offset_minutes: i32,
    pub worker: WorkerConfig,
    pub openweather: OpenWeatherConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub is_leader: bool,
    pub ingest_cron: String,
    pub rollup_cron: String,
    pub max_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_max_retries: u32,
    pub store_max_retries: u32,
    pub retry_backoff_ms: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Clone)]
pub struct OpenWeatherConfig {
    pub api_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl fmt::Debug for OpenWeatherConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenWeatherConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"***REDACTED***")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            is_leader: true,
            ingest_cron: DEFAULT_INGEST_CRON.to_string(),
            rollup_cron: DEFAULT_ROLLUP_CRON.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_max_retries: DEFAULT_FETCH_MAX_RETRIES,
            store_max_retries: DEFAULT_STORE_MAX_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE_SECS,
        }
    }
}

impl WorkerConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/weather.sled"),
            cities: env_list("CITIES", DEFAULT_CITIES),
            storage_unit: env_or_parse("STORAGE_UNIT", StorageUnit::Celsius),
            utc_offset_minutes: env_or_parse("ROLLUP_UTC_OFFSET_MINUTES", local_offset_minutes()),
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                ingest_cron: env_or("INGEST_CRON", DEFAULT_INGEST_CRON),
                rollup_cron: env_or("ROLLUP_CRON", DEFAULT_ROLLUP_CRON),
                max_concurrency: env_or_parse("INGEST_MAX_CONCURRENCY", DEFAULT_MAX_CONCURRENCY),
                fetch_timeout_secs: env_or_parse("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS),
                fetch_max_retries: env_or_parse("FETCH_MAX_RETRIES", DEFAULT_FETCH_MAX_RETRIES),
                store_max_retries: env_or_parse("STORE_MAX_RETRIES", DEFAULT_STORE_MAX_RETRIES),
                retry_backoff_ms: env_or_parse("RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS),
                shutdown_grace_secs: env_or_parse(
                    "SHUTDOWN_GRACE_SECS",
                    DEFAULT_SHUTDOWN_GRACE_SECS,
                ),
            },
            openweather: OpenWeatherConfig {
                api_url: env_or("OPENWEATHER_API_URL", DEFAULT_OPENWEATHER_API_URL),
                api_key: env_or("OPENWEATHER_API_KEY", ""),
                timeout_secs: env_or_parse("FETCH_TIMEOUT_SECS", DEFAULT_FETCH_TIMEOUT_SECS),
            },
        }
    }

    /// Fixed offset used to cut readings into local days.
    ///
    /// Out-of-range values fall back to UTC.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!(
                    minutes = self.utc_offset_minutes,
                    "Invalid UTC offset, using UTC"
                );
                Utc.fix()
            })
    }
}

fn local_offset_minutes() -> i32 {
    chrono::Local::now().offset().local_minus_utc() / 60
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Comma separated list; blank entries are dropped and an empty result keeps the default.
pub fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    let parsed: Vec<String> = env::var(key)
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if parsed.is_empty() {
        default.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}
