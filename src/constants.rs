/// Rolling window of raw readings kept in the store (hours)
pub const RETENTION_HOURS: i64 = 24;

/// Absolute zero offset used for Kelvin conversion
pub const KELVIN_OFFSET: f64 = 273.15;

/// Default ingestion schedule: every 5 minutes on the minute
pub const DEFAULT_INGEST_CRON: &str = "0 */5 * * * *";

/// Default rollup schedule: 00:01 in the configured local offset
pub const DEFAULT_ROLLUP_CRON: &str = "0 1 0 * * *";

/// Cities monitored when `CITIES` is unset
pub const DEFAULT_CITIES: &[&str] = &["Delhi", "Mumbai", "Chennai", "Bangalore", "Kolkata", "Hyderabad"];

/// Upper bound on concurrent per-city tasks within one tick
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_FETCH_MAX_RETRIES: u32 = 2;
pub const DEFAULT_STORE_MAX_RETRIES: u32 = 2;

/// Base retry backoff, doubled after every failed attempt
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

/// Grace period granted to in-flight per-city work on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 30;

pub const DEFAULT_OPENWEATHER_API_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Condition label stored when the provider omits one
pub const UNKNOWN_CONDITION: &str = "Unknown";
