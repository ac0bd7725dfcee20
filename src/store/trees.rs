pub const READINGS: &str = "readings";
pub const DAILY_WEATHER: &str = "daily_weather";
pub const ALERT_EVENTS: &str = "alert_events";
/// Singleton records (threshold config, schema version) and their history.
pub const CONFIG_VERSIONS: &str = "config_versions";
