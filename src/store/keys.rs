use chrono::{DateTime, NaiveDate, Utc};

/// Separator between key segments. City names never contain it.
const SEP: char = '\u{1f}';

fn ts_segment(timestamp: DateTime<Utc>) -> String {
    // Zero padded so lexicographic order matches chronological order.
    let secs = timestamp.timestamp().max(0) as u64;
    format!("{:020}", secs)
}

/// `{ts:020}{SEP}{city}`: time ordered, unique per `(timestamp, city)`.
pub fn reading_key(timestamp: DateTime<Utc>, city: &str) -> String {
    format!("{}{}{}", ts_segment(timestamp), SEP, city)
}

/// Keys are stored at whole seconds, so a bound rounds up to the next second.
fn bound_segment(timestamp: DateTime<Utc>) -> String {
    let mut secs = timestamp.timestamp().max(0) as u64;
    if timestamp.timestamp() >= 0 && timestamp.timestamp_subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{:020}", secs)
}

/// Smallest key whose timestamp is not earlier than `timestamp`.
pub fn reading_lower_bound(timestamp: DateTime<Utc>) -> String {
    bound_segment(timestamp)
}

/// `{yyyy-mm-dd}{SEP}{city}`: date ordered, unique per `(date, city)`.
pub fn daily_key(date: NaiveDate, city: &str) -> String {
    format!("{}{}{}", date.format("%Y-%m-%d"), SEP, city)
}

pub fn daily_lower_bound(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `{ts:020}{SEP}{event_id}`: time ordered alert log.
pub fn alert_key(timestamp: DateTime<Utc>, event_id: &str) -> String {
    format!("{}{}{}", ts_segment(timestamp), SEP, event_id)
}

pub fn alert_lower_bound(timestamp: DateTime<Utc>) -> String {
    bound_segment(timestamp)
}

pub fn config_version_key(config_type: &str, version: u32) -> String {
    format!("{}:{:010}", config_type, version)
}

pub fn config_latest_key(config_type: &str) -> String {
    format!("{}:latest", config_type)
}
