pub mod alerts;
pub mod daily_weather;
pub mod readings;
pub mod thresholds;
