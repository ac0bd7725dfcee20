use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;

use crate::config::OpenWeatherConfig;
use crate::constants::UNKNOWN_CONDITION;
use crate::monitor::types::Observation;
use crate::source::{FetchError, ReadingSource};

/// Current-weather client for the OpenWeatherMap `data/2.5/weather` endpoint.
///
/// Requests are made without `units`, so temperatures come back in Kelvin.
#[derive(Debug, Clone)]
pub struct OpenWeatherSource {
    config: OpenWeatherConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    dt: i64,
    #[serde(default)]
    weather: Vec<Condition>,
    main: MainBlock,
    #[serde(default)]
    rain: Option<Precipitation>,
    #[serde(default)]
    clouds: Option<Clouds>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    main: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    feels_like: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct Precipitation {
    #[serde(rename = "1h", default)]
    one_hour: f64,
}

#[derive(Debug, Deserialize)]
struct Clouds {
    #[serde(default)]
    all: f64,
}

impl OpenWeatherSource {
    pub fn new(config: &OpenWeatherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| FetchError::Transient(format!("http client: {e}")))?;
        Ok(Self {
            config: config.clone(),
            client,
        })
    }

    async fn fetch_current(&self, city: &str) -> Result<Observation, FetchError> {
        let response = self
            .client
            .get(&self.config.api_url)
            .query(&[("q", city), ("appid", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(city.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "provider returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        parse_current_weather(city, &body)
    }
}

impl ReadingSource for OpenWeatherSource {
    fn fetch<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<Observation, FetchError>> {
        self.fetch_current(city).boxed()
    }
}

/// Map a `data/2.5/weather` payload onto an observation for `city`.
pub fn parse_current_weather(city: &str, body: &str) -> Result<Observation, FetchError> {
    let payload: CurrentWeather = serde_json::from_str(body)
        .map_err(|e| FetchError::Transient(format!("malformed payload: {e}")))?;

    let timestamp = DateTime::<Utc>::from_timestamp(payload.dt, 0)
        .ok_or_else(|| FetchError::Transient(format!("invalid timestamp {}", payload.dt)))?;

    let condition = payload
        .weather
        .into_iter()
        .next()
        .map(|c| c.main)
        .unwrap_or_else(|| UNKNOWN_CONDITION.to_string());

    Ok(Observation {
        city: city.to_string(),
        timestamp,
        temp_kelvin: payload.main.temp,
        feels_like_kelvin: payload.main.feels_like,
        pressure: payload.main.pressure,
        humidity: payload.main.humidity,
        rain: payload.rain.map_or(0.0, |r| r.one_hour),
        clouds: payload.clouds.map_or(0.0, |c| c.all),
        condition,
    })
}
