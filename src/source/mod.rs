pub mod openweather;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::monitor::types::Observation;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Network trouble, timeouts, throttling, malformed payloads. Worth retrying.
    #[error("transient fetch error: {0}")]
    Transient(String),
    /// The provider does not know the city. Retrying will not help.
    #[error("city not found: {0}")]
    NotFound(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Upstream provider of current conditions for a city.
///
/// Timeouts and retries are applied by the caller, not the source.
pub trait ReadingSource: Send + Sync {
    fn fetch<'a>(&'a self, city: &'a str) -> BoxFuture<'a, Result<Observation, FetchError>>;
}
