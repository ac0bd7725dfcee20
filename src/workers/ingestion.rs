//! Ingestion tick (every 5 minutes by default)

use chrono::Utc;

use crate::monitor::ingest;
use crate::state::AppState;

pub async fn run(state: &AppState) {
    tracing::debug!("Ingestion worker running");

    let report = ingest::run_tick(state, Utc::now()).await;

    for city in &report.cities {
        tracing::debug!(city = %city.city, outcome = ?city.outcome, "City result");
    }
}
