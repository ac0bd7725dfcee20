//! Daily rollup (00:01 local by default)

use chrono::Utc;

use crate::monitor::rollup;
use crate::state::AppState;

pub async fn run(state: &AppState) {
    let day = rollup::previous_local_day(Utc::now(), state.config().local_offset());
    tracing::info!(%day, "Rollup worker running");

    match rollup::run_for_day(state, day).await {
        Ok(report) if !report.failed.is_empty() => {
            tracing::warn!(%day, failed = ?report.failed, "Rollup finished with failed cities");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(%day, error = %e, "Rollup failed to read readings"),
    }
}
