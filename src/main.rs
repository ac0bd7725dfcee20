use std::sync::Arc;

use weather_monitor::config::Config;
use weather_monitor::logging::{init_tracing, LogConfig};
use weather_monitor::monitor::thresholds::ThresholdStore;
use weather_monitor::shutdown::{self, ShutdownTrigger};
use weather_monitor::source::openweather::OpenWeatherSource;
use weather_monitor::state::AppState;
use weather_monitor::store::Store;
use weather_monitor::workers::WorkerManager;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    init_tracing(&LogConfig::from(&config));
    tracing::info!(
        cities = ?config.cities,
        unit = %config.storage_unit,
        utc_offset_minutes = config.utc_offset_minutes,
        "Starting weather-monitor"
    );

    let store = match open_store(&config.sled_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, path = %config.sled_path, "Store unavailable at startup");
            std::process::exit(1);
        }
    };

    let thresholds = match ThresholdStore::load(store.clone()) {
        Ok(thresholds) => Arc::new(thresholds),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load threshold config");
            std::process::exit(1);
        }
    };

    if config.openweather.api_key.is_empty() {
        tracing::warn!("OPENWEATHER_API_KEY is empty; every fetch will fail");
    }
    let source = match OpenWeatherSource::new(&config.openweather) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build reading source");
            std::process::exit(1);
        }
    };

    let (abandon_tx, _) = shutdown::channel();
    let (stop_tx, stop_rx) = shutdown::channel();

    let state = AppState::new(store.clone(), thresholds, source, &config, abandon_tx);

    let worker_manager = WorkerManager::new(state, stop_rx, &config.worker);
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker_manager.start().await {
            tracing::error!(error = %e, "Worker manager failed");
        }
    });

    shutdown_signal(stop_tx).await;

    match worker_handle.await {
        Err(e) => tracing::error!(error = %e, "Worker task panicked"),
        Ok(()) => tracing::info!("Worker manager exited normally"),
    }

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

fn open_store(path: &str) -> Result<Store, weather_monitor::store::StoreError> {
    let store = Store::open(path)?;
    store.run_migrations()?;
    store.check_health()?;
    Ok(store)
}

async fn shutdown_signal(stop: ShutdownTrigger) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler; Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    stop.trigger();
}
