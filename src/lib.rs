pub mod config;
pub mod constants;
pub mod logging;
pub mod monitor;
pub mod shutdown;
pub mod source;
pub mod state;
pub mod store;
pub mod workers;
