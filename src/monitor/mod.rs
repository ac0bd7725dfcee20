pub mod barrier;
pub mod evaluator;
pub mod ingest;
pub mod retention;
pub mod rollup;
pub mod thresholds;
pub mod types;
pub mod units;
