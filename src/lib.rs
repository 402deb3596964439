// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod matcher;
pub mod metrics;
pub mod passage;
pub mod passages;
pub mod runtime;
pub mod session;
pub mod store;
pub mod time_series;
