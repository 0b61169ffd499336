pub mod config;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod server;

// Use cases and the ports they depend on
pub mod app;
// Adapters for those ports (reqwest, in-memory state)
pub mod infra;
