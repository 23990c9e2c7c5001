// Spread scanner: MEXC depth feed -> per-symbol spreads -> ranked snapshots for subscribers.
pub mod config;
pub mod distribution;
pub mod engine;
pub mod error;
pub mod market_data;
pub mod pipeline;
pub mod server;
pub mod shutdown;
pub mod telemetry;
