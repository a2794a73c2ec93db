//! Structured logging and counters for the observation store.

pub mod logging;
pub mod telemetry;
