//! Infrastructure around the inventory kernel: event log, snapshot cache,
//! background workers, configuration.

pub mod config;
pub mod engine;
pub mod event_log;
pub mod projections;
pub mod workers;

mod integration_tests;

pub use config::EngineConfig;
pub use engine::{EngineError, InventoryEngine};
