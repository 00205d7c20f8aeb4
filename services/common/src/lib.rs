//! Shared infrastructure used by the order-gateway crate: domain
//! primitives, configuration, error types, and the publish/subscribe
//! event bus.

pub mod config;
pub mod errors;
pub mod event_bus;
pub mod telemetry;
pub mod types;

pub use config::*;
pub use errors::*;
pub use event_bus::*;
pub use telemetry::*;
pub use types::*;
