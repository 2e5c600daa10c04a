//! DoorGuard Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by all other DoorGuard crates:
//! - Application configuration (target address, reconnect policy, environment)
//! - Error taxonomy for the device session
//! - Structured logging with tracing
//! - Protocol constants

pub mod config;
pub mod error;
pub mod logging;
pub mod constants;

// Re-export commonly used items at the crate root
pub use config::{AppConfig, ConfigHandle, Environment, TargetAddress};
pub use error::{DgError, DgResult};
pub use logging::init_logging;
