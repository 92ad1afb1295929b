//! Relay configuration
//!
//! - `relay_config`: Configuration structure
//! - `defaults`: Default configuration values

pub mod defaults;
pub mod relay_config;

pub use relay_config::RelayConfig;
