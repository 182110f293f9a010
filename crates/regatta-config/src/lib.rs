//! Configuration loading for the regatta registry gateway.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::{ConfigError, Result};
