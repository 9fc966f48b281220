//! Infrastructure layer module
//!
//! - Configuration loading (figment, serde_yaml)
//! - Logging infrastructure (tracing)

pub mod config;
pub mod logging;
