//! Configuration management infrastructure
//!
//! Loading a training config runs in stages:
//! - YAML parsing with anchor expansion
//! - Epoch alias binding and `${...}` reference resolution
//! - Optional environment variable overrides (figment)
//! - Typed extraction and semantic validation

pub mod loader;
pub mod references;
pub mod validator;

pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use validator::validate_config;
