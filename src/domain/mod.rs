//! Domain layer: the configuration model and its error taxonomy.

pub mod errors;
pub mod models;

pub use errors::{ConfigError, ConfigResult, ErrorKind};
