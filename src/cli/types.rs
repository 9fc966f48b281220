//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::show::ShowArgs;
use crate::cli::commands::validate::ValidateArgs;
use crate::infrastructure::config::{ConfigLoader, DEFAULT_ENV_PREFIX};
use crate::infrastructure::logging::{LogConfig, LogFormat};

#[derive(Parser, Debug)]
#[command(name = "bioencoder-config")]
#[command(about = "Load and validate BioEncoder training configurations", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Console log format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Also write JSON logs to rolling files in this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Apply environment overrides named <PREFIX>SECTION__KEY (prefix defaults to BIOENCODER_)
    #[arg(
        long,
        global = true,
        value_name = "PREFIX",
        num_args = 0..=1,
        default_missing_value = DEFAULT_ENV_PREFIX
    )]
    pub env_prefix: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load one or more configuration files and report problems
    Validate(ValidateArgs),

    /// Print the resolved configuration
    Show(ShowArgs),
}

impl Cli {
    /// Logging settings derived from the global flags
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            log_dir: self.log_dir.clone(),
            ..LogConfig::default()
        }
    }

    /// Loader honouring `--env-prefix`
    pub fn loader(&self) -> ConfigLoader {
        match &self.env_prefix {
            Some(prefix) => ConfigLoader::new().with_env_prefix(prefix.clone()),
            None => ConfigLoader::new(),
        }
    }
}
