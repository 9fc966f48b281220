//! Implementation of the `bioencoder-config show` command.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::TrainingConfig;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Configuration file to load
    pub path: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct ShowOutput {
    pub path: PathBuf,
    pub config: TrainingConfig,
}

impl CommandOutput for ShowOutput {
    fn to_human(&self) -> String {
        format!(
            "{}\n{}",
            self.path.display(),
            TableFormatter::new().format_config(&self.config)
        )
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or_default()
    }
}

pub fn execute(args: ShowArgs, loader: &ConfigLoader, json_mode: bool) -> Result<()> {
    let config = loader
        .load_file(&args.path)
        .with_context(|| format!("Failed to load config from {}", args.path.display()))?;

    output(
        &ShowOutput {
            path: args.path,
            config,
        },
        json_mode,
    );
    Ok(())
}
