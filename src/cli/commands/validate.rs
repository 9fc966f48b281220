//! Implementation of the `bioencoder-config validate` command.

use anyhow::Result;
use clap::Args;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::cli::output::{output, CommandOutput};
use crate::domain::errors::ConfigResult;
use crate::domain::models::TrainingConfig;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

/// Outcome for a single file
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backbone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl FileReport {
    pub fn new(path: &Path, result: &ConfigResult<TrainingConfig>) -> Self {
        match result {
            Ok(config) => Self {
                path: path.to_path_buf(),
                valid: true,
                stage: Some(config.train.stage.to_string()),
                backbone: Some(config.model.backbone.clone()),
                error_kind: None,
                field: None,
                message: None,
            },
            Err(err) => Self {
                path: path.to_path_buf(),
                valid: false,
                stage: None,
                backbone: None,
                error_kind: Some(err.kind().to_string()),
                field: err.field().map(str::to_string),
                message: Some(err.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub success: bool,
    pub reports: Vec<FileReport>,
}

impl ValidateOutput {
    pub fn failed(&self) -> usize {
        self.reports.iter().filter(|report| !report.valid).count()
    }
}

impl CommandOutput for ValidateOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::with_capacity(self.reports.len() + 1);
        for report in &self.reports {
            if report.valid {
                lines.push(format!(
                    "{} {} (stage {}, backbone {})",
                    style("✓").green(),
                    report.path.display(),
                    report.stage.as_deref().unwrap_or("-"),
                    report.backbone.as_deref().unwrap_or("-"),
                ));
            } else {
                lines.push(format!(
                    "{} {}\n    {}: {}",
                    style("✗").red(),
                    report.path.display(),
                    style(report.error_kind.as_deref().unwrap_or("Error")).red().bold(),
                    report.message.as_deref().unwrap_or_default(),
                ));
            }
        }
        let valid = self.reports.len() - self.failed();
        lines.push(format!(
            "\n{valid} of {} configuration file(s) valid",
            self.reports.len()
        ));
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: ValidateArgs, loader: &ConfigLoader, json_mode: bool) -> Result<()> {
    let reports: Vec<FileReport> = args
        .paths
        .iter()
        .map(|path| {
            let result = loader.load_file(path);
            if let Err(err) = &result {
                warn!(
                    path = %path.display(),
                    kind = %err.kind(),
                    field = err.field().unwrap_or_default(),
                    "configuration rejected"
                );
            }
            FileReport::new(path, &result)
        })
        .collect();

    let result = ValidateOutput {
        success: reports.iter().all(|report| report.valid),
        reports,
    };
    output(&result, json_mode);

    let failed = result.failed();
    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} configuration file(s) failed validation",
            result.reports.len()
        );
    }
    Ok(())
}
