//! Table output formatting for CLI commands
//!
//! Renders a loaded training configuration with comfy-table.

use crate::domain::models::{TrainingConfig, TransformSpec};
use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};
use serde_json::Value;
use std::collections::BTreeMap;
use std::env;

use super::truncate;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
}

impl TableFormatter {
    /// Create a new table formatter
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
        }
    }

    /// Format every scalar setting of a configuration as section/field/value rows
    pub fn format_config(&self, config: &TrainingConfig) -> String {
        let mut table = Self::create_base_table();
        table.set_header(vec![
            Cell::new("Section").add_attribute(Attribute::Bold),
            Cell::new("Field").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

        let model = &config.model;
        let train = &config.train;
        let loaders = &config.dataloaders;
        let augment = &config.augmentations;

        let mut rows: Vec<(&str, String, String)> = vec![
            ("model", "backbone".into(), model.backbone.clone()),
            ("model", "num_classes".into(), optional(model.num_classes)),
            (
                "model",
                "ckpt_pretrained".into(),
                optional(model.ckpt_pretrained.as_ref().map(|p| p.display())),
            ),
            ("train", "n_epochs".into(), train.n_epochs.to_string()),
            ("train", "amp".into(), train.amp.to_string()),
            ("train", "ema".into(), train.ema.to_string()),
            (
                "train",
                "ema_decay_per_epoch".into(),
                train.ema_decay_per_epoch.to_string(),
            ),
            ("train", "target_metric".into(), train.target_metric.to_string()),
            ("train", "stage".into(), train.stage.to_string()),
            (
                "dataloaders",
                "train_batch_size".into(),
                loaders.train_batch_size.to_string(),
            ),
            (
                "dataloaders",
                "valid_batch_size".into(),
                loaders.valid_batch_size.to_string(),
            ),
            ("dataloaders", "num_workers".into(), loaders.num_workers.to_string()),
            ("optimizer", "name".into(), config.optimizer.name.clone()),
        ];
        push_params(&mut rows, "optimizer", &numeric(&config.optimizer.params));
        rows.push(("scheduler", "name".into(), config.scheduler.name.clone()));
        push_params(&mut rows, "scheduler", &numeric(&config.scheduler.params));
        rows.push(("criterion", "name".into(), config.criterion.name.clone()));
        push_params(&mut rows, "criterion", &config.criterion.params);
        if let Some(size) = config.img_size {
            rows.push(("img_size", String::new(), size.to_string()));
        }
        rows.extend([
            ("augmentations", "sample_save".to_string(), augment.sample_save.to_string()),
            ("augmentations", "sample_n".to_string(), augment.sample_n.to_string()),
            ("augmentations", "sample_seed".to_string(), augment.sample_seed.to_string()),
            (
                "augmentations",
                "transforms".to_string(),
                format_transforms(&augment.transforms),
            ),
        ]);

        for (section, field, value) in rows {
            let section_cell = if self.use_colors {
                Cell::new(section).fg(Color::Cyan)
            } else {
                Cell::new(section)
            };
            table.add_row(vec![section_cell, Cell::new(field), Cell::new(value)]);
        }

        table.to_string()
    }

    /// Create a base table with common settings
    fn create_base_table() -> Table {
        let mut table = Table::new();

        // Use UTF-8 preset for nice borders
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);

        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn numeric(params: &BTreeMap<String, f64>) -> BTreeMap<String, Value> {
    params
        .iter()
        .map(|(key, value)| (key.clone(), Value::from(*value)))
        .collect()
}

fn push_params(
    rows: &mut Vec<(&str, String, String)>,
    section: &'static str,
    params: &BTreeMap<String, Value>,
) {
    for (key, value) in params {
        rows.push((section, format!("params.{key}"), value.to_string()));
    }
}

fn format_transforms(transforms: &[TransformSpec]) -> String {
    transforms
        .iter()
        .map(|transform| {
            if transform.params.is_empty() {
                transform.name.clone()
            } else {
                let params = transform
                    .params
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({})", transform.name, truncate(&params, 60))
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Check if color output is supported
fn supports_color() -> bool {
    // Respect NO_COLOR environment variable
    if env::var("NO_COLOR").is_ok() {
        return false;
    }

    // Check for dumb terminal
    if let Ok(term) = env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_transforms() {
        let transforms = vec![
            TransformSpec::new("Flip"),
            TransformSpec::new("MedianBlur")
                .with_param("blur_limit", 3)
                .with_param("p", 0.3),
        ];
        assert_eq!(
            format_transforms(&transforms),
            "Flip\nMedianBlur(blur_limit=3, p=0.3)"
        );
    }

    #[test]
    fn test_format_config_rows() {
        let formatter = TableFormatter { use_colors: false };
        let config: TrainingConfig = serde_json::from_value(serde_json::json!({
            "model": { "backbone": "resnet50" },
            "train": {
                "n_epochs": 10, "amp": false, "ema": false, "ema_decay_per_epoch": 1.0,
                "target_metric": "accuracy", "stage": "first"
            },
            "dataloaders": { "train_batch_size": 8, "valid_batch_size": 8, "num_workers": 0 },
            "optimizer": { "name": "Adam", "params": { "lr": 0.001 } },
            "scheduler": { "name": "CosineAnnealingLR", "params": { "T_max": 10.0 } },
            "criterion": { "name": "SupCon" },
            "augmentations": {
                "sample_save": false, "sample_n": 0, "sample_seed": 0, "transforms": ["Flip"]
            }
        }))
        .unwrap();

        let rendered = formatter.format_config(&config);
        for expected in ["backbone", "resnet50", "params.T_max", "accuracy", "Flip"] {
            assert!(rendered.contains(expected), "missing {expected}:\n{rendered}");
        }
    }

    #[test]
    fn test_optional() {
        assert_eq!(optional(Some(4)), "4");
        assert_eq!(optional::<u32>(None), "-");
    }
}
