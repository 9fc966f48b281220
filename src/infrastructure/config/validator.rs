//! Semantic checks on a typed configuration.
//!
//! Serde already guarantees shapes and value kinds; this module checks
//! ranges, registry membership, stage requirements and the epoch invariant.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::domain::errors::{ConfigError, ConfigResult};
use crate::domain::models::{
    ContrastMode, CriterionConfig, LossKind, Stage, TrainingConfig, TransformSpec, T_MAX_KEY,
};

/// Validate a configuration after extraction.
pub fn validate_config(config: &TrainingConfig) -> ConfigResult<()> {
    // Model
    if config.model.backbone.trim().is_empty() {
        return Err(ConfigError::type_error("model.backbone", "must not be empty"));
    }
    if config.model.num_classes == Some(0) {
        return Err(ConfigError::type_error("model.num_classes", "must be positive"));
    }
    if config.train.stage == Stage::Second && config.model.num_classes.is_none() {
        return Err(ConfigError::schema("model.num_classes"));
    }

    // Train
    if config.train.n_epochs == 0 {
        return Err(ConfigError::type_error("train.n_epochs", "must be positive"));
    }
    let decay = config.train.ema_decay_per_epoch;
    if decay.is_nan() || decay <= 0.0 || decay > 1.0 {
        return Err(ConfigError::type_error(
            "train.ema_decay_per_epoch",
            format!("{decay} is outside (0, 1]"),
        ));
    }

    // Dataloaders
    if config.dataloaders.train_batch_size == 0 {
        return Err(ConfigError::type_error(
            "dataloaders.train_batch_size",
            "must be positive",
        ));
    }
    if config.dataloaders.valid_batch_size == 0 {
        return Err(ConfigError::type_error(
            "dataloaders.valid_batch_size",
            "must be positive",
        ));
    }

    if config.img_size == Some(0) {
        return Err(ConfigError::type_error("img_size", "must be positive"));
    }

    // Optimizer
    if config.optimizer.name.trim().is_empty() {
        return Err(ConfigError::type_error("optimizer.name", "must not be empty"));
    }
    check_finite("optimizer.params", &config.optimizer.params)?;
    if let Some(lr) = config.optimizer.learning_rate() {
        if lr <= 0.0 {
            return Err(ConfigError::type_error(
                "optimizer.params.lr",
                format!("{lr} must be positive"),
            ));
        }
    }

    // Scheduler
    if config.scheduler.name.trim().is_empty() {
        return Err(ConfigError::type_error("scheduler.name", "must not be empty"));
    }
    check_finite("scheduler.params", &config.scheduler.params)?;
    if let Some(key) = config
        .scheduler
        .params
        .keys()
        .find(|key| key.as_str() != T_MAX_KEY && key.eq_ignore_ascii_case(T_MAX_KEY))
    {
        return Err(ConfigError::type_error(
            format!("scheduler.params.{key}"),
            format!("scheduler period must be spelled {T_MAX_KEY}"),
        ));
    }
    if let Some(t_max) = config.scheduler.t_max() {
        let epochs = f64::from(config.train.n_epochs);
        if (t_max - epochs).abs() > f64::EPSILON {
            return Err(ConfigError::reference(
                format!("scheduler.params.{T_MAX_KEY}"),
                format!("{T_MAX_KEY} ({t_max}) must equal train.n_epochs ({epochs})"),
            ));
        }
    }

    // Criterion
    let loss = validate_criterion(&config.criterion)?;
    match (config.train.stage, loss.is_contrastive()) {
        (Stage::First, false) => warn!(
            criterion = %loss,
            "first stage is usually trained with a contrastive loss"
        ),
        (Stage::Second, true) => warn!(
            criterion = %loss,
            "second stage is usually trained with a classification loss"
        ),
        _ => {}
    }

    // Augmentations
    for (index, transform) in config.augmentations.transforms.iter().enumerate() {
        validate_transform(index, transform)?;
    }

    Ok(())
}

fn check_finite(prefix: &str, params: &BTreeMap<String, f64>) -> ConfigResult<()> {
    match params.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, value)) => Err(ConfigError::type_error(
            format!("{prefix}.{key}"),
            format!("{value} is not a finite number"),
        )),
        None => Ok(()),
    }
}

fn validate_criterion(criterion: &CriterionConfig) -> ConfigResult<LossKind> {
    let kind = criterion.kind().ok_or_else(|| {
        ConfigError::type_error(
            "criterion.name",
            format!(
                "unknown loss '{}', expected one of: {}",
                criterion.name,
                LossKind::registry_names()
            ),
        )
    })?;

    let params = &criterion.params;
    match kind {
        LossKind::SupCon => {
            positive_number(params, "temperature")?;
            positive_number(params, "base_temperature")?;
            if let Some(mode) = params.get("contrast_mode") {
                let parsed = mode
                    .as_str()
                    .ok_or_else(|| "expected a string".to_string())
                    .and_then(str::parse::<ContrastMode>);
                if let Err(message) = parsed {
                    return Err(ConfigError::type_error(
                        "criterion.params.contrast_mode",
                        message,
                    ));
                }
            }
            if let Some(tree_path) = params.get("tree_path") {
                if !(tree_path.is_null() || tree_path.is_string()) {
                    return Err(ConfigError::type_error(
                        "criterion.params.tree_path",
                        "expected a path string",
                    ));
                }
            }
        }
        LossKind::LabelSmoothing => {
            if let Some(classes) = params.get("classes") {
                if classes.as_u64().is_none_or(|n| n < 2) {
                    return Err(ConfigError::type_error(
                        "criterion.params.classes",
                        format!("{classes} must be an integer of at least 2"),
                    ));
                }
            }
            if let Some(smoothing) = params.get("smoothing") {
                if smoothing.as_f64().is_none_or(|s| !(0.0..1.0).contains(&s)) {
                    return Err(ConfigError::type_error(
                        "criterion.params.smoothing",
                        format!("{smoothing} is outside [0, 1)"),
                    ));
                }
            }
        }
        LossKind::SubCenterArcFace | LossKind::ArcFace => {
            for key in ["num_classes", "embedding_size"] {
                if let Some(value) = params.get(key) {
                    if value.as_u64().is_none_or(|n| n == 0) {
                        return Err(ConfigError::type_error(
                            format!("criterion.params.{key}"),
                            format!("{value} must be a positive integer"),
                        ));
                    }
                }
            }
        }
        LossKind::CrossEntropy | LossKind::KLDiv => {}
    }

    Ok(kind)
}

fn positive_number(params: &BTreeMap<String, Value>, key: &str) -> ConfigResult<()> {
    match params.get(key) {
        Some(value) if value.as_f64().is_none_or(|n| n <= 0.0) => Err(ConfigError::type_error(
            format!("criterion.params.{key}"),
            format!("{value} must be a positive number"),
        )),
        _ => Ok(()),
    }
}

fn validate_transform(index: usize, transform: &TransformSpec) -> ConfigResult<()> {
    if transform.name.trim().is_empty() {
        return Err(ConfigError::type_error(
            format!("augmentations.transforms[{index}]"),
            "transform name must not be empty",
        ));
    }
    if let Some(p) = transform.probability() {
        if p.as_f64().is_none_or(|p| !(0.0..=1.0).contains(&p)) {
            return Err(ConfigError::type_error(
                format!("augmentations.transforms[{index}].{}.p", transform.name),
                format!("{p} is outside [0, 1]"),
            ));
        }
    }
    Ok(())
}
