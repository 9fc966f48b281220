//! Typed sections of a training configuration document.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::loss::{LossKind, SupConParams};
use super::transform::TransformSpec;

/// Scheduler parameter that tracks the epoch count.
pub const T_MAX_KEY: &str = "T_max";

/// Complete configuration for one stage of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Backbone selection
    pub model: ModelConfig,

    /// Training loop settings
    pub train: TrainConfig,

    /// Batch sizes and loader workers
    pub dataloaders: DataloaderConfig,

    /// Optimizer selection and hyperparameters
    pub optimizer: OptimizerConfig,

    /// Learning-rate scheduler selection and hyperparameters
    pub scheduler: SchedulerConfig,

    /// Loss function selection and hyperparameters
    pub criterion: CriterionConfig,

    /// Square input resolution in pixels
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_size: Option<u32>,

    /// Augmentation pipeline
    pub augmentations: AugmentationConfig,
}

impl TrainingConfig {
    pub const fn stage(&self) -> Stage {
        self.train.stage
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Feature-extraction network identifier, e.g. `timm_tf_efficientnet_b5`
    pub backbone: String,

    /// Number of output classes; required for the second stage
    #[serde(default)]
    pub num_classes: Option<u32>,

    /// Stage-one checkpoint the second stage starts from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ckpt_pretrained: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub n_epochs: u32,

    /// Automatic mixed precision
    pub amp: bool,

    /// Exponential moving average of weights
    pub ema: bool,

    /// EMA decay applied per epoch, in (0, 1]
    pub ema_decay_per_epoch: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging_name: Option<String>,

    pub target_metric: TargetMetric,

    pub stage: Stage,
}

/// Training stage: contrastive pretraining or classifier fine-tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    First,
    Second,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str("first"),
            Self::Second => f.write_str("second"),
        }
    }
}

/// Metric used to select the best checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    #[serde(rename = "precision_at_1")]
    PrecisionAt1,
    MeanAveragePrecision,
    MeanAveragePrecisionAtR,
    RPrecision,
    Accuracy,
    F1Score,
}

impl TargetMetric {
    pub const ALL: [Self; 6] = [
        Self::PrecisionAt1,
        Self::MeanAveragePrecision,
        Self::MeanAveragePrecisionAtR,
        Self::RPrecision,
        Self::Accuracy,
        Self::F1Score,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrecisionAt1 => "precision_at_1",
            Self::MeanAveragePrecision => "mean_average_precision",
            Self::MeanAveragePrecisionAtR => "mean_average_precision_at_r",
            Self::RPrecision => "r_precision",
            Self::Accuracy => "accuracy",
            Self::F1Score => "f1_score",
        }
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataloaderConfig {
    pub train_batch_size: u32,
    pub valid_batch_size: u32,
    pub num_workers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Optimizer class name, e.g. `SGD`
    pub name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: BTreeMap<String, f64>,
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> Option<f64> {
        self.params.get("lr").copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scheduler class name, e.g. `CosineAnnealingLR`
    pub name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: BTreeMap<String, f64>,
}

impl SchedulerConfig {
    /// Schedulers whose period is bound to the epoch count when `T_max` is omitted.
    pub const EPOCH_BOUND: &'static [&'static str] = &["CosineAnnealingLR"];

    pub fn t_max(&self) -> Option<f64> {
        self.params.get(T_MAX_KEY).copied()
    }

    pub fn is_epoch_bound(name: &str) -> bool {
        Self::EPOCH_BOUND.contains(&name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionConfig {
    /// Loss registry name, e.g. `SupCon`
    pub name: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: BTreeMap<String, Value>,
}

impl CriterionConfig {
    /// Registry entry for this criterion, `None` for unknown names.
    pub fn kind(&self) -> Option<LossKind> {
        self.name.parse().ok()
    }

    /// Typed view of the SupCon parameters with defaults applied.
    pub fn supcon_params(&self) -> Option<SupConParams> {
        match self.kind() {
            Some(LossKind::SupCon) => Some(SupConParams::from_params(&self.params)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentationConfig {
    /// Write augmented samples to disk before training
    pub sample_save: bool,

    /// Number of samples to write
    pub sample_n: u32,

    pub sample_seed: i64,

    /// Ordered transform pipeline
    pub transforms: Vec<TransformSpec>,
}

/// Accept `params:` written with no value as an empty map.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
