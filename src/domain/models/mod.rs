//! Typed training configuration.

pub mod config;
pub mod loss;
pub mod transform;

pub use config::{
    AugmentationConfig, CriterionConfig, DataloaderConfig, ModelConfig, OptimizerConfig,
    SchedulerConfig, Stage, TargetMetric, TrainConfig, TrainingConfig, T_MAX_KEY,
};
pub use loss::{ContrastMode, LossKind, SupConParams};
pub use transform::TransformSpec;
