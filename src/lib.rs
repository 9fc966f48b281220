//! BioEncoder training configuration loader
//!
//! Loads the YAML document describing one stage of a supervised-contrastive
//! image-embedding training run and turns it into a validated, immutable
//! [`TrainingConfig`].
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): configuration model, loss registry, error taxonomy
//! - **Infrastructure Layer** (`infrastructure`): YAML loading, reference
//!   resolution, validation and logging
//! - **CLI Layer** (`cli`): `validate` and `show` commands
//!
//! # Example
//!
//! ```no_run
//! use bioencoder_config::ConfigLoader;
//!
//! let config = ConfigLoader::load("configs/train_stage1.yml")?;
//! assert_eq!(config.scheduler.t_max(), Some(f64::from(config.train.n_epochs)));
//! # Ok::<(), bioencoder_config::ConfigError>(())
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::errors::{ConfigError, ConfigResult, ErrorKind};
pub use domain::models::{
    AugmentationConfig, ContrastMode, CriterionConfig, DataloaderConfig, LossKind, ModelConfig,
    OptimizerConfig, SchedulerConfig, Stage, SupConParams, TargetMetric, TrainConfig,
    TrainingConfig, TransformSpec,
};
pub use infrastructure::config::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use infrastructure::logging::{LogConfig, LogFormat, LoggerImpl, RotationPolicy};
