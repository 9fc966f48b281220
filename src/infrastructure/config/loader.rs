use std::path::Path;

use figment::error::{Actual, Kind};
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde_json::Value;
use tracing::{debug, info};

use super::references;
use super::validator::validate_config;
use crate::domain::errors::{ConfigError, ConfigResult, ROOT_FIELD};
use crate::domain::models::TrainingConfig;

/// Default prefix for environment overrides, e.g. `BIOENCODER_TRAIN__N_EPOCHS`.
pub const DEFAULT_ENV_PREFIX: &str = "BIOENCODER_";

/// Loads training configurations from YAML documents.
///
/// Precedence (lowest to highest):
/// 1. The YAML document, with anchors expanded and tags stripped
/// 2. Environment variables (`<prefix>SECTION__KEY`), only when a prefix is set
///
/// References (`${train.n_epochs}`) are resolved after layering, so an
/// override of the epoch count also moves the scheduler period. Override
/// keys match document keys case-insensitively and take the document's
/// spelling, so `SCHEDULER__PARAMS__T_MAX` overrides `T_max`.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    env_prefix: Option<String>,
}

impl ConfigLoader {
    pub const fn new() -> Self {
        Self { env_prefix: None }
    }

    /// Enable environment overrides with the given prefix.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    pub fn env_prefix(&self) -> Option<&str> {
        self.env_prefix.as_deref()
    }

    /// Load and validate the document at `path` without environment overrides.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<TrainingConfig> {
        Self::new().load_file(path)
    }

    /// Load and validate the document at `path`.
    pub fn load_file(&self, path: impl AsRef<Path>) -> ConfigResult<TrainingConfig> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading training config");

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = self.load_str(&contents)?;
        info!(
            path = %path.display(),
            stage = %config.train.stage,
            backbone = %config.model.backbone,
            "training config loaded"
        );
        Ok(config)
    }

    /// Load and validate an in-memory YAML document.
    pub fn load_str(&self, yaml: &str) -> ConfigResult<TrainingConfig> {
        let mut doc = parse_document(yaml)?;
        references::bind_epoch_alias(&mut doc)?;

        let env = self.env_prefix.as_deref().map(|prefix| env_overrides(prefix, &doc));
        let mut figment = Figment::from(Serialized::defaults(doc));
        if let Some(env) = env {
            figment = figment.merge(env);
        }
        let mut merged: Value = figment.extract().map_err(map_figment_error)?;

        references::resolve(&mut merged)?;

        let config: TrainingConfig = Figment::from(Serialized::defaults(merged))
            .extract()
            .map_err(map_figment_error)?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &TrainingConfig) -> ConfigResult<()> {
        validate_config(config)
    }
}

fn parse_document(yaml: &str) -> ConfigResult<Value> {
    let raw: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|err| {
        let message = err.to_string();
        if message.contains("unknown anchor") {
            ConfigError::reference(alias_field(&err), message)
        } else {
            ConfigError::Parse { message }
        }
    })?;
    references::normalize(raw)
}

/// Environment provider whose keys are spelled the way `doc` spells them.
fn env_overrides(prefix: &str, doc: &Value) -> Env {
    let doc = doc.clone();
    Env::prefixed(prefix)
        .split("__")
        .map(move |key| fold_key(&doc, key.as_str()).into())
        .lowercase(false)
}

/// Match each segment of a dotted key against the document ignoring ASCII
/// case. Segments with no counterpart are lowercased.
fn fold_key(doc: &Value, key: &str) -> String {
    let mut node = Some(doc);
    key.split('.')
        .map(|segment| {
            let matched = node.and_then(Value::as_object).and_then(|object| {
                object
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(segment))
            });
            node = matched.map(|(_, child)| child);
            matched.map_or_else(|| segment.to_ascii_lowercase(), |(name, _)| name.clone())
        })
        .collect::<Vec<_>>()
        .join(".")
}

fn alias_field(err: &serde_yaml::Error) -> String {
    err.location().map_or_else(
        || ROOT_FIELD.to_string(),
        |location| format!("line {} column {}", location.line(), location.column()),
    )
}

fn map_figment_error(error: figment::Error) -> ConfigError {
    let mut segments = error.path.clone();
    match &error.kind {
        Kind::MissingField(name) => {
            segments.push(name.to_string());
            ConfigError::schema(segments.join("."))
        }
        // `backbone:` with nothing after it
        Kind::InvalidType(Actual::Unit | Actual::Option, _) if !segments.is_empty() => {
            ConfigError::schema(segments.join("."))
        }
        kind => {
            let field = if segments.is_empty() {
                ROOT_FIELD.to_string()
            } else {
                segments.join(".")
            };
            ConfigError::type_error(field, kind.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use crate::domain::models::{Stage, TargetMetric, TransformSpec};

    const STAGE_ONE: &str = r"
model:
  backbone: timm_tf_efficientnet_b5
  num_classes:
train:
  n_epochs: &epochs 100
  amp: true
  ema: true
  ema_decay_per_epoch: 0.4
  target_metric: precision_at_1
  stage: first
dataloaders:
  train_batch_size: 20
  valid_batch_size: 20
  num_workers: 16
optimizer:
  name: SGD
  params:
    lr: 0.003
scheduler:
  name: CosineAnnealingLR
  params:
    T_max: *epochs
    eta_min: 0.0003
criterion:
  name: SupCon
  params:
    temperature: 0.1
img_size: &size 384
augmentations:
  sample_save: true
  sample_n: 5
  sample_seed: 42
  transforms:
    - RandomResizedCrop:
        height: *size
        width: *size
        scale: !!python/tuple [0.7, 1]
    - Flip:
    - MedianBlur:
        blur_limit: 3
        p: 0.3
";

    fn load(yaml: &str) -> ConfigResult<TrainingConfig> {
        ConfigLoader::new().load_str(yaml)
    }

    #[test]
    fn test_yaml_parsing() {
        let config = load(STAGE_ONE).expect("YAML should load");

        assert_eq!(config.model.backbone, "timm_tf_efficientnet_b5");
        assert_eq!(config.model.num_classes, None);
        assert_eq!(config.train.n_epochs, 100);
        assert!(config.train.amp);
        assert!((config.train.ema_decay_per_epoch - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.train.target_metric, TargetMetric::PrecisionAt1);
        assert_eq!(config.train.stage, Stage::First);
        assert_eq!(config.dataloaders.num_workers, 16);
        assert_eq!(config.optimizer.learning_rate(), Some(0.003));
        assert_eq!(config.scheduler.t_max(), Some(100.0));
        assert_eq!(config.img_size, Some(384));
        assert_eq!(config.augmentations.transforms.len(), 3);
        assert_eq!(config.augmentations.transforms[1], TransformSpec::new("Flip"));
        assert_eq!(
            config.augmentations.transforms[0].params["scale"],
            serde_json::json!([0.7, 1])
        );
    }

    #[test]
    fn test_missing_top_level_section() {
        let yaml = STAGE_ONE.replace("dataloaders:", "loaders:");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field(), Some("dataloaders"));
    }

    #[test]
    fn test_missing_nested_field() {
        let yaml = STAGE_ONE.replace("  amp: true\n", "");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field(), Some("train.amp"));
    }

    #[test]
    fn test_negative_batch_size() {
        let yaml = STAGE_ONE.replace("train_batch_size: 20", "train_batch_size: -4");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.field(), Some("dataloaders.train_batch_size"));
    }

    #[test]
    fn test_unknown_stage() {
        let yaml = STAGE_ONE.replace("stage: first", "stage: third");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.field(), Some("train.stage"));
    }

    #[test]
    fn test_unknown_anchor() {
        let yaml = STAGE_ONE.replace("T_max: *epochs", "T_max: *n_epochs");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
    }

    #[test]
    fn test_syntax_error() {
        let err = load("model: [unclosed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::load("/nonexistent/train_stage1.yml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_scalar_document() {
        let err = load("just a string").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.field(), Some(ROOT_FIELD));
    }

    #[test]
    fn test_empty_document_names_first_section() {
        let err = load("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.field().is_some());
    }

    #[test]
    fn test_map_figment_missing_field() {
        let mut error = figment::Error::from(Kind::MissingField("backbone".into()));
        error.path = vec!["model".to_string()];
        let mapped = map_figment_error(error);
        assert_eq!(mapped.kind(), ErrorKind::Schema);
        assert_eq!(mapped.field(), Some("model.backbone"));
    }

    #[test]
    fn test_required_field_without_value_is_missing() {
        let yaml = STAGE_ONE.replace("backbone: timm_tf_efficientnet_b5", "backbone:");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field(), Some("model.backbone"));

        let yaml = STAGE_ONE.replace("dataloaders:\n", "dataloaders:\nloaders:\n");
        let err = load(&yaml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert_eq!(err.field(), Some("dataloaders"));
    }

    #[test]
    fn test_fold_key_follows_document_spelling() {
        let doc = serde_json::json!({
            "scheduler": { "params": { "T_max": "${train.n_epochs}" } },
            "train": { "n_epochs": 100 }
        });
        assert_eq!(fold_key(&doc, "SCHEDULER.PARAMS.T_MAX"), "scheduler.params.T_max");
        assert_eq!(fold_key(&doc, "TRAIN.N_EPOCHS"), "train.n_epochs");
        assert_eq!(fold_key(&doc, "SCHEDULER.PARAMS.ETA_MIN"), "scheduler.params.eta_min");
        assert_eq!(fold_key(&doc, "WANDB.PROJECT"), "wandb.project");
    }

    #[test]
    fn test_map_figment_root_message() {
        let error = figment::Error::from("bad shape".to_string());
        let mapped = map_figment_error(error);
        assert_eq!(mapped.kind(), ErrorKind::Type);
        assert_eq!(mapped.field(), Some(ROOT_FIELD));
    }
}
