//! Property-based tests for configuration loading invariants
//!
//! Tests the following properties:
//! 1. Literal values survive loading unchanged
//! 2. Non-positive batch sizes are rejected as type errors
//! 3. The scheduler period always equals the epoch count after load
//! 4. Determinism: loading the same document twice yields equal configs

use bioencoder_config::{ConfigLoader, ErrorKind};
use proptest::prelude::*;

fn document(train_batch_size: i64, n_epochs: u32, t_max: &str, seed: i64) -> String {
    format!(
        r"
model:
  backbone: resnet18
train:
  n_epochs: {n_epochs}
  amp: true
  ema: false
  ema_decay_per_epoch: 0.5
  target_metric: mean_average_precision
  stage: first
dataloaders:
  train_batch_size: {train_batch_size}
  valid_batch_size: 16
  num_workers: 4
optimizer:
  name: SGD
  params:
    lr: 0.01
scheduler:
  name: CosineAnnealingLR
  params:
    {t_max}
criterion:
  name: SupCon
augmentations:
  sample_save: false
  sample_n: 0
  sample_seed: {seed}
  transforms:
    - Flip
"
    )
}

proptest! {
    /// Property 1: positive batch sizes and arbitrary seeds are kept as written
    #[test]
    fn proptest_literals_survive(batch in 1i64..100_000, seed in any::<i64>()) {
        let yaml = document(batch, 20, "T_max: 20", seed);
        let config = ConfigLoader::new().load_str(&yaml).unwrap();
        prop_assert_eq!(i64::from(config.dataloaders.train_batch_size), batch);
        prop_assert_eq!(config.augmentations.sample_seed, seed);
    }

    /// Property 2: zero or negative batch sizes are type errors on that field
    #[test]
    fn proptest_non_positive_batch_rejected(batch in -100_000i64..=0) {
        let yaml = document(batch, 20, "T_max: 20", 0);
        let err = ConfigLoader::new().load_str(&yaml).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Type);
        prop_assert_eq!(err.field(), Some("dataloaders.train_batch_size"));
    }

    /// Property 3: T_max equals n_epochs whether written, referenced or omitted
    #[test]
    fn proptest_t_max_tracks_epochs(epochs in 1u32..10_000, form in 0usize..3) {
        let t_max = match form {
            0 => format!("T_max: {epochs}"),
            1 => "T_max: \"${train.n_epochs}\"".to_string(),
            _ => "eta_min: 0.0".to_string(),
        };
        let yaml = document(8, epochs, &t_max, 0);
        let config = ConfigLoader::new().load_str(&yaml).unwrap();
        prop_assert_eq!(config.scheduler.t_max(), Some(f64::from(epochs)));
    }

    /// Property 3b: a literal T_max that differs from n_epochs is a reference error
    #[test]
    fn proptest_mismatched_t_max_rejected(epochs in 1u32..10_000, offset in 1u32..100) {
        let yaml = document(8, epochs, &format!("T_max: {}", epochs + offset), 0);
        let err = ConfigLoader::new().load_str(&yaml).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::Reference);
    }

    /// Property 4: loading is deterministic
    #[test]
    fn proptest_load_is_deterministic(batch in 1i64..1_000, epochs in 1u32..1_000) {
        let yaml = document(batch, epochs, &format!("T_max: {epochs}"), 7);
        let loader = ConfigLoader::new();
        prop_assert_eq!(loader.load_str(&yaml).unwrap(), loader.load_str(&yaml).unwrap());
    }
}
