//! Registry of loss functions the trainer knows how to build.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Default SupCon temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.07;

/// Loss functions accepted in `criterion.name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LossKind {
    SupCon,
    LabelSmoothing,
    CrossEntropy,
    KLDiv,
    SubCenterArcFace,
    ArcFace,
}

impl LossKind {
    pub const ALL: [Self; 6] = [
        Self::SupCon,
        Self::LabelSmoothing,
        Self::CrossEntropy,
        Self::KLDiv,
        Self::SubCenterArcFace,
        Self::ArcFace,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::SupCon => "SupCon",
            Self::LabelSmoothing => "LabelSmoothing",
            Self::CrossEntropy => "CrossEntropy",
            Self::KLDiv => "KLDiv",
            Self::SubCenterArcFace => "SubCenterArcFace",
            Self::ArcFace => "ArcFace",
        }
    }

    /// Contrastive losses train the embedding in the first stage; the rest
    /// train a classifier head.
    pub const fn is_contrastive(self) -> bool {
        matches!(self, Self::SupCon)
    }

    pub fn registry_names() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown loss '{s}'"))
    }
}

/// Anchor selection for the contrastive loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContrastMode {
    /// Every view is an anchor
    #[default]
    All,
    /// Only the first view is an anchor
    One,
}

impl FromStr for ContrastMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "one" => Ok(Self::One),
            other => Err(format!("unknown contrast mode '{other}', expected one of: all, one")),
        }
    }
}

/// SupCon parameters with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct SupConParams {
    pub temperature: f64,
    pub base_temperature: f64,
    pub contrast_mode: ContrastMode,
    /// Newick tree whose branch lengths weight the positive mask
    pub tree_path: Option<String>,
}

impl Default for SupConParams {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            base_temperature: DEFAULT_TEMPERATURE,
            contrast_mode: ContrastMode::All,
            tree_path: None,
        }
    }
}

impl SupConParams {
    /// Reads known keys from a raw parameter map. Values of the wrong kind fall
    /// back to defaults; the validator reports them separately.
    pub fn from_params(params: &BTreeMap<String, Value>) -> Self {
        let defaults = Self::default();
        Self {
            temperature: params
                .get("temperature")
                .and_then(Value::as_f64)
                .unwrap_or(defaults.temperature),
            base_temperature: params
                .get("base_temperature")
                .and_then(Value::as_f64)
                .unwrap_or(defaults.base_temperature),
            contrast_mode: params
                .get("contrast_mode")
                .and_then(Value::as_str)
                .and_then(|mode| mode.parse().ok())
                .unwrap_or(defaults.contrast_mode),
            tree_path: params
                .get("tree_path")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Scale applied to the mean log-probability of positives.
    pub fn loss_scale(&self) -> f64 {
        self.temperature / self.base_temperature
    }
}
