//! Document normalization and `${dotted.path}` reference resolution.
//!
//! YAML anchors are expanded by the parser, which loses the fact that two
//! values were meant to be the same. The epoch alias is therefore rebound
//! explicitly: the scheduler's `T_max` is replaced by a `${train.n_epochs}`
//! reference before overrides are layered on, and references are resolved
//! afterwards.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};
use serde_yaml::Value as YamlValue;

use crate::domain::errors::{ConfigError, ConfigResult, ROOT_FIELD};
use crate::domain::models::{SchedulerConfig, T_MAX_KEY};

/// Path of the epoch count that the scheduler period follows.
pub const EPOCHS_PATH: &str = "train.n_epochs";

/// Upper bound on the number of values reference expansion may copy.
pub const MAX_EXPANDED_NODES: usize = 100_000;

/// Convert a parsed YAML tree into a JSON tree.
///
/// Tags such as `!!python/tuple` are dropped in favour of the tagged value.
/// An empty document becomes an empty mapping so that missing sections are
/// reported by name.
pub fn normalize(value: YamlValue) -> ConfigResult<Value> {
    match to_json(value, "")? {
        Value::Null => Ok(Value::Object(Map::new())),
        value @ Value::Object(_) => Ok(value),
        other => Err(ConfigError::type_error(
            ROOT_FIELD,
            format!("expected a mapping at the document root, found {}", kind_of(&other)),
        )),
    }
}

fn to_json(value: YamlValue, path: &str) -> ConfigResult<Value> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::from(u)
            } else if let Some(i) = n.as_i64() {
                Value::from(i)
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                Number::from_f64(f).map(Value::Number).ok_or_else(|| {
                    ConfigError::type_error(display_path(path), "number must be finite")
                })?
            }
        }
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(index, item)| to_json(item, &format!("{path}[{index}]")))
                .collect::<ConfigResult<_>>()?,
        ),
        YamlValue::Mapping(mapping) => {
            let mut object = Map::new();
            for (key, item) in mapping {
                let key = match key {
                    YamlValue::String(s) => s,
                    YamlValue::Number(n) => n.to_string(),
                    YamlValue::Bool(b) => b.to_string(),
                    _ => {
                        return Err(ConfigError::type_error(
                            display_path(path),
                            "mapping keys must be scalars",
                        ))
                    }
                };
                let child = join(path, &key);
                object.insert(key, to_json(item, &child)?);
            }
            Value::Object(object)
        }
        YamlValue::Tagged(tagged) => to_json(tagged.value, path)?,
    })
}

/// Tie `scheduler.params.T_max` to `train.n_epochs`.
///
/// A literal `T_max` must equal the epoch count and is replaced by a
/// reference to it. Epoch-bound schedulers without `T_max` receive the
/// reference. Values of the wrong kind are left for typed extraction to
/// report.
pub fn bind_epoch_alias(doc: &mut Value) -> ConfigResult<()> {
    let Some(epochs) = doc.pointer("/train/n_epochs").and_then(Value::as_f64) else {
        return Ok(());
    };

    let Some(scheduler) = doc.get_mut("scheduler").and_then(Value::as_object_mut) else {
        return Ok(());
    };
    let epoch_bound = scheduler
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(SchedulerConfig::is_epoch_bound);

    let params = scheduler
        .entry("params")
        .or_insert_with(|| Value::Object(Map::new()));
    if params.is_null() {
        *params = Value::Object(Map::new());
    }
    let Some(params) = params.as_object_mut() else {
        return Ok(());
    };

    match params.get(T_MAX_KEY) {
        None if epoch_bound => {
            params.insert(T_MAX_KEY.to_string(), reference_to(EPOCHS_PATH));
        }
        None => {}
        Some(value) if parse_reference(value).is_some() => {}
        Some(value) => {
            let Some(t_max) = value.as_f64() else {
                return Ok(());
            };
            if (t_max - epochs).abs() > f64::EPSILON {
                return Err(ConfigError::reference(
                    format!("scheduler.params.{T_MAX_KEY}"),
                    format!("{T_MAX_KEY} ({value}) must reference {EPOCHS_PATH} ({epochs})"),
                ));
            }
            params.insert(T_MAX_KEY.to_string(), reference_to(EPOCHS_PATH));
        }
    }

    Ok(())
}

/// Replace every `${dotted.path}` string with the value it names.
///
/// Each target is resolved once. Expansion stops with a ReferenceError once
/// more than [`MAX_EXPANDED_NODES`] values have been copied into the document.
pub fn resolve(doc: &mut Value) -> ConfigResult<()> {
    let snapshot = doc.clone();
    let mut sites = Vec::new();
    collect_sites(&snapshot, "", "", &mut sites);

    let mut resolver = Resolver::new(&snapshot);
    for site in sites {
        let value = resolver.expand(&site.field, &site.target, &mut Vec::new())?;
        if let Some(slot) = doc.pointer_mut(&site.pointer) {
            *slot = value;
        }
    }

    Ok(())
}

/// Target path of a `${dotted.path}` string.
pub fn parse_reference(value: &Value) -> Option<&str> {
    let inner = value
        .as_str()?
        .trim()
        .strip_prefix("${")?
        .strip_suffix('}')?
        .trim();
    (!inner.is_empty()).then_some(inner)
}

fn reference_to(path: &str) -> Value {
    Value::String(format!("${{{path}}}"))
}

struct Site {
    field: String,
    pointer: String,
    target: String,
}

fn collect_sites(value: &Value, field: &str, pointer: &str, sites: &mut Vec<Site>) {
    match value {
        Value::Object(object) => {
            for (key, child) in object {
                let child_pointer = format!("{pointer}/{}", escape_pointer(key));
                collect_sites(child, &join(field, key), &child_pointer, sites);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                collect_sites(
                    child,
                    &format!("{field}[{index}]"),
                    &format!("{pointer}/{index}"),
                    sites,
                );
            }
        }
        other => {
            if let Some(target) = parse_reference(other) {
                sites.push(Site {
                    field: display_path(field),
                    pointer: pointer.to_string(),
                    target: target.to_string(),
                });
            }
        }
    }
}

struct Resolver<'a> {
    root: &'a Value,
    /// Resolved value and node count per target path
    resolved: HashMap<String, (Value, usize)>,
    expanded: usize,
}

impl<'a> Resolver<'a> {
    fn new(root: &'a Value) -> Self {
        Self {
            root,
            resolved: HashMap::new(),
            expanded: 0,
        }
    }

    /// Copy of the fully resolved value at `target`.
    fn expand(&mut self, field: &str, target: &str, chain: &mut Vec<String>) -> ConfigResult<Value> {
        let nodes = self.resolve_target(field, target, chain)?;
        self.charge(field, nodes)?;
        Ok(self
            .resolved
            .get(target)
            .map(|(value, _)| value.clone())
            .unwrap_or_default())
    }

    fn resolve_target(
        &mut self,
        field: &str,
        target: &str,
        chain: &mut Vec<String>,
    ) -> ConfigResult<usize> {
        if let Some((_, nodes)) = self.resolved.get(target) {
            return Ok(*nodes);
        }
        if chain.iter().any(|seen| seen == target) {
            chain.push(target.to_string());
            return Err(ConfigError::reference(
                field,
                format!("circular reference: {}", chain.join(" -> ")),
            ));
        }

        let root = self.root;
        let raw = lookup(root, target).ok_or_else(|| {
            ConfigError::reference(
                field,
                format!("`${{{target}}}` does not name a value in the document"),
            )
        })?;

        chain.push(target.to_string());
        let value = match parse_reference(raw) {
            Some(next) => self.expand(field, next, chain)?,
            None => {
                let mut value = raw.clone();
                self.charge(field, count_nodes(&value))?;
                self.substitute(field, &mut value, chain)?;
                value
            }
        };
        chain.pop();

        let nodes = count_nodes(&value);
        self.resolved.insert(target.to_string(), (value, nodes));
        Ok(nodes)
    }

    fn substitute(&mut self, field: &str, value: &mut Value, chain: &mut Vec<String>) -> ConfigResult<()> {
        match value {
            Value::Object(object) => {
                for child in object.values_mut() {
                    self.substitute(field, child, chain)?;
                }
            }
            Value::Array(items) => {
                for child in items {
                    self.substitute(field, child, chain)?;
                }
            }
            other => {
                if let Some(target) = parse_reference(other).map(str::to_string) {
                    *other = self.expand(field, &target, chain)?;
                }
            }
        }
        Ok(())
    }

    fn charge(&mut self, field: &str, nodes: usize) -> ConfigResult<()> {
        self.expanded += nodes;
        if self.expanded > MAX_EXPANDED_NODES {
            return Err(ConfigError::reference(
                field,
                format!("references expand to more than {MAX_EXPANDED_NODES} values"),
            ));
        }
        Ok(())
    }
}

fn count_nodes(value: &Value) -> usize {
    match value {
        Value::Object(object) => 1 + object.values().map(count_nodes).sum::<usize>(),
        Value::Array(items) => 1 + items.iter().map(count_nodes).sum::<usize>(),
        _ => 1,
    }
}

fn lookup<'a>(root: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(root, |node, segment| match node {
        Value::Object(object) => object.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        ROOT_FIELD.to_string()
    } else {
        path.to_string()
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use serde_json::json;

    fn yaml(text: &str) -> Value {
        normalize(serde_yaml::from_str(text).expect("valid YAML")).expect("normalizes")
    }

    #[test]
    fn test_normalize_strips_tags() {
        let doc = yaml("scale: !!python/tuple [0.7, 1]\nname: !custom crop\n");
        assert_eq!(doc, json!({ "scale": [0.7, 1], "name": "crop" }));
    }

    #[test]
    fn test_normalize_expands_anchors() {
        let doc = yaml("train:\n  n_epochs: &epochs 100\nscheduler:\n  params:\n    T_max: *epochs\n");
        assert_eq!(doc["scheduler"]["params"]["T_max"], json!(100));
    }

    #[test]
    fn test_normalize_empty_document() {
        assert_eq!(yaml(""), json!({}));
    }

    #[test]
    fn test_normalize_rejects_scalar_root() {
        let err = normalize(serde_yaml::from_str("42").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.field(), Some(ROOT_FIELD));
    }

    #[test]
    fn test_bind_replaces_matching_t_max() {
        let mut doc = json!({
            "train": { "n_epochs": 30 },
            "scheduler": { "name": "CosineAnnealingLR", "params": { "T_max": 30, "eta_min": 0.0003 } }
        });
        bind_epoch_alias(&mut doc).unwrap();
        assert_eq!(doc["scheduler"]["params"]["T_max"], json!("${train.n_epochs}"));
        assert_eq!(doc["scheduler"]["params"]["eta_min"], json!(0.0003));
    }

    #[test]
    fn test_bind_inserts_missing_t_max_for_cosine() {
        let mut doc = json!({
            "train": { "n_epochs": 30 },
            "scheduler": { "name": "CosineAnnealingLR" }
        });
        bind_epoch_alias(&mut doc).unwrap();
        assert_eq!(doc["scheduler"]["params"]["T_max"], json!("${train.n_epochs}"));
    }

    #[test]
    fn test_bind_leaves_other_schedulers_alone() {
        let mut doc = json!({
            "train": { "n_epochs": 30 },
            "scheduler": { "name": "StepLR", "params": { "step_size": 10 } }
        });
        bind_epoch_alias(&mut doc).unwrap();
        assert!(doc["scheduler"]["params"].get("T_max").is_none());
    }

    #[test]
    fn test_bind_rejects_mismatched_t_max() {
        let mut doc = json!({
            "train": { "n_epochs": 30 },
            "scheduler": { "name": "CosineAnnealingLR", "params": { "T_max": 25 } }
        });
        let err = bind_epoch_alias(&mut doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.field(), Some("scheduler.params.T_max"));
    }

    #[test]
    fn test_resolve_chained_references() {
        let mut doc = json!({
            "img_size": 384,
            "crop": { "height": "${img_size}", "width": "${crop.height}" }
        });
        resolve(&mut doc).unwrap();
        assert_eq!(doc["crop"], json!({ "height": 384, "width": 384 }));
    }

    #[test]
    fn test_resolve_reference_inside_sequence() {
        let mut doc = json!({
            "size": 224,
            "transforms": [{ "Resize": { "height": "${size}" } }]
        });
        resolve(&mut doc).unwrap();
        assert_eq!(doc["transforms"][0]["Resize"]["height"], json!(224));
    }

    #[test]
    fn test_resolve_reference_to_subtree() {
        let mut doc = json!({
            "size": 128,
            "base": { "height": "${size}" },
            "copy": "${base}"
        });
        resolve(&mut doc).unwrap();
        assert_eq!(doc["copy"], json!({ "height": 128 }));
    }

    #[test]
    fn test_resolve_missing_target() {
        let mut doc = json!({ "scheduler": { "params": { "T_max": "${train.n_epochs}" } } });
        let err = resolve(&mut doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(err.field(), Some("scheduler.params.T_max"));
    }

    #[test]
    fn test_resolve_detects_cycles() {
        let mut doc = json!({ "a": "${b}", "b": "${a}" });
        let err = resolve(&mut doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.to_string().contains("circular reference"));
    }

    #[test]
    fn test_resolve_shared_target_once() {
        let mut doc = json!({
            "size": 256,
            "crop": { "height": "${size}", "width": "${size}" },
            "resize": "${crop}",
            "pad": "${crop}"
        });
        resolve(&mut doc).unwrap();
        assert_eq!(doc["resize"], json!({ "height": 256, "width": 256 }));
        assert_eq!(doc["pad"], doc["resize"]);
    }

    #[test]
    fn test_resolve_rejects_exponential_expansion() {
        let mut levels = Map::new();
        levels.insert("l0".to_string(), json!("x".repeat(8)));
        for level in 1..40 {
            let below = format!("${{nest.l{}}}", level - 1);
            levels.insert(format!("l{level}"), json!([below.clone(), below]));
        }
        let mut doc = json!({ "nest": levels });

        let err = resolve(&mut doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.to_string().contains("references expand to more than"));
    }

    #[test]
    fn test_parse_reference() {
        assert_eq!(parse_reference(&json!("${train.n_epochs}")), Some("train.n_epochs"));
        assert_eq!(parse_reference(&json!(" ${ a.b } ")), Some("a.b"));
        assert_eq!(parse_reference(&json!("${}")), None);
        assert_eq!(parse_reference(&json!("prefix ${a}")), None);
        assert_eq!(parse_reference(&json!(5)), None);
    }
}
