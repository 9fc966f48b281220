//! Augmentation transform entries.
//!
//! A transform is written either as a bare name or as a single-key map from
//! the name to its parameters:
//!
//! ```yaml
//! transforms:
//!   - Flip
//!   - RandomRotate90:
//!   - MedianBlur:
//!       blur_limit: 3
//!       p: 0.3
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One named transform with optional parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TransformSpec {
    pub name: String,
    pub params: BTreeMap<String, Value>,
}

impl TransformSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Probability of applying the transform, if set explicitly.
    pub fn probability(&self) -> Option<&Value> {
        self.params.get("p")
    }
}

impl Serialize for TransformSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        if self.params.is_empty() {
            map.serialize_entry(&self.name, &Value::Null)?;
        } else {
            map.serialize_entry(&self.name, &self.params)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TransformSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TransformVisitor)
    }
}

struct TransformVisitor;

impl<'de> Visitor<'de> for TransformVisitor {
    type Value = TransformSpec;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a transform name or a single-key map of name to parameters")
    }

    fn visit_str<E: de::Error>(self, name: &str) -> Result<Self::Value, E> {
        Ok(TransformSpec::new(name))
    }

    fn visit_string<E: de::Error>(self, name: String) -> Result<Self::Value, E> {
        Ok(TransformSpec::new(name))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut spec: Option<TransformSpec> = None;
        let mut entries = 0usize;

        while let Some((name, params)) =
            map.next_entry::<String, Option<BTreeMap<String, Value>>>()?
        {
            entries += 1;
            if spec.is_none() {
                spec = Some(TransformSpec {
                    name,
                    params: params.unwrap_or_default(),
                });
            }
        }

        match spec {
            Some(spec) if entries == 1 => Ok(spec),
            _ => Err(de::Error::invalid_length(
                entries,
                &"exactly one transform name per entry",
            )),
        }
    }
}
