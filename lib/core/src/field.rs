//! Field descriptors
//!
//! A [`FieldDescriptor`] is the resolved, fully defaulted form of one field
//! declaration. Its serialized form is the declaration shape with every
//! default written out, so a persisted schema reads back into equal
//! descriptors.

use crate::field_type::FieldType;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the catch-all field.
pub const FALLBACK_FIELD_NAME: &str = ".*";

/// Token that marks a field name as a pattern.
pub const WILDCARD_TOKEN: &str = ".*";

/// Suffix of the hidden field that caches a reference's foreign document id.
pub const REFERENCE_HELPER_FIELD_SUFFIX: &str = "__reference_helper";

/// Whether a nested field sits under an array of objects.
///
/// `Unknown` is set at declaration time and resolved the first time a
/// document shows the field's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NestedArray {
    #[default]
    False,
    True,
    Unknown,
}

impl NestedArray {
    pub fn as_u8(&self) -> u8 {
        match self {
            NestedArray::False => 0,
            NestedArray::True => 1,
            NestedArray::Unknown => 2,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(NestedArray::False),
            1 => Some(NestedArray::True),
            2 => Some(NestedArray::Unknown),
            _ => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, NestedArray::Unknown)
    }
}

impl From<bool> for NestedArray {
    fn from(b: bool) -> Self {
        if b {
            NestedArray::True
        } else {
            NestedArray::False
        }
    }
}

impl Serialize for NestedArray {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for NestedArray {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(NestedArray::from(b)),
            Value::Number(n) => n
                .as_u64()
                .and_then(|v| u8::try_from(v).ok())
                .and_then(NestedArray::from_u8)
                .ok_or_else(|| de::Error::custom(format!("invalid nested_array value {}", n))),
            other => Err(de::Error::custom(format!("invalid nested_array value {}", other))),
        }
    }
}

/// Distance metric of a vector field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VectorDistance {
    #[default]
    Cosine,
    /// Inner product
    Ip,
}

impl VectorDistance {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cosine" => Some(VectorDistance::Cosine),
            "ip" => Some(VectorDistance::Ip),
            _ => None,
        }
    }
}

/// Model settings of an auto-embedding field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_prefix: Option<String>,
    /// Provider specific settings (api keys, urls, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `embed` block of a field declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbedConfig {
    pub from: Vec<String>,
    pub model_config: ModelConfig,
}

/// Persist a missing embed config as `{}`.
mod embed_serde {
    use super::EmbedConfig;
    use serde::de::{self, Deserializer};
    use serde::ser::{SerializeMap, Serializer};
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(embed: &Option<EmbedConfig>, serializer: S) -> Result<S::Ok, S::Error> {
        match embed {
            Some(cfg) => cfg.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<EmbedConfig>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::Object(map) if map.is_empty() => Ok(None),
            other => serde_json::from_value(other).map(Some).map_err(de::Error::custom),
        }
    }
}

/// Resolved description of one schema field
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub facet: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_true")]
    pub index: bool,
    #[serde(default)]
    pub sort: bool,
    #[serde(default)]
    pub infix: bool,
    #[serde(default)]
    pub locale: String,
    #[serde(default)]
    pub nested: bool,
    #[serde(default)]
    pub nested_array: NestedArray,
    #[serde(default)]
    pub num_dim: u32,
    #[serde(default)]
    pub vec_dist: VectorDistance,
    #[serde(default)]
    pub reference: String,
    #[serde(default, with = "embed_serde")]
    pub embed: Option<EmbedConfig>,
}

fn default_true() -> bool {
    true
}

impl FieldDescriptor {
    /// Plain indexed field with every other attribute at its default.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            facet: false,
            optional: false,
            index: true,
            sort: false,
            infix: false,
            locale: String::new(),
            nested: false,
            nested_array: NestedArray::False,
            num_dim: 0,
            vec_dist: VectorDistance::Cosine,
            reference: String::new(),
            embed: None,
        }
    }

    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn is_object(&self) -> bool {
        self.field_type.is_object()
    }

    pub fn is_array(&self) -> bool {
        self.field_type.is_array()
    }

    pub fn is_fallback(&self) -> bool {
        self.name == FALLBACK_FIELD_NAME
    }

    /// Name is a pattern or the type is a wildcard marker.
    pub fn is_dynamic(&self) -> bool {
        is_dynamic(&self.name, self.field_type)
    }

    pub fn is_vector(&self) -> bool {
        self.num_dim > 0
    }

    pub fn is_reference_helper(&self) -> bool {
        self.name.ends_with(REFERENCE_HELPER_FIELD_SUFFIX)
    }

    pub fn reference_helper_name(&self) -> String {
        format!("{}{}", self.name, REFERENCE_HELPER_FIELD_SUFFIX)
    }

    /// Hidden `int64` companion of a reference field.
    pub fn reference_helper(&self) -> FieldDescriptor {
        FieldDescriptor::new(self.reference_helper_name(), FieldType::Int64).optional(self.optional)
    }

    /// Recompute the attributes that depend on the field type, used when a
    /// descriptor is cloned for a leaf of a different type.
    pub fn apply_computed_defaults(&mut self) {
        self.sort = self.field_type.sortable_by_default() && !self.is_vector();
        if self.field_type == FieldType::Geopoint {
            self.sort = true;
        }
    }

    /// Persisted declaration with every default materialized.
    pub fn to_json(&self) -> Value {
        // Serialization of this struct cannot fail: all keys are strings.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn from_json(value: &Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// Shared predicate for raw declarations and resolved descriptors.
pub fn is_dynamic(name: &str, field_type: FieldType) -> bool {
    name.contains(WILDCARD_TOKEN) || field_type.is_wildcard_marker()
}
