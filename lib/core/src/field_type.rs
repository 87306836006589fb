//! Field types and the compatibility rules between them
//!
//! A declared type is what the schema says a field holds. A detected type is
//! what a concrete JSON value looks like. Flattening accepts a value when the
//! two are equal or when the detected type numerically satisfies the declared
//! one (an integer literal stored in a float field, for example).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Closed set of field types understood by the schema
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "geopoint")]
    Geopoint,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "int32[]")]
    Int32Array,
    #[serde(rename = "int64[]")]
    Int64Array,
    #[serde(rename = "float[]")]
    FloatArray,
    #[serde(rename = "bool[]")]
    BoolArray,
    #[serde(rename = "geopoint[]")]
    GeopointArray,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "object[]")]
    ObjectArray,
    /// Type is detected from the first value seen
    #[serde(rename = "auto")]
    Auto,
    /// Any value is coerced to a string
    #[serde(rename = "string*")]
    StringStar,
}

impl FieldType {
    pub fn parse(s: &str) -> Option<Self> {
        let ty = match s {
            "string" => FieldType::String,
            "int32" => FieldType::Int32,
            "int64" => FieldType::Int64,
            "float" => FieldType::Float,
            "bool" => FieldType::Bool,
            "geopoint" => FieldType::Geopoint,
            "string[]" => FieldType::StringArray,
            "int32[]" => FieldType::Int32Array,
            "int64[]" => FieldType::Int64Array,
            "float[]" => FieldType::FloatArray,
            "bool[]" => FieldType::BoolArray,
            "geopoint[]" => FieldType::GeopointArray,
            "object" => FieldType::Object,
            "object[]" => FieldType::ObjectArray,
            "auto" => FieldType::Auto,
            "string*" => FieldType::StringStar,
            _ => return None,
        };
        Some(ty)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::Float => "float",
            FieldType::Bool => "bool",
            FieldType::Geopoint => "geopoint",
            FieldType::StringArray => "string[]",
            FieldType::Int32Array => "int32[]",
            FieldType::Int64Array => "int64[]",
            FieldType::FloatArray => "float[]",
            FieldType::BoolArray => "bool[]",
            FieldType::GeopointArray => "geopoint[]",
            FieldType::Object => "object",
            FieldType::ObjectArray => "object[]",
            FieldType::Auto => "auto",
            FieldType::StringStar => "string*",
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(
            self,
            FieldType::StringArray
                | FieldType::Int32Array
                | FieldType::Int64Array
                | FieldType::FloatArray
                | FieldType::BoolArray
                | FieldType::GeopointArray
                | FieldType::ObjectArray
        )
    }

    pub fn is_object(&self) -> bool {
        matches!(self, FieldType::Object | FieldType::ObjectArray)
    }

    /// `auto` and `string*` never name a concrete type on their own.
    pub fn is_wildcard_marker(&self) -> bool {
        matches!(self, FieldType::Auto | FieldType::StringStar)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, FieldType::String | FieldType::StringArray)
    }

    /// Types that get `sort: true` when the declaration leaves it unset.
    pub fn sortable_by_default(&self) -> bool {
        matches!(
            self,
            FieldType::Int32
                | FieldType::Int64
                | FieldType::Float
                | FieldType::Bool
                | FieldType::Geopoint
                | FieldType::GeopointArray
        )
    }

    /// Multi-valued form of a singular type. Wildcard markers and types that
    /// are already arrays have no promotion.
    pub fn to_array(&self) -> Option<FieldType> {
        let promoted = match self {
            FieldType::String => FieldType::StringArray,
            FieldType::Int32 => FieldType::Int32Array,
            FieldType::Int64 => FieldType::Int64Array,
            FieldType::Float => FieldType::FloatArray,
            FieldType::Bool => FieldType::BoolArray,
            FieldType::Geopoint => FieldType::GeopointArray,
            FieldType::Object => FieldType::ObjectArray,
            _ => return None,
        };
        Some(promoted)
    }

    /// Promote to the array form when the value sits in an array context.
    pub fn promote_if(self, has_array: bool) -> FieldType {
        if has_array {
            self.to_array().unwrap_or(self)
        } else {
            self
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the type of a single (non-array) JSON value.
fn infer_single(value: &Value) -> Option<FieldType> {
    match value {
        Value::String(_) => Some(FieldType::String),
        Value::Number(n) if n.is_f64() => Some(FieldType::Float),
        Value::Number(_) => Some(FieldType::Int64),
        Value::Bool(_) => Some(FieldType::Bool),
        Value::Object(_) => Some(FieldType::Object),
        Value::Null | Value::Array(_) => None,
    }
}

/// Detect the type of a JSON value.
///
/// Integers are always detected as `int64` and fractional numbers as
/// `float`; arrays take the type of their first element. Returns `None` for
/// `null`, empty arrays and arrays of arrays.
pub fn infer_type(value: &Value) -> Option<FieldType> {
    match value {
        Value::Array(items) => items.first().and_then(infer_single).and_then(|t| t.to_array()),
        other => infer_single(other),
    }
}

/// Whether a detected type is an accepted widening of a declared one.
///
/// `in_object_array` disables the `float[]` → `geopoint` rule: inside an
/// array of objects a bare coordinate pair is ambiguous.
pub fn numerically_satisfies(detected: FieldType, declared: FieldType, in_object_array: bool) -> bool {
    use FieldType::*;

    if detected == declared {
        return false;
    }

    matches!(
        (detected, declared),
        (Int64, Int32) | (Int64, Float) | (Int64Array, Int32Array) | (Int64Array, FloatArray) | (FloatArray, GeopointArray)
    ) || (detected == FloatArray && declared == Geopoint && !in_object_array)
}

/// Detected type is acceptable for the declared type.
pub fn is_compatible(detected: FieldType, declared: FieldType, in_object_array: bool) -> bool {
    detected == declared || numerically_satisfies(detected, declared, in_object_array)
}
