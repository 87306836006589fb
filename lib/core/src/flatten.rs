//! Document flattener
//!
//! Nested schema fields (`address.city`, or an `object` field such as
//! `address`) are resolved against a document by walking the field's dotted
//! path through the document's objects and arrays. Every value found is copied
//! to a top-level key named after the field, so the document can be indexed as
//! a flat record:
//!
//! ```text
//! {"address": {"city": "Rome"}}   =>   {"address": {"city": "Rome"},
//!                                        "address.city": "Rome",
//!                                        ".flat": ["address.city"]}
//! ```
//!
//! Alongside the document, flattening returns one descriptor per flattened
//! name describing the shape that was observed (array or not, under an array
//! of objects or not). The caller merges unknown ones back into the schema.

use crate::dynamic::DynamicFields;
use crate::field::FieldDescriptor;
use crate::field_type::{infer_type, is_compatible};
use crate::nested::NestedFieldStore;
use crate::{Error, Result};
use serde_json::map::Entry;
use serde_json::{Map, Value};
use smallvec::SmallVec;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Key listing every flattened field name of a document.
pub const FLAT_KEY: &str = ".flat";

/// Default bound on how deep a walk may go into a document.
pub const DEFAULT_MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Treat every missing field as optional
    pub missing_is_ok: bool,
    /// Maximum object/array depth a walk may reach
    pub max_depth: usize,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        Self {
            missing_is_ok: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Flatten `document` against the nested fields of a schema.
///
/// The document is modified in place. On error, entries written for fields
/// processed earlier in the same call stay in the document, which must then
/// be discarded.
pub fn flatten_document(
    document: &mut Map<String, Value>,
    nested_fields: &NestedFieldStore,
    dynamic_fields: &DynamicFields,
    missing_is_ok: bool,
) -> Result<Vec<FieldDescriptor>> {
    let options = FlattenOptions {
        missing_is_ok,
        ..FlattenOptions::default()
    };
    flatten_document_with(document, nested_fields, dynamic_fields, &options)
}

/// [`flatten_document`] with explicit options.
pub fn flatten_document_with(
    document: &mut Map<String, Value>,
    nested_fields: &NestedFieldStore,
    dynamic_fields: &DynamicFields,
    options: &FlattenOptions,
) -> Result<Vec<FieldDescriptor>> {
    let walker = Walker {
        dynamic_fields,
        max_depth: options.max_depth,
    };
    let mut flattened: BTreeMap<String, FieldDescriptor> = BTreeMap::new();

    for field in nested_fields.iter() {
        let path: SmallVec<[&str; 4]> = field.name.split('.').collect();

        // explicitly provided flat value
        if path.len() > 1 && document.contains_key(&field.name) {
            continue;
        }

        let mut emissions = Vec::new();
        let walked = walker.walk_map(document, field, &path, 0, false, false, 0, &mut emissions);

        match walked {
            Ok(()) => apply(document, emissions, &mut flattened),
            Err(Error::FieldNotFound(_)) if options.missing_is_ok || field.optional => {
                apply(document, emissions, &mut flattened)
            }
            Err(e) => return Err(e),
        }
    }

    // names from an earlier pass survive only while they still belong to a nested field
    let mut flat_names: BTreeSet<String> = match document.get(FLAT_KEY) {
        Some(Value::Array(names)) => names
            .iter()
            .filter_map(Value::as_str)
            .filter(|name| document.contains_key(*name) && is_flattened_name(nested_fields, name))
            .map(str::to_string)
            .collect(),
        _ => BTreeSet::new(),
    };
    flat_names.extend(flattened.keys().cloned());
    document.insert(
        FLAT_KEY.to_string(),
        Value::Array(flat_names.into_iter().map(Value::String).collect()),
    );

    debug!("Flattened {} nested fields", flattened.len());
    Ok(flattened.into_values().collect())
}

/// A dotted name that flattening can produce: a nested field itself, or a
/// name under an object field.
fn is_flattened_name(nested_fields: &NestedFieldStore, name: &str) -> bool {
    if !name.contains('.') {
        return false;
    }
    nested_fields.iter().any(|field| {
        field.name == name
            || (field.is_object()
                && name.len() > field.name.len()
                && name.starts_with(field.name.as_str())
                && name.as_bytes()[field.name.len()] == b'.')
    })
}

/// A value found by a walk, waiting to be written to the document.
struct Emission {
    name: String,
    value: Value,
    append: bool,
    descriptor: FieldDescriptor,
}

/// Write emissions into the document. A name already present in the document
/// that was not written during this call belongs to an earlier pass and is
/// left alone.
fn apply(
    document: &mut Map<String, Value>,
    emissions: Vec<Emission>,
    flattened: &mut BTreeMap<String, FieldDescriptor>,
) {
    for emission in emissions {
        if document.contains_key(&emission.name) && !flattened.contains_key(&emission.name) {
            continue;
        }

        if emission.append {
            append_value(document, emission.name.clone(), emission.value);
        } else {
            document.insert(emission.name.clone(), emission.value);
        }
        flattened.insert(emission.name, emission.descriptor);
    }
}

fn append_value(document: &mut Map<String, Value>, name: String, value: Value) {
    match document.entry(name) {
        Entry::Vacant(slot) => {
            slot.insert(Value::Array(vec![value]));
        }
        Entry::Occupied(mut slot) => match slot.get_mut() {
            Value::Array(items) => items.push(value),
            existing => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
            }
        },
    }
}

struct Walker<'a> {
    dynamic_fields: &'a DynamicFields,
    max_depth: usize,
}

impl<'a> Walker<'a> {
    fn check_depth(&self, field: &FieldDescriptor, depth: usize) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::NestingTooDeep {
                field: field.name.clone(),
                max_depth: self.max_depth,
            });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_value(
        &self,
        value: &Value,
        field: &FieldDescriptor,
        path: &[&str],
        index: usize,
        has_array: bool,
        has_obj_array: bool,
        depth: usize,
        out: &mut Vec<Emission>,
    ) -> Result<()> {
        self.check_depth(field, depth)?;

        if index == path.len() {
            return self.leaf(value, field, path.len(), has_array, has_obj_array, depth, out);
        }

        match value {
            Value::Object(map) => self.walk_map(map, field, path, index, has_array, has_obj_array, depth, out),
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) | Value::Array(_) => {
                Err(Error::FieldNotFound(field.name.clone()))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_map(
        &self,
        map: &Map<String, Value>,
        field: &FieldDescriptor,
        path: &[&str],
        index: usize,
        has_array: bool,
        has_obj_array: bool,
        depth: usize,
        out: &mut Vec<Emission>,
    ) -> Result<()> {
        match map.get(path[index]) {
            None => Err(Error::FieldNotFound(field.name.clone())),
            Some(Value::Array(items)) => {
                if items.is_empty() {
                    return Err(Error::FieldNotFound(field.name.clone()));
                }

                let mut obj_array = has_obj_array;
                for item in items {
                    obj_array = obj_array || item.is_object();
                    self.walk_value(item, field, path, index + 1, true, obj_array, depth + 1, out)?;
                }
                Ok(())
            }
            Some(value) => self.walk_value(value, field, path, index + 1, has_array, has_obj_array, depth + 1, out),
        }
    }

    /// End of the field's path: check the value against the declared type.
    #[allow(clippy::too_many_arguments)]
    fn leaf(
        &self,
        value: &Value,
        field: &FieldDescriptor,
        segments: usize,
        has_array: bool,
        has_obj_array: bool,
        depth: usize,
        out: &mut Vec<Emission>,
    ) -> Result<()> {
        let detected = match self.dynamic_fields.match_type(&field.name) {
            Some(ty) => ty,
            None => match infer_type(value) {
                Some(ty) => ty.promote_if(has_array),
                // null is allowed only for optional fields
                None if value.is_null() && field.optional => return Ok(()),
                None => {
                    return Err(Error::TypeMismatch {
                        field: field.name.clone(),
                        object_array_hint: false,
                    })
                }
            },
        };

        let has_obj_array = has_obj_array || (detected.is_object() && has_array);

        if !is_compatible(detected, field.field_type, has_obj_array) {
            return Err(Error::TypeMismatch {
                field: field.name.clone(),
                object_array_hint: has_obj_array && !field.is_array(),
            });
        }

        if field.is_object() {
            return self.flatten_object(value, field, &field.name, has_array, has_obj_array, depth, out);
        }

        // the declared type is kept: it is what the detected type was accepted as
        let mut descriptor = field.clone();
        descriptor.optional = true;
        descriptor.nested = segments > 1;
        descriptor.nested_array = has_obj_array.into();

        out.push(Emission {
            name: field.name.clone(),
            value: value.clone(),
            append: has_array,
            descriptor,
        });
        Ok(())
    }

    /// Emit every primitive beneath an accepted object value under its
    /// dotted name.
    #[allow(clippy::too_many_arguments)]
    fn flatten_object(
        &self,
        value: &Value,
        field: &FieldDescriptor,
        flat_name: &str,
        has_array: bool,
        has_obj_array: bool,
        depth: usize,
        out: &mut Vec<Emission>,
    ) -> Result<()> {
        self.check_depth(field, depth)?;

        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let child_name = format!("{}.{}", flat_name, key);
                    self.flatten_object(child, field, &child_name, has_array, has_array, depth + 1, out)?;
                }
                Ok(())
            }
            Value::Array(items) => {
                for item in items {
                    self.flatten_object(item, field, flat_name, true, has_obj_array, depth + 1, out)?;
                }
                Ok(())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                let detected = match self.dynamic_fields.match_type(flat_name) {
                    Some(ty) => ty,
                    None => match infer_type(value) {
                        Some(ty) => ty.promote_if(has_array),
                        None => return Ok(()),
                    },
                };

                let mut descriptor = field.clone();
                descriptor.name = flat_name.to_string();
                descriptor.field_type = detected;
                descriptor.optional = true;
                descriptor.nested = true;
                descriptor.nested_array = has_obj_array.into();
                descriptor.reference.clear();
                descriptor.apply_computed_defaults();

                out.push(Emission {
                    name: flat_name.to_string(),
                    value: value.clone(),
                    append: has_array,
                    descriptor,
                });
                Ok(())
            }
        }
    }
}
