//! Dynamic field matcher
//!
//! A dynamic field is declared with a pattern name (`attr_.*`) or with one of
//! the wildcard marker types. When a concrete field matches a typed pattern,
//! the pattern's declared type is used instead of inferring one from the
//! value.

use crate::field::FieldDescriptor;
use crate::field_type::FieldType;
use crate::{Error, Result};
use regex::Regex;

#[derive(Debug, Clone)]
struct DynamicField {
    field: FieldDescriptor,
    pattern: Regex,
}

/// Dynamic field declarations in insertion order
#[derive(Debug, Clone, Default)]
pub struct DynamicFields {
    entries: Vec<DynamicField>,
}

impl DynamicFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dynamic field, replacing a previous one with the same name.
    ///
    /// The name must match a concrete field name in full, so it is anchored
    /// before compiling.
    pub fn insert(&mut self, field: FieldDescriptor) -> Result<()> {
        let pattern = Regex::new(&format!("^(?:{})$", field.name)).map_err(|_| {
            Error::invalid(format!("Field `{}` has an invalid regular expression name.", field.name))
        })?;

        match self.entries.iter_mut().find(|e| e.field.name == field.name) {
            Some(existing) => *existing = DynamicField { field, pattern },
            None => self.entries.push(DynamicField { field, pattern }),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldDescriptor> {
        let pos = self.entries.iter().position(|e| e.field.name == name)?;
        Some(self.entries.remove(pos).field)
    }

    /// Type of the first typed pattern matching `field_name`.
    ///
    /// `auto` and `string*` declarations are skipped. Patterns are tried in
    /// insertion order, so overlapping patterns resolve to the earliest one.
    pub fn match_type(&self, field_name: &str) -> Option<FieldType> {
        self.entries
            .iter()
            .filter(|e| !e.field.field_type.is_wildcard_marker())
            .find(|e| e.pattern.is_match(field_name))
            .map(|e| e.field.field_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.entries.iter().map(|e| &e.field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
