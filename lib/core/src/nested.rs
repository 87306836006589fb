//! Nested field store
//!
//! Nested field descriptors ordered by their dotted name. Sorting by name puts
//! every descendant of `a` (`a.b`, `a.b.c`, ...) in one contiguous range
//! starting at `"a."`, which is what prefix deletion relies on.

use crate::field::FieldDescriptor;
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedFieldStore {
    fields: BTreeMap<String, FieldDescriptor>,
}

impl NestedFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: FieldDescriptor) -> Option<FieldDescriptor> {
        self.fields.insert(field.name.clone(), field)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FieldDescriptor> {
        self.fields.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldDescriptor> {
        self.fields.remove(name)
    }

    /// Names starting with `prefix`, in order.
    pub fn names_with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .map(|(name, _)| name.as_str())
            .take_while(move |name| name.starts_with(prefix))
    }

    /// Remove every entry whose name starts with `prefix`; returns how many
    /// were removed.
    pub fn erase_prefix(&mut self, prefix: &str) -> usize {
        let doomed: Vec<String> = self.names_with_prefix(prefix).map(str::to_string).collect();
        for name in &doomed {
            self.fields.remove(name);
        }
        doomed.len()
    }

    /// Drop descendants of every stored field, so that an object field
    /// supersedes the leaves discovered under it.
    pub fn compact(&mut self) -> usize {
        let names: Vec<String> = self.fields.keys().cloned().collect();
        let mut removed = 0;
        for name in &names {
            if self.fields.contains_key(name) {
                removed += self.erase_prefix(&format!("{}.", name));
            }
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<FieldDescriptor> for NestedFieldStore {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        let mut store = NestedFieldStore::new();
        for field in iter {
            store.insert(field);
        }
        store
    }
}
