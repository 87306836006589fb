use crate::dynamic::DynamicFields;
use crate::embedder::{ModelRegistry, ModelValidator};
use crate::field::{FieldDescriptor, NestedArray};
use crate::field_type::FieldType;
use crate::flatten::{flatten_document_with, FlattenOptions, DEFAULT_MAX_DEPTH};
use crate::nested::NestedFieldStore;
use crate::resolver::resolve;
use crate::{Error, Result};
use parking_lot::{RwLock, RwLockReadGuard, RwLockUpgradableReadGuard};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Collection level settings that change how fields resolve
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaConfig {
    /// Allow `object` fields and dotted field names
    #[serde(default)]
    pub enable_nested_fields: bool,
    /// Depth bound for flattening a single document
    #[serde(default = "default_max_nesting_depth")]
    pub max_nesting_depth: usize,
}

fn default_max_nesting_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            enable_nested_fields: false,
            max_nesting_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Result of a schema update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaChange {
    pub added: Vec<FieldDescriptor>,
    pub dropped: Vec<String>,
}

/// Resolved field schema of one collection
#[derive(Clone)]
pub struct CollectionSchema {
    name: String,
    config: SchemaConfig,
    fields: Vec<FieldDescriptor>,
    nested: NestedFieldStore,
    dynamic: DynamicFields,
    fallback_field_type: Option<FieldType>,
    embedder: Arc<dyn ModelValidator>,
}

impl fmt::Debug for CollectionSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSchema")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("fields", &self.fields)
            .field("nested", &self.nested)
            .field("dynamic", &self.dynamic)
            .field("fallback_field_type", &self.fallback_field_type)
            .finish()
    }
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, config: SchemaConfig, embedder: Arc<dyn ModelValidator>) -> Self {
        Self {
            name: name.into(),
            config,
            fields: Vec::new(),
            nested: NestedFieldStore::new(),
            dynamic: DynamicFields::new(),
            fallback_field_type: None,
            embedder,
        }
    }

    /// Build a schema from a collection definition:
    /// `{"name": .., "enable_nested_fields": .., "fields": [..]}`.
    pub fn from_json(definition: &Value, embedder: Arc<dyn ModelValidator>) -> Result<Self> {
        let name = definition
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid("Parameter `name` is required."))?;
        let fields = definition
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::invalid("Parameter `fields` is required."))?;
        let config: SchemaConfig = serde_json::from_value(definition.clone())?;

        let mut schema = Self::new(name, config, embedder);
        schema.add_fields(fields)?;
        info!("Resolved schema `{}` with {} fields", schema.name, schema.fields.len());
        Ok(schema)
    }

    /// Read a collection definition file, resolving embed fields against the
    /// built-in model registry.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let definition: Value = serde_json::from_str(&raw)?;
        Self::from_json(&definition, Arc::new(ModelRegistry::new()))
    }

    /// Rebuild a schema from the output of [`CollectionSchema::to_json`].
    /// Fields are taken as already resolved.
    pub fn restore(persisted: &Value, embedder: Arc<dyn ModelValidator>) -> Result<Self> {
        let name = persisted
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid("Parameter `name` is required."))?;
        let config: SchemaConfig = serde_json::from_value(persisted.clone())?;
        let fields = persisted
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::invalid("Parameter `fields` is required."))?;

        let mut schema = Self::new(name, config, embedder);
        for raw in fields {
            let field = FieldDescriptor::from_json(raw)?;
            schema.register(field)?;
        }
        schema.nested.compact();
        Ok(schema)
    }

    /// Persisted collection definition with every field fully materialized.
    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "enable_nested_fields": self.config.enable_nested_fields,
            "max_nesting_depth": self.config.max_nesting_depth,
            "fields": self.fields.iter().map(FieldDescriptor::to_json).collect::<Vec<_>>(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn nested_fields(&self) -> &NestedFieldStore {
        &self.nested
    }

    pub fn dynamic_fields(&self) -> &DynamicFields {
        &self.dynamic
    }

    pub fn fallback_field_type(&self) -> Option<FieldType> {
        self.fallback_field_type
    }

    /// Resolve and add field declarations. Either every declaration is added
    /// or, on the first error, none is.
    pub fn add_fields(&mut self, declarations: &[Value]) -> Result<Vec<FieldDescriptor>> {
        let mut next = self.clone();
        let mut added = Vec::new();

        for declaration in declarations {
            for field in resolve(declaration, next.config.enable_nested_fields, next.embedder.as_ref())? {
                next.register(field.clone())?;
                added.push(field);
            }
        }

        for field in &added {
            next.check_embed_sources(field)?;
        }

        if added.iter().any(FieldDescriptor::is_object) {
            next.nested.compact();
        }

        *self = next;
        Ok(added)
    }

    fn register(&mut self, field: FieldDescriptor) -> Result<()> {
        if self.get_field(&field.name).is_some() {
            return Err(Error::invalid(format!("Field `{}` already exists.", field.name)));
        }

        if field.is_fallback() {
            if self.fallback_field_type.is_some() {
                return Err(Error::invalid("There can be only one field named `.*`."));
            }
            self.fallback_field_type = Some(field.field_type);
        }

        if field.is_dynamic() {
            self.dynamic.insert(field.clone())?;
        } else if field.nested {
            self.nested.insert(field.clone());
        }

        self.fields.push(field);
        Ok(())
    }

    fn check_embed_sources(&self, field: &FieldDescriptor) -> Result<()> {
        let Some(embed) = &field.embed else {
            return Ok(());
        };

        for source in &embed.from {
            match self.get_field(source) {
                None => {
                    return Err(Error::invalid(format!(
                        "Property `embed.from` refers to unknown field `{}`.",
                        source
                    )))
                }
                Some(f) if !f.field_type.is_string() => {
                    return Err(Error::invalid(
                        "Property `embed.from` can only refer to string or string array fields.",
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Apply a schema update. Entries with `"drop": true` remove a field,
    /// together with its reference helper and nested descendants; all other
    /// entries are added. Drops are applied first, so a field can be dropped
    /// and re-declared with a new type in one update.
    pub fn update_fields(&mut self, changes: &[Value]) -> Result<SchemaChange> {
        let mut next = self.clone();
        let mut dropped = Vec::new();
        let mut additions = Vec::new();

        for change in changes {
            match change.get("drop") {
                None => additions.push(change.clone()),
                Some(Value::Bool(true)) => {
                    let name = change
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| Error::invalid("Field `name` is required when dropping a field."))?;
                    dropped.extend(next.drop_field(name)?);
                }
                Some(_) => {
                    return Err(Error::invalid(
                        "Field `drop` must have a value of `true` when present.",
                    ))
                }
            }
        }

        let added = next.add_fields(&additions)?;
        *self = next;

        debug!("Schema `{}` updated: {} added, {} dropped", self.name, added.len(), dropped.len());
        Ok(SchemaChange { added, dropped })
    }

    fn drop_field(&mut self, name: &str) -> Result<Vec<String>> {
        let field = self
            .get_field(name)
            .cloned()
            .ok_or_else(|| Error::invalid(format!("Field `{}` is not part of collection schema.", name)))?;

        let helper = field.reference_helper_name();
        let prefix = format!("{}.", name);
        let doomed: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.name == name || f.name == helper || f.name.starts_with(&prefix))
            .map(|f| f.name.clone())
            .collect();

        self.fields.retain(|f| !doomed.contains(&f.name));
        for doomed_name in &doomed {
            self.nested.remove(doomed_name);
            self.dynamic.remove(doomed_name);
        }
        self.nested.erase_prefix(&prefix);

        if field.is_fallback() {
            self.fallback_field_type = None;
        }
        Ok(doomed)
    }

    /// Flatten a document against this schema.
    pub fn flatten(&self, document: &mut Map<String, Value>, missing_is_ok: bool) -> Result<Vec<FieldDescriptor>> {
        let options = FlattenOptions {
            missing_is_ok,
            max_depth: self.config.max_nesting_depth,
        };
        flatten_document_with(document, &self.nested, &self.dynamic, &options)
    }

    /// [`CollectionSchema::flatten`] for a document that has not been checked
    /// to be a JSON object yet.
    pub fn flatten_value(&self, document: &mut Value, missing_is_ok: bool) -> Result<Vec<FieldDescriptor>> {
        match document {
            Value::Object(map) => self.flatten(map, missing_is_ok),
            _ => Err(Error::InvalidDocument("Document must be a JSON object.".to_string())),
        }
    }

    /// Merge flattened descriptors back into the schema. Unknown names are
    /// added; known fields whose `nested_array` is still unknown take the
    /// observed value. Leaves of an object field that is no longer in the
    /// schema are ignored. Returns the number of added fields.
    pub fn merge_flattened(&mut self, flattened: &[FieldDescriptor]) -> usize {
        let mut added = 0;

        for observed in flattened {
            match self.fields.iter().position(|f| f.name == observed.name) {
                Some(index) => {
                    let existing = &mut self.fields[index];
                    if existing.nested_array.is_unknown() && !observed.nested_array.is_unknown() {
                        existing.nested_array = observed.nested_array;
                        if let Some(stored) = self.nested.get_mut(&observed.name) {
                            stored.nested_array = observed.nested_array;
                        }
                    }
                }
                None if observed.nested && !self.has_object_ancestor(&observed.name) => {
                    debug!("Ignoring `{}`: its object field is no longer in the schema", observed.name);
                }
                None => {
                    let mut field = observed.clone();
                    if field.nested_array.is_unknown() {
                        field.nested_array = NestedArray::False;
                    }
                    if field.nested {
                        self.nested.insert(field.clone());
                    }
                    self.fields.push(field);
                    added += 1;
                }
            }
        }

        if added > 0 {
            self.nested.compact();
            debug!("Schema `{}` learned {} nested fields", self.name, added);
        }
        added
    }

    fn has_object_ancestor(&self, name: &str) -> bool {
        name.match_indices('.')
            .any(|(i, _)| self.get_field(&name[..i]).is_some_and(FieldDescriptor::is_object))
    }
}

/// A schema shared between writers and concurrent document flattening.
///
/// Flattening holds the lock shared, schema changes hold it exclusively, so a
/// flatten never observes a half applied update.
#[derive(Clone)]
pub struct SharedSchema {
    inner: Arc<RwLock<CollectionSchema>>,
}

impl SharedSchema {
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            inner: Arc::new(RwLock::new(schema)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CollectionSchema> {
        self.inner.read()
    }

    pub fn flatten(&self, document: &mut Map<String, Value>, missing_is_ok: bool) -> Result<Vec<FieldDescriptor>> {
        self.inner.read().flatten(document, missing_is_ok)
    }

    /// Flatten a batch of documents in parallel against one schema snapshot.
    pub fn flatten_batch(
        &self,
        documents: &mut [Map<String, Value>],
        missing_is_ok: bool,
    ) -> Vec<Result<Vec<FieldDescriptor>>> {
        flatten_all(&self.inner.read(), documents, missing_is_ok)
    }

    /// Flatten a batch and merge every newly observed field into the schema.
    pub fn ingest(
        &self,
        documents: &mut [Map<String, Value>],
        missing_is_ok: bool,
    ) -> Vec<Result<Vec<FieldDescriptor>>> {
        // no writer may slip in between flattening and merging
        let guard = self.inner.upgradable_read();
        let results = flatten_all(&guard, documents, missing_is_ok);

        let observed: Vec<FieldDescriptor> = results
            .iter()
            .filter_map(|r| r.as_ref().ok())
            .flatten()
            .cloned()
            .collect();
        if !observed.is_empty() {
            RwLockUpgradableReadGuard::upgrade(guard).merge_flattened(&observed);
        }
        results
    }

    pub fn add_fields(&self, declarations: &[Value]) -> Result<Vec<FieldDescriptor>> {
        self.inner.write().add_fields(declarations)
    }

    pub fn update_fields(&self, changes: &[Value]) -> Result<SchemaChange> {
        self.inner.write().update_fields(changes)
    }

    pub fn merge_flattened(&self, flattened: &[FieldDescriptor]) -> usize {
        self.inner.write().merge_flattened(flattened)
    }

    pub fn snapshot(&self) -> Value {
        self.inner.read().to_json()
    }
}

fn flatten_all(
    schema: &CollectionSchema,
    documents: &mut [Map<String, Value>],
    missing_is_ok: bool,
) -> Vec<Result<Vec<FieldDescriptor>>> {
    documents
        .par_iter_mut()
        .map(|document| schema.flatten(document, missing_is_ok))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<dyn ModelValidator> {
        Arc::new(ModelRegistry::new())
    }

    fn nested_schema(fields: Value) -> CollectionSchema {
        let definition = json!({"name": "docs", "enable_nested_fields": true, "fields": fields});
        CollectionSchema::from_json(&definition, registry()).unwrap()
    }

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("document must be an object"),
        }
    }

    #[test]
    fn test_schema_creation() {
        let schema = nested_schema(json!([
            {"name": "title", "type": "string"},
            {"name": "id", "type": "string"},
            {"name": "person", "type": "object"},
            {"name": "product_id", "type": "string", "reference": "products.id"},
            {"name": "attr_.*", "type": "string"},
        ]));

        assert_eq!(schema.name(), "docs");
        assert!(schema.config().enable_nested_fields);
        assert_eq!(schema.config().max_nesting_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(schema.fields().len(), 5);
        assert!(schema.get_field("id").is_none());
        assert!(schema.get_field("product_id__reference_helper").is_some());
        assert_eq!(schema.nested_fields().len(), 1);
        assert_eq!(schema.dynamic_fields().len(), 1);
    }

    #[test]
    fn test_missing_definition_parts() {
        assert!(CollectionSchema::from_json(&json!({"fields": []}), registry()).is_err());
        assert!(CollectionSchema::from_json(&json!({"name": "x"}), registry()).is_err());
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut schema = nested_schema(json!([{"name": "title", "type": "string"}]));
        let err = schema.add_fields(&[json!({"name": "title", "type": "int32"})]).unwrap_err();
        assert_eq!(err.to_string(), "Field `title` already exists.");
    }

    #[test]
    fn test_single_fallback_field() {
        let mut schema = nested_schema(json!([{"name": ".*", "type": "auto"}]));
        assert_eq!(schema.fallback_field_type(), Some(FieldType::Auto));
        assert!(schema.add_fields(&[json!({"name": ".*", "type": "string*"})]).is_err());
        assert_eq!(schema.fallback_field_type(), Some(FieldType::Auto));
    }

    #[test]
    fn test_add_fields_is_atomic() {
        let mut schema = nested_schema(json!([]));
        let result = schema.add_fields(&[
            json!({"name": "title", "type": "string"}),
            json!({"name": "bad", "type": "string", "facet": 1}),
        ]);
        assert!(result.is_err());
        assert!(schema.fields().is_empty());
    }

    #[test]
    fn test_embed_sources_must_be_string_fields() {
        let embed = json!({"from": ["title"], "model_config": {"model_name": "ts/e5-small"}});

        let mut ok = nested_schema(json!([{"name": "title", "type": "string"}]));
        let added = ok.add_fields(&[json!({"name": "vec", "type": "float[]", "embed": embed.clone()})]).unwrap();
        assert_eq!(added[0].num_dim, 384);

        let mut wrong_type = nested_schema(json!([{"name": "title", "type": "int32"}]));
        assert!(wrong_type.add_fields(&[json!({"name": "vec", "type": "float[]", "embed": embed.clone()})]).is_err());

        let mut missing = nested_schema(json!([]));
        assert!(missing.add_fields(&[json!({"name": "vec", "type": "float[]", "embed": embed})]).is_err());
    }

    #[test]
    fn test_object_field_compacts_store() {
        let mut schema = nested_schema(json!([{"name": "person.name", "type": "string"}]));
        assert!(schema.nested_fields().contains("person.name"));

        schema.add_fields(&[json!({"name": "person", "type": "object"})]).unwrap();
        assert!(!schema.nested_fields().contains("person.name"));
        assert!(schema.nested_fields().contains("person"));
        assert!(schema.get_field("person.name").is_some());
    }

    #[test]
    fn test_flatten_and_merge() {
        let mut schema = nested_schema(json!([
            {"name": "items", "type": "object[]"},
            {"name": "meta.rank", "type": "int32"},
        ]));
        let mut document = doc(json!({"items": [{"sku": "a"}, {"sku": "b"}], "meta": {"rank": 3}}));

        let flattened = schema.flatten(&mut document, false).unwrap();
        assert_eq!(document["items.sku"], json!(["a", "b"]));

        let added = schema.merge_flattened(&flattened);
        assert_eq!(added, 1);
        let sku = schema.get_field("items.sku").unwrap();
        assert_eq!(sku.field_type, FieldType::StringArray);
        assert_eq!(sku.nested_array, NestedArray::True);
        assert!(!schema.nested_fields().contains("items.sku"));

        // lazily resolved on first observation
        assert_eq!(schema.get_field("meta.rank").unwrap().nested_array, NestedArray::False);
        assert_eq!(schema.nested_fields().get("meta.rank").unwrap().nested_array, NestedArray::False);

        assert_eq!(schema.merge_flattened(&flattened), 0);
    }

    #[test]
    fn test_flatten_value_requires_object() {
        let schema = nested_schema(json!([]));
        let err = schema.flatten_value(&mut json!([1, 2]), false).unwrap_err();
        assert!(matches!(err, Error::InvalidDocument(_)));
    }

    #[test]
    fn test_nesting_depth_from_config() {
        let definition = json!({
            "name": "docs", "enable_nested_fields": true, "max_nesting_depth": 1,
            "fields": [{"name": "a", "type": "object"}]
        });
        let schema = CollectionSchema::from_json(&definition, registry()).unwrap();
        let mut document = doc(json!({"a": {"b": {"c": 1}}}));
        let err = schema.flatten(&mut document, false).unwrap_err();
        assert!(matches!(err, Error::NestingTooDeep { max_depth: 1, .. }));
    }

    #[test]
    fn test_update_drop_and_readd() {
        let mut schema = nested_schema(json!([
            {"name": "title", "type": "string"},
            {"name": "product_id", "type": "string", "reference": "products.id"},
            {"name": "person", "type": "object"},
        ]));
        schema.merge_flattened(&[{
            let mut leaf = FieldDescriptor::new("person.name", FieldType::String).optional(true);
            leaf.nested = true;
            leaf
        }]);

        let change = schema
            .update_fields(&[
                json!({"name": "title", "drop": true}),
                json!({"name": "title", "type": "string[]"}),
                json!({"name": "product_id", "drop": true}),
                json!({"name": "person", "drop": true}),
            ])
            .unwrap();

        assert_eq!(change.added.len(), 1);
        assert!(change.dropped.contains(&"product_id__reference_helper".to_string()));
        assert!(change.dropped.contains(&"person.name".to_string()));
        assert_eq!(schema.get_field("title").unwrap().field_type, FieldType::StringArray);
        assert!(schema.get_field("product_id__reference_helper").is_none());
        assert!(schema.nested_fields().is_empty());
    }

    #[test]
    fn test_update_errors_leave_schema_untouched() {
        let mut schema = nested_schema(json!([{"name": "title", "type": "string"}]));

        assert!(schema.update_fields(&[json!({"name": "nope", "drop": true})]).is_err());
        assert!(schema.update_fields(&[json!({"name": "title", "drop": false})]).is_err());
        assert!(schema
            .update_fields(&[json!({"name": "title", "drop": true}), json!({"name": "x", "type": "blob"})])
            .is_err());
        assert!(schema.get_field("title").is_some());
    }

    #[test]
    fn test_dropping_fallback_frees_slot() {
        let mut schema = nested_schema(json!([{"name": ".*", "type": "auto"}]));
        schema.update_fields(&[json!({"name": ".*", "drop": true})]).unwrap();
        assert!(schema.fallback_field_type().is_none());
        assert!(schema.dynamic_fields().is_empty());
        schema.add_fields(&[json!({"name": ".*", "type": "string*"})]).unwrap();
        assert_eq!(schema.fallback_field_type(), Some(FieldType::StringStar));
    }

    #[test]
    fn test_persisted_roundtrip() {
        let schema = nested_schema(json!([
            {"name": "title", "type": "string", "facet": true},
            {"name": "loc", "type": "geopoint"},
            {"name": "person", "type": "object"},
            {"name": ".*", "type": "auto"},
        ]));
        let persisted = schema.to_json();
        let restored = CollectionSchema::restore(&persisted, registry()).unwrap();
        assert_eq!(restored.fields(), schema.fields());
        assert_eq!(restored.nested_fields(), schema.nested_fields());
        assert_eq!(restored.fallback_field_type(), Some(FieldType::Auto));
        assert_eq!(restored.to_json(), persisted);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(
            &path,
            r#"{"name": "books", "fields": [{"name": "title", "type": "string"}, {"name": "year", "type": "int32"}]}"#,
        )
        .unwrap();

        let schema = CollectionSchema::from_file(&path).unwrap();
        assert_eq!(schema.name(), "books");
        assert!(!schema.config().enable_nested_fields);
        assert!(schema.get_field("year").unwrap().sort);

        assert!(matches!(CollectionSchema::from_file(dir.path().join("missing.json")), Err(Error::Io(_))));
    }

    #[test]
    fn test_merge_after_drop_ignores_orphan_leaves() {
        let mut schema = nested_schema(json!([{"name": "person", "type": "object"}]));
        let mut document = doc(json!({"person": {"name": "Jack"}}));
        let flattened = schema.flatten(&mut document, false).unwrap();

        schema.update_fields(&[json!({"name": "person", "drop": true})]).unwrap();
        assert_eq!(schema.merge_flattened(&flattened), 0);
        assert!(schema.fields().is_empty());
        assert!(schema.nested_fields().is_empty());
    }

    #[test]
    fn test_shared_ingest_racing_drop() {
        let shared = SharedSchema::new(nested_schema(json!([{"name": "person", "type": "object"}])));

        let writer = {
            let shared = shared.clone();
            std::thread::spawn(move || shared.update_fields(&[json!({"name": "person", "drop": true})]))
        };
        let mut documents: Vec<_> = (0..64).map(|i| doc(json!({"person": {"age": i}}))).collect();
        shared.ingest(&mut documents, true);
        writer.join().unwrap().unwrap();

        // whichever ran first, no leaf of the dropped object survives
        let schema = shared.read();
        assert!(schema.get_field("person").is_none());
        assert!(schema.get_field("person.age").is_none());
        assert!(schema.nested_fields().is_empty());
    }

    #[test]
    fn test_shared_schema_batch() {
        let shared = SharedSchema::new(nested_schema(json!([{"name": "a.b", "type": "int32"}])));

        let mut documents: Vec<_> = (0..32).map(|i| doc(json!({"a": {"b": i}}))).collect();
        documents.push(doc(json!({"a": {"b": "x"}})));

        let results = shared.ingest(&mut documents, false);
        assert_eq!(results.len(), 33);
        assert!(results[..32].iter().all(|r| r.is_ok()));
        assert!(results[32].is_err());
        assert_eq!(documents[7]["a.b"], json!(7));

        let schema = shared.read();
        assert_eq!(schema.get_field("a.b").unwrap().nested_array, NestedArray::False);
    }

    #[test]
    fn test_shared_schema_concurrent_readers() {
        let shared = SharedSchema::new(nested_schema(json!([{"name": "person", "type": "object"}])));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let mut document = doc(json!({"person": {"age": i}}));
                    let flattened = shared.flatten(&mut document, false).unwrap();
                    shared.merge_flattened(&flattened);
                    document
                })
            })
            .collect();

        for handle in handles {
            let document = handle.join().unwrap();
            assert!(document.contains_key("person.age"));
        }
        assert!(shared.read().get_field("person.age").is_some());
        assert_eq!(shared.snapshot()["fields"].as_array().unwrap().len(), 2);
    }
}
