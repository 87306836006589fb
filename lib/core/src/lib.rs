//! # docflat Core
//!
//! Core library for docflat, the schema layer of a search engine's
//! collection model.
//!
//! This crate provides field resolution and document flattening:
//!
//! - [`resolve`] - Validate a raw JSON field declaration into [`FieldDescriptor`]s
//! - [`CollectionSchema`] - Resolved fields of one collection with schema updates
//! - [`NestedFieldStore`] - Ordered map of nested field names with prefix compaction
//! - [`DynamicFields`] - Regex named fields used to type unknown leaves
//! - [`flatten_document`] - Copy nested values of a document to dotted top-level keys
//! - [`SharedSchema`] - A schema shared between writers and parallel flattening
//!
//! ## Example
//!
//! ```rust
//! use docflat_core::{CollectionSchema, ModelRegistry};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let definition = json!({
//!     "name": "people",
//!     "enable_nested_fields": true,
//!     "fields": [{"name": "address", "type": "object"}]
//! });
//! let mut schema = CollectionSchema::from_json(&definition, Arc::new(ModelRegistry::new())).unwrap();
//!
//! let mut document = json!({"address": {"city": "Rome"}});
//! let flattened = schema.flatten_value(&mut document, false).unwrap();
//! assert_eq!(document["address.city"], "Rome");
//!
//! // learn `address.city` as a field of its own
//! schema.merge_flattened(&flattened);
//! assert!(schema.get_field("address.city").is_some());
//! ```

pub mod collection;
pub mod dynamic;
pub mod embedder;
pub mod error;
pub mod field;
pub mod field_type;
pub mod flatten;
pub mod nested;
pub mod resolver;

pub use collection::{CollectionSchema, SchemaChange, SchemaConfig, SharedSchema};
pub use dynamic::DynamicFields;
pub use embedder::{ModelRegistry, ModelRegistryBuilder, ModelValidator};
pub use error::{Error, Result};
pub use field::{EmbedConfig, FieldDescriptor, ModelConfig, NestedArray, VectorDistance};
pub use field_type::FieldType;
pub use flatten::{flatten_document, flatten_document_with, FlattenOptions, FLAT_KEY};
pub use nested::NestedFieldStore;
pub use resolver::resolve;
