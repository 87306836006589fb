//! # docflat
//!
//! Field schema resolution and nested JSON document flattening for search
//! collections.
//!
//! A collection schema is declared as a list of JSON field declarations.
//! docflat validates each declaration into a fully materialized field
//! descriptor, and flattens nested documents so that every nested value the
//! schema knows about is available under a dotted top-level key.
//!
//! ## Quick Start
//!
//! ### As a CLI
//!
//! ```bash
//! docflat resolve --schema people.json
//! docflat flatten --schema people.json --input people.jsonl
//! docflat events --input events.jsonl
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use docflat::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let definition = json!({
//!     "name": "people",
//!     "enable_nested_fields": true,
//!     "fields": [{"name": "address.city", "type": "string"}]
//! });
//! let schema = CollectionSchema::from_json(&definition, Arc::new(ModelRegistry::new())).unwrap();
//!
//! let mut document = json!({"address": {"city": "Rome"}});
//! schema.flatten_value(&mut document, false).unwrap();
//! assert_eq!(document["address.city"], "Rome");
//! assert_eq!(document[".flat"], json!(["address.city"]));
//! ```
//!
//! ## Crate Structure
//!
//! - [`docflat-core`](https://docs.rs/docflat-core) - Field resolution, schema, flattening
//! - [`docflat-analytics`](https://docs.rs/docflat-analytics) - Search and click event ingestion

// Re-export core types
pub use docflat_core::{
    flatten_document, resolve, CollectionSchema, DynamicFields, Error, FieldDescriptor, FieldType,
    FlattenOptions, ModelRegistry, ModelValidator, NestedArray, NestedFieldStore, Result,
    SchemaChange, SchemaConfig, SharedSchema, FLAT_KEY,
};

// Re-export analytics
pub use docflat_analytics::{AnalyticsSink, ClickEvent, EventError, EventManager, InMemoryAnalytics};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        flatten_document, resolve, AnalyticsSink, CollectionSchema, Error, EventManager,
        FieldDescriptor, FieldType, InMemoryAnalytics, ModelRegistry, NestedFieldStore, Result,
        SchemaConfig, SharedSchema,
    };
}
