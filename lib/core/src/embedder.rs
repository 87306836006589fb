//! Embedding model validation
//!
//! Fields with an `embed` block are vector fields whose dimensionality comes
//! from the model that fills them. The resolver asks a [`ModelValidator`] for
//! that dimensionality; [`ModelRegistry`] answers from a static table of
//! known models.

use crate::{Error, Result};
use ahash::AHashMap;
use serde_json::Value;

/// Dimensionality of the built-in text models
pub const DEFAULT_TEXT_DIM: u32 = 384;

/// Prefix of models served by the OpenAI API
pub const OPENAI_MODEL_PREFIX: &str = "openai/";

/// Validates an `embed.model_config` object and reports the model's output
/// dimensionality.
pub trait ModelValidator: Send + Sync {
    fn validate_model(&self, model_config: &Value) -> Result<u32>;
}

/// Static table of embedding models
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: AHashMap<String, u32>,
}

impl ModelRegistry {
    /// Registry preloaded with the built-in and OpenAI models.
    pub fn new() -> Self {
        ModelRegistryBuilder::new().with_defaults().build()
    }

    pub fn dimensions(&self, model_name: &str) -> Option<u32> {
        self.models.get(model_name).copied()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelValidator for ModelRegistry {
    fn validate_model(&self, model_config: &Value) -> Result<u32> {
        let model_name = model_config
            .get("model_name")
            .and_then(Value::as_str)
            .ok_or_else(|| embedding_error(400, "Property `embed.model_config.model_name` must be a string."))?;

        let num_dim = self
            .dimensions(model_name)
            .ok_or_else(|| embedding_error(404, "Model not found"))?;

        if model_name.starts_with(OPENAI_MODEL_PREFIX) {
            match model_config.get("api_key") {
                Some(Value::String(key)) if !key.is_empty() => {}
                Some(_) => return Err(embedding_error(400, "API key must be a non-empty string.")),
                None => return Err(embedding_error(400, "API key is missing.")),
            }
        }

        Ok(num_dim)
    }
}

fn embedding_error(code: u16, message: &str) -> Error {
    Error::InvalidEmbeddingConfig {
        code,
        message: message.to_string(),
    }
}

/// Builder for a [`ModelRegistry`] with custom models
#[derive(Debug, Clone, Default)]
pub struct ModelRegistryBuilder {
    models: AHashMap<String, u32>,
}

impl ModelRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(self) -> Self {
        self.model("ts/all-MiniLM-L12-v2", DEFAULT_TEXT_DIM)
            .model("ts/e5-small", DEFAULT_TEXT_DIM)
            .model("ts/multilingual-e5-small", DEFAULT_TEXT_DIM)
            .model("openai/text-embedding-ada-002", 1536)
            .model("openai/text-embedding-3-small", 1536)
            .model("openai/text-embedding-3-large", 3072)
    }

    pub fn model(mut self, name: impl Into<String>, num_dim: u32) -> Self {
        self.models.insert(name.into(), num_dim);
        self
    }

    pub fn build(self) -> ModelRegistry {
        ModelRegistry { models: self.models }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_model() {
        let registry = ModelRegistry::new();
        let dim = registry.validate_model(&json!({"model_name": "ts/e5-small"})).unwrap();
        assert_eq!(dim, 384);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::new();
        let err = registry.validate_model(&json!({"model_name": "nope"})).unwrap_err();
        assert_eq!(err.code(), 404);
        assert_eq!(err.to_string(), "Model not found");
    }

    #[test]
    fn test_openai_requires_key() {
        let registry = ModelRegistry::new();
        let config = json!({"model_name": "openai/text-embedding-3-large"});
        assert_eq!(registry.validate_model(&config).unwrap_err().code(), 400);

        let config = json!({"model_name": "openai/text-embedding-3-large", "api_key": "sk-test"});
        assert_eq!(registry.validate_model(&config).unwrap(), 3072);
    }

    #[test]
    fn test_builder_pattern() {
        let registry = ModelRegistryBuilder::new().model("local/tiny", 8).build();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.validate_model(&json!({"model_name": "local/tiny"})).unwrap(), 8);
        assert!(registry.dimensions("ts/e5-small").is_none());
    }
}
