//! Field declaration resolver
//!
//! Turns one raw JSON field declaration into validated [`FieldDescriptor`]s.
//! Checks run in a fixed order and the first failure is returned, so a
//! declaration with several problems always reports the same one.

use crate::embedder::ModelValidator;
use crate::field::{
    is_dynamic, EmbedConfig, FieldDescriptor, ModelConfig, NestedArray, VectorDistance, FALLBACK_FIELD_NAME,
    WILDCARD_TOKEN,
};
use crate::field_type::FieldType;
use crate::{Error, Result};
use serde_json::{Map, Value};
use tracing::warn;

const RESERVED_ID_FIELD: &str = "id";

const WRONG_FORMAT: &str = "Wrong format for `fields`. It should be an array of objects containing \
                            `name`, `type`, `optional` and `facet` properties.";

/// Resolve a field declaration.
///
/// Returns no descriptor for the reserved `id` field, one descriptor for
/// ordinary fields and two for reference fields (the field and its
/// `__reference_helper` companion).
pub fn resolve(
    field_json: &Value,
    enable_nested_fields: bool,
    embedder: &dyn ModelValidator,
) -> Result<Vec<FieldDescriptor>> {
    if field_json.get("name").and_then(Value::as_str) == Some(RESERVED_ID_FIELD) {
        warn!("Collection schema cannot contain a field with name `id`. Ignoring field.");
        return Ok(Vec::new());
    }

    let decl = field_json.as_object().ok_or_else(|| Error::invalid(WRONG_FORMAT))?;
    let (name, raw_type) = match (decl.get("name"), decl.get("type")) {
        (Some(Value::String(name)), Some(Value::String(ty))) => (name.as_str(), ty.as_str()),
        _ => return Err(Error::invalid(WRONG_FORMAT)),
    };

    if decl.contains_key("drop") {
        return Err(Error::invalid(format!(
            "Invalid property `drop` on field `{}`: it is allowed only during schema update.",
            name
        )));
    }

    let facet = bool_property(decl, "facet", name)?;
    let optional = bool_property(decl, "optional", name)?;
    let index = bool_property(decl, "index", name)?;
    let sort = bool_property(decl, "sort", name)?;
    let infix = bool_property(decl, "infix", name)?;

    let locale = match decl.get("locale") {
        None => String::new(),
        Some(Value::String(locale)) => {
            // two ASCII letters: length is counted in bytes
            if !locale.is_empty() && locale.len() != 2 {
                return Err(Error::invalid(format!(
                    "The `locale` value of the field `{}` is not valid.",
                    name
                )));
            }
            locale.clone()
        }
        Some(_) => {
            return Err(Error::invalid(format!(
                "The `locale` property of the field `{}` should be a string.",
                name
            )))
        }
    };

    let reference = match decl.get("reference") {
        None => String::new(),
        Some(Value::String(r)) => r.clone(),
        Some(_) => return Err(Error::invalid("Reference should be a string.")),
    };

    if name == FALLBACK_FIELD_NAME {
        return resolve_fallback(raw_type, facet, optional, index, sort, infix, locale, &reference);
    }

    let field_type = FieldType::parse(raw_type).ok_or_else(|| {
        Error::invalid(format!("Field `{}` has an invalid data type `{}`.", name, raw_type))
    })?;

    let facet = facet.unwrap_or(false);
    let index = index.unwrap_or(true);
    let infix = infix.unwrap_or(false);
    let mut sort = sort.unwrap_or_else(|| field_type.sortable_by_default() && !decl.contains_key("num_dim"));

    if field_type.is_object() && !enable_nested_fields {
        return Err(Error::invalid(
            "Type `object` or `object[]` can be used only when nested fields are enabled by \
             setting` enable_nested_fields` to true.",
        ));
    }

    let (embed, embed_dim) = match decl.get("embed") {
        Some(embed_json) => {
            let (config, num_dim) = resolve_embed(embed_json, embedder)?;
            (Some(config), Some(num_dim))
        }
        None => (None, None),
    };

    let (num_dim, vec_dist) = resolve_vector(decl, embed_dim, field_type, facet, sort)?;

    let optional = optional.unwrap_or_else(|| is_dynamic(name, field_type));

    let is_regexp_name = name.contains(WILDCARD_TOKEN);
    if is_regexp_name && !reference.is_empty() {
        return Err(Error::invalid("Wildcard field cannot have a reference."));
    }

    let (nested, nested_array) =
        if field_type.is_object() || (!is_regexp_name && enable_nested_fields && name.contains('.')) {
            (true, NestedArray::Unknown)
        } else {
            (false, NestedArray::False)
        };

    if field_type == FieldType::Geopoint && !sort {
        warn!("Forcing geopoint field `{}` to be sortable.", name);
        sort = true;
    }

    if !reference.is_empty() {
        let tokens = reference.split('.').filter(|t| !t.trim().is_empty()).count();
        if tokens < 2 {
            return Err(Error::invalid(format!("Invalid reference `{}`.", reference)));
        }
    }

    let field = FieldDescriptor {
        name: name.to_string(),
        field_type,
        facet,
        optional,
        index,
        sort,
        infix,
        locale,
        nested,
        nested_array,
        num_dim,
        vec_dist,
        reference,
        embed,
    };

    let mut fields = Vec::with_capacity(2);
    if !field.reference.is_empty() {
        let helper = field.reference_helper();
        fields.push(field);
        fields.push(helper);
    } else {
        fields.push(field);
    }

    Ok(fields)
}

fn bool_property(decl: &Map<String, Value>, key: &str, name: &str) -> Result<Option<bool>> {
    match decl.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(Error::invalid(format!(
            "The `{}` property of the field `{}` should be a boolean.",
            key, name
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
fn resolve_fallback(
    raw_type: &str,
    facet: Option<bool>,
    optional: Option<bool>,
    index: Option<bool>,
    sort: Option<bool>,
    infix: Option<bool>,
    locale: String,
    reference: &str,
) -> Result<Vec<FieldDescriptor>> {
    if optional == Some(false) {
        return Err(Error::invalid("Field `.*` must be an optional field."));
    }
    if facet == Some(true) {
        return Err(Error::invalid("Field `.*` cannot be a facet field."));
    }
    if index == Some(false) {
        return Err(Error::invalid("Field `.*` must be an index field."));
    }
    if !reference.is_empty() {
        return Err(Error::invalid("Field `.*` cannot be a reference field."));
    }

    let field_type = FieldType::parse(raw_type).ok_or_else(|| Error::invalid("The `type` of field `.*` is invalid."))?;

    let mut field = FieldDescriptor::new(FALLBACK_FIELD_NAME, field_type).optional(true);
    field.sort = sort.unwrap_or(false);
    field.infix = infix.unwrap_or(false);
    field.locale = locale;
    Ok(vec![field])
}

fn resolve_embed(embed_json: &Value, embedder: &dyn ModelValidator) -> Result<(EmbedConfig, u32)> {
    let embed = embed_json
        .as_object()
        .ok_or_else(|| Error::invalid("Property `embed` must be an object."))?;

    let from = embed
        .get("from")
        .ok_or_else(|| Error::invalid("Property `embed.from` not found."))?;
    let from: Vec<String> = match from {
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<_>>()
            .ok_or_else(|| Error::invalid("Property `embed.from` must be an array of strings."))?,
        _ => return Err(Error::invalid("Property `embed.from` must be an array of strings.")),
    };

    let model_config = embed
        .get("model_config")
        .ok_or_else(|| Error::invalid("Property `embed.model_config` not found."))?;

    match model_config.get("model_name") {
        None => return Err(Error::invalid("Property `embed.model_config.model_name` not found.")),
        Some(Value::String(model_name)) if model_name.is_empty() => {
            return Err(Error::invalid("Property `embed.model_config.model_name` cannot be empty."))
        }
        Some(Value::String(_)) => {}
        Some(_) => return Err(Error::invalid("Property `embed.model_config.model_name` must be a string.")),
    }

    for prefix in ["indexing_prefix", "query_prefix"] {
        if let Some(value) = model_config.get(prefix) {
            if !value.is_string() {
                return Err(Error::invalid(format!(
                    "Property `embed.model_config.{}` must be a string.",
                    prefix
                )));
            }
        }
    }

    let num_dim = embedder.validate_model(model_config)?;

    let model_config: ModelConfig = serde_json::from_value(model_config.clone())
        .map_err(|e| Error::invalid(format!("Property `embed.model_config` is invalid: {}", e)))?;

    Ok((EmbedConfig { from, model_config }, num_dim))
}

fn resolve_vector(
    decl: &Map<String, Value>,
    embed_dim: Option<u32>,
    field_type: FieldType,
    facet: bool,
    sort: bool,
) -> Result<(u32, VectorDistance)> {
    let num_dim = match (embed_dim, decl.get("num_dim")) {
        (Some(dim), _) => dim,
        (None, None) => return Ok((0, VectorDistance::Cosine)),
        (None, Some(raw)) => raw
            .as_u64()
            .filter(|&d| d > 0)
            .and_then(|d| u32::try_from(d).ok())
            .ok_or_else(|| Error::invalid("Property `num_dim` must be a positive integer."))?,
    };

    if field_type != FieldType::FloatArray {
        return Err(Error::invalid("Property `num_dim` is only allowed on a float array field."));
    }

    if facet {
        return Err(Error::invalid("Property `facet` is not allowed on a vector field."));
    }

    if sort {
        return Err(Error::invalid("Property `sort` cannot be enabled on a vector field."));
    }

    let vec_dist = match decl.get("vec_dist") {
        None => VectorDistance::default(),
        Some(Value::String(s)) => {
            VectorDistance::parse(s).ok_or_else(|| Error::invalid("Property `vec_dist` is invalid."))?
        }
        Some(_) => return Err(Error::invalid("Property `vec_dist` must be a string.")),
    };

    Ok((num_dim, vec_dist))
}
