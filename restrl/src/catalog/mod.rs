//! Normalized operation catalog.
//!
//! The engine consumes per-operation metadata that has already been
//! normalized out of an API contract: id, HTTP method, path template,
//! parameters, request-body schemas per media type, and declared responses.
//! Contract parsing itself happens upstream; this module only defines the
//! record shapes and the JSON loading of the catalog document.

use crate::error::{EngineError, EngineResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// HTTP methods the engine issues. `as_str` yields the lowercase wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    /// Methods eligible for method substitution during mutation.
    pub const MUTABLE: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Patch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Post => "post",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
            HttpMethod::Patch => "patch",
            HttpMethod::Head => "head",
            HttpMethod::Options => "options",
        }
    }
}

/// Parameter location within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterIn {
    Path,
    Query,
    Header,
    Cookie,
}

/// Primitive shape of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Number,
    String,
    Boolean,
    Array,
    Object,
}

impl ValueKind {
    pub const ALL: [ValueKind; 6] = [
        ValueKind::Integer,
        ValueKind::Number,
        ValueKind::String,
        ValueKind::Boolean,
        ValueKind::Array,
        ValueKind::Object,
    ];

    /// Kind of a concrete JSON value.
    pub fn of(value: &Value) -> ValueKind {
        match value {
            Value::Null => ValueKind::String,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => ValueKind::Integer,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }
}

/// Schema tree for a parameter, body, or response field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaProperties {
    #[serde(rename = "type", default)]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub example: Option<Value>,
    #[serde(default)]
    pub properties: IndexMap<String, SchemaProperties>,
    #[serde(default)]
    pub items: Option<Box<SchemaProperties>>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl SchemaProperties {
    pub fn of_kind(kind: ValueKind) -> Self {
        SchemaProperties {
            kind: Some(kind),
            ..Default::default()
        }
    }
}

/// One declared parameter of an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterProperties {
    #[serde(rename = "in")]
    pub in_value: ParameterIn,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub schema: Option<SchemaProperties>,
}

/// One declared response of an operation, keyed by media type inside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseProperties {
    #[serde(default)]
    pub content: IndexMap<String, SchemaProperties>,
}

/// Normalized record for one method+path entry of the contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationProperties {
    pub operation_id: String,
    pub endpoint_path: String,
    pub http_method: HttpMethod,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterProperties>,
    /// Request body schemas keyed by media type.
    #[serde(default)]
    pub request_body: IndexMap<String, SchemaProperties>,
    /// Responses keyed by status pattern ("200", "4XX", "default").
    #[serde(default)]
    pub responses: IndexMap<String, ResponseProperties>,
}

/// The full catalog consumed by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationCatalog {
    pub spec_name: String,
    pub operations: IndexMap<String, OperationProperties>,
}

impl OperationCatalog {
    /// Load a catalog document from a JSON file.
    pub fn from_json_file(path: &Path) -> EngineResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let catalog: OperationCatalog = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Catalog(format!("{}: {}", path.display(), e)))?;
        if catalog.operations.is_empty() {
            return Err(EngineError::Catalog(format!(
                "{}: catalog contains no operations",
                path.display()
            )));
        }
        Ok(catalog)
    }
}

/// Flat field names of a body schema.
///
/// Objects yield their property names. A "container" object holding a single
/// array property, and arrays themselves, are unwrapped down to the element
/// object. Scalar schemas have no addressable fields.
pub fn body_field_names(schema: &SchemaProperties) -> Vec<String> {
    let mut cursor = schema;
    loop {
        match cursor.kind {
            Some(ValueKind::Object) if !cursor.properties.is_empty() => {
                if cursor.properties.len() == 1 {
                    if let Some((_, only)) = cursor.properties.first() {
                        if only.kind == Some(ValueKind::Array) {
                            if let Some(items) = &only.items {
                                cursor = items;
                                continue;
                            }
                        }
                    }
                }
                return cursor.properties.keys().cloned().collect();
            }
            Some(ValueKind::Array) => match &cursor.items {
                Some(items) => {
                    cursor = items;
                    continue;
                }
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        }
    }
}

/// Top-level field mapping of a concrete value that may be wrapped in arrays.
///
/// Arrays are unwrapped down to their first element; an object yields its
/// direct entries; anything else has no mapping.
pub fn flatten_mappings(value: &Value) -> Option<IndexMap<String, Value>> {
    let mut cursor = value;
    loop {
        match cursor {
            Value::Object(map) => {
                return Some(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
            }
            Value::Array(items) if !items.is_empty() => {
                cursor = &items[0];
            }
            _ => return None,
        }
    }
}

/// Rebuild a body value from flat field assignments, honoring the schema's
/// object/array nesting. Array wrappers are re-applied around the object
/// level; scalar schemas cannot be reconstructed from fields.
pub fn construct_body(schema: &SchemaProperties, fields: &IndexMap<String, Value>) -> Option<Value> {
    let mut wrappers = 0usize;
    let mut cursor = schema;
    loop {
        match cursor.kind {
            Some(ValueKind::Object) => {
                let mut object = serde_json::Map::new();
                for (name, value) in fields {
                    if cursor.properties.contains_key(name) {
                        object.insert(name.clone(), value.clone());
                    }
                }
                let mut built = Value::Object(object);
                for _ in 0..wrappers {
                    built = Value::Array(vec![built]);
                }
                return Some(built);
            }
            Some(ValueKind::Array) => match &cursor.items {
                Some(items) => {
                    wrappers += 1;
                    cursor = items;
                }
                None => return None,
            },
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object_schema(fields: &[(&str, ValueKind)]) -> SchemaProperties {
        let mut schema = SchemaProperties::of_kind(ValueKind::Object);
        for (name, kind) in fields {
            schema
                .properties
                .insert(name.to_string(), SchemaProperties::of_kind(*kind));
        }
        schema
    }

    #[test]
    fn test_body_field_names_object() {
        let schema = object_schema(&[("id", ValueKind::Integer), ("name", ValueKind::String)]);
        assert_eq!(body_field_names(&schema), vec!["id", "name"]);
    }

    #[test]
    fn test_body_field_names_array_of_objects() {
        let mut schema = SchemaProperties::of_kind(ValueKind::Array);
        schema.items = Some(Box::new(object_schema(&[("id", ValueKind::Integer)])));
        assert_eq!(body_field_names(&schema), vec!["id"]);
    }

    #[test]
    fn test_body_field_names_container_object() {
        // {items: [{id, tag}]} unwraps to the element object's fields
        let mut inner = SchemaProperties::of_kind(ValueKind::Array);
        inner.items = Some(Box::new(object_schema(&[
            ("id", ValueKind::Integer),
            ("tag", ValueKind::String),
        ])));
        let mut schema = SchemaProperties::of_kind(ValueKind::Object);
        schema.properties.insert("items".to_string(), inner);
        assert_eq!(body_field_names(&schema), vec!["id", "tag"]);
    }

    #[test]
    fn test_body_field_names_scalar() {
        let schema = SchemaProperties::of_kind(ValueKind::String);
        assert!(body_field_names(&schema).is_empty());
    }

    #[test]
    fn test_flatten_mappings_unwraps_arrays() {
        let value = serde_json::json!([[{"id": 7, "name": "x"}]]);
        let mappings = flatten_mappings(&value).unwrap();
        assert_eq!(mappings.get("id"), Some(&serde_json::json!(7)));
        assert!(flatten_mappings(&serde_json::json!("scalar")).is_none());
        assert!(flatten_mappings(&serde_json::json!([])).is_none());
    }

    #[test]
    fn test_construct_body_reapplies_array_wrappers() {
        let mut schema = SchemaProperties::of_kind(ValueKind::Array);
        schema.items = Some(Box::new(object_schema(&[("id", ValueKind::Integer)])));
        let mut fields = IndexMap::new();
        fields.insert("id".to_string(), serde_json::json!(3));
        fields.insert("unknown".to_string(), serde_json::json!("dropped"));
        let built = construct_body(&schema, &fields).unwrap();
        assert_eq!(built, serde_json::json!([{"id": 3}]));
    }

    #[test]
    fn test_catalog_json_round_trip() {
        let raw = serde_json::json!({
            "spec_name": "petstore",
            "operations": {
                "getPet": {
                    "operation_id": "getPet",
                    "endpoint_path": "/pets/{petId}",
                    "http_method": "get",
                    "parameters": {
                        "petId": {"in": "path", "required": true,
                                  "schema": {"type": "integer"}}
                    },
                    "responses": {
                        "200": {"content": {"application/json": {
                            "type": "object",
                            "properties": {"id": {"type": "integer"}}
                        }}}
                    }
                }
            }
        });
        let catalog: OperationCatalog = serde_json::from_value(raw).unwrap();
        let op = &catalog.operations["getPet"];
        assert_eq!(op.http_method, HttpMethod::Get);
        assert_eq!(op.parameters["petId"].in_value, ParameterIn::Path);
    }
}
