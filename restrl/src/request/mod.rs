//! Request assembly.
//!
//! Turns the agents' chosen parameter/body/header values into a concrete
//! request plan: path parameters are substituted into the URL template and
//! removed from the query payload, and the body is encoded under
//! media-type-specific rules.

pub mod mutate;

use crate::catalog::{flatten_mappings, HttpMethod, OperationProperties, ParameterIn};
use indexmap::IndexMap;
use serde_json::Value;

/// Body encoding chosen from the payload's media type.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPayload {
    /// Structured JSON, sent with `Content-Type: application/json`.
    Json(Value),
    /// Single-level field mapping for form encoding.
    Form(IndexMap<String, String>),
    /// Payload wrapped as a single JSON-serialized file part.
    Multipart(Value),
    /// Payload coerced to a string.
    Text(String),
}

/// A fully assembled request, ready for the transport.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    pub operation_id: String,
    pub method: HttpMethod,
    /// Path with all path parameters substituted.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: IndexMap<String, String>,
    pub body: Option<BodyPayload>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten an arbitrary payload to the single-level string mapping form
/// encoding requires; non-mapping payloads are wrapped in a synthetic
/// `data` field.
fn form_fields(payload: &Value) -> IndexMap<String, String> {
    match flatten_mappings(payload) {
        Some(mappings) if !mappings.is_empty() => mappings
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        _ => {
            let mut fields = IndexMap::new();
            fields.insert("data".to_string(), value_to_string(payload));
            fields
        }
    }
}

fn encode_body(media_type: &str, payload: &Value) -> (BodyPayload, Option<&'static str>) {
    match media_type {
        "application/json" => (BodyPayload::Json(payload.clone()), Some("application/json")),
        "application/x-www-form-urlencoded" => (
            BodyPayload::Form(form_fields(payload)),
            Some("application/x-www-form-urlencoded"),
        ),
        // The multipart boundary is generated by the client; no explicit
        // Content-Type header here.
        "multipart/form-data" => (BodyPayload::Multipart(payload.clone()), None),
        _ => (BodyPayload::Text(value_to_string(payload)), Some("text/plain")),
    }
}

/// Assemble the concrete request for an operation.
///
/// `parameters` holds the selected parameter values, `body` at most one
/// media-type → payload entry, and `method_override` replaces the declared
/// method (mutation). Path parameters are consumed by the template; all
/// remaining parameters travel in the query string.
pub fn assemble(
    operation: &OperationProperties,
    parameters: Option<&IndexMap<String, Value>>,
    body: Option<&IndexMap<String, Value>>,
    auth_header: Option<&str>,
    method_override: Option<HttpMethod>,
) -> RequestPlan {
    let mut path = operation.endpoint_path.clone();
    let mut query: Vec<(String, String)> = Vec::new();

    if let Some(parameters) = parameters {
        for (name, value) in parameters {
            let is_path = operation
                .parameters
                .get(name)
                .map(|p| p.in_value == ParameterIn::Path)
                .unwrap_or(false);
            if is_path {
                let placeholder = format!("{{{}}}", name);
                let encoded = urlencoding::encode(&value_to_string(value)).into_owned();
                path = path.replace(&placeholder, &encoded);
            } else {
                query.push((name.clone(), value_to_string(value)));
            }
        }
    }

    let mut headers: IndexMap<String, String> = IndexMap::new();
    if let Some(token) = auth_header {
        headers.insert("Authorization".to_string(), token.to_string());
    }

    let mut encoded_body = None;
    if let Some(body) = body {
        if let Some((media_type, payload)) = body.first() {
            let (payload, content_type) = encode_body(media_type, payload);
            if let Some(content_type) = content_type {
                headers.insert("Content-Type".to_string(), content_type.to_string());
            }
            encoded_body = Some(payload);
        }
    }

    RequestPlan {
        operation_id: operation.operation_id.clone(),
        method: method_override.unwrap_or(operation.http_method),
        path,
        query,
        headers,
        body: encoded_body,
    }
}
