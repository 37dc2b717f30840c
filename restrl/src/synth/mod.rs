//! Value synthesis.
//!
//! Sources of concrete values for parameters and bodies: type-based
//! generators, schema-aware best-effort generation, and a language-model
//! backed synthesizer behind the [`LlmClient`] boundary. LLM queries are
//! cached by input so identical requests never re-invoke the backing
//! service, and token spend flows through an injected [`CostMeter`].

pub mod prompts;

use crate::catalog::{OperationProperties, SchemaProperties, ValueKind};
use crate::config::LlmSettings;
use crate::error::{EngineError, EngineResult};
use crate::rl::agents::ValueAction;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use dashmap::DashMap;
use indexmap::IndexMap;
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A username/password pair for Basic auth candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredential {
    pub username: String,
    pub password: String,
}

/// `Basic` Authorization header value for a credential pair.
pub fn basic_token(username: &str, password: &str) -> String {
    let encoded = BASE64.encode(format!("{}:{}", username, password));
    format!("Basic {}", encoded)
}

pub fn random_string(rng: &mut StdRng) -> String {
    let len = rng.gen_range(4..=12);
    (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Type-based value for a declared kind; unknown kinds yield a random
/// primitive.
pub fn typed_value(kind: Option<ValueKind>, rng: &mut StdRng) -> Value {
    match kind {
        Some(ValueKind::Integer) => Value::from(rng.gen_range(0..100)),
        Some(ValueKind::Number) => {
            let n = (rng.gen_range(0.0..100.0_f64) * 100.0).round() / 100.0;
            Value::from(n)
        }
        Some(ValueKind::String) => Value::from(random_string(rng)),
        Some(ValueKind::Boolean) => Value::from(rng.gen_bool(0.5)),
        Some(ValueKind::Array) => {
            let len = rng.gen_range(1..=3);
            Value::from(
                (0..len)
                    .map(|_| typed_value(random_primitive_kind(rng), rng))
                    .collect::<Vec<Value>>(),
            )
        }
        Some(ValueKind::Object) => random_object(rng),
        None => typed_value(random_primitive_kind(rng), rng),
    }
}

fn random_primitive_kind(rng: &mut StdRng) -> Option<ValueKind> {
    let kinds = [
        ValueKind::Integer,
        ValueKind::Number,
        ValueKind::String,
        ValueKind::Boolean,
    ];
    Some(kinds[rng.gen_range(0..kinds.len())])
}

/// Value of a uniformly random kind.
pub fn random_value(rng: &mut StdRng) -> Value {
    let kind = ValueKind::ALL[rng.gen_range(0..ValueKind::ALL.len())];
    typed_value(Some(kind), rng)
}

/// Object with random field names and random primitive values.
pub fn random_object(rng: &mut StdRng) -> Value {
    let mut object = serde_json::Map::new();
    for _ in 0..rng.gen_range(1..=3) {
        object.insert(
            random_string(rng),
            typed_value(random_primitive_kind(rng), rng),
        );
    }
    Value::Object(object)
}

/// Best-effort value following the schema's structure. Depth is capped by
/// the schema's own nesting (with a safety bound against adversarial
/// documents).
pub fn schema_value(schema: &SchemaProperties, rng: &mut StdRng) -> Value {
    schema_value_bounded(schema, rng, 16)
}

fn schema_value_bounded(schema: &SchemaProperties, rng: &mut StdRng, depth: usize) -> Value {
    if depth == 0 {
        return typed_value(random_primitive_kind(rng), rng);
    }
    if let Some(example) = &schema.example {
        return example.clone();
    }
    match schema.kind {
        Some(ValueKind::Object) if !schema.properties.is_empty() => {
            let mut object = serde_json::Map::new();
            for (name, property) in &schema.properties {
                object.insert(name.clone(), schema_value_bounded(property, rng, depth - 1));
            }
            Value::Object(object)
        }
        Some(ValueKind::Array) => match &schema.items {
            Some(items) => Value::from(vec![schema_value_bounded(items, rng, depth - 1)]),
            None => Value::from(vec![typed_value(random_primitive_kind(rng), rng)]),
        },
        other => typed_value(other, rng),
    }
}

/// Type-based defaults for every declared parameter of an operation.
pub fn default_parameter_values(
    operation: &OperationProperties,
    rng: &mut StdRng,
) -> IndexMap<String, Value> {
    operation
        .parameters
        .iter()
        .map(|(name, properties)| {
            let kind = properties.schema.as_ref().and_then(|s| s.kind);
            (name.clone(), typed_value(kind, rng))
        })
        .collect()
}

/// Type-based default payload per request-body media type.
pub fn default_body_values(
    operation: &OperationProperties,
    rng: &mut StdRng,
) -> IndexMap<String, Value> {
    operation
        .request_body
        .iter()
        .map(|(media_type, schema)| (media_type.clone(), typed_value(schema.kind, rng)))
        .collect()
}

/// Cumulative token spend across all LLM calls of a run. Injected into the
/// backing client; process-scoped, not a global static.
#[derive(Debug, Default)]
pub struct CostMeter {
    total_tokens: AtomicU64,
}

impl CostMeter {
    pub fn record(&self, tokens: u64) {
        self.total_tokens.fetch_add(tokens, Ordering::Relaxed);
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    pub fn cost_usd(&self, cost_per_token: f64) -> f64 {
        self.total_tokens() as f64 * cost_per_token
    }
}

/// Chat-completion boundary of the language model.
pub trait LlmClient: Send + Sync {
    fn complete(&self, system: &str, user: &str, json_mode: bool) -> EngineResult<String>;
}

/// Caches completions by a sha256 key over the full query shape, so
/// repeated identical requests never reach the wrapped client.
pub struct CachedClient {
    inner: Box<dyn LlmClient>,
    cache: DashMap<String, String>,
    salt: String,
}

impl CachedClient {
    /// `salt` folds client configuration (model, temperature) into the
    /// cache key so different setups never share entries.
    pub fn new(inner: Box<dyn LlmClient>, salt: &str) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            salt: salt.to_string(),
        }
    }

    fn cache_key(&self, system: &str, user: &str, json_mode: bool) -> String {
        let mut hasher = Sha256::new();
        hasher.update(system.as_bytes());
        hasher.update([0x1f]);
        hasher.update(user.as_bytes());
        hasher.update([0x1f, json_mode as u8]);
        hasher.update(self.salt.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl LlmClient for CachedClient {
    fn complete(&self, system: &str, user: &str, json_mode: bool) -> EngineResult<String> {
        let key = self.cache_key(system, user, json_mode);
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.value().clone());
        }
        let result = self.inner.complete(system, user, json_mode)?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}

/// OpenAI-compatible chat-completions client over blocking reqwest.
pub struct OpenAiClient {
    settings: LlmSettings,
    api_key: String,
    meter: Arc<CostMeter>,
    http: reqwest::blocking::Client,
}

impl OpenAiClient {
    pub fn new(settings: LlmSettings, meter: Arc<CostMeter>) -> EngineResult<Self> {
        let api_key = std::env::var(&settings.api_key_env).map_err(|_| {
            EngineError::Synthesis(format!(
                "missing API key: environment variable {} is not set",
                settings.api_key_env
            ))
        })?;
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| EngineError::Synthesis(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            settings,
            api_key,
            meter,
            http,
        })
    }
}

impl LlmClient for OpenAiClient {
    fn complete(&self, system: &str, user: &str, json_mode: bool) -> EngineResult<String> {
        let mut payload = serde_json::json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });
        if json_mode {
            payload["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let url = format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| EngineError::Synthesis(format!("LLM request failed: {}", e)))?;
        let body: Value = response
            .json()
            .map_err(|e| EngineError::Synthesis(format!("LLM response decode failed: {}", e)))?;

        if let Some(tokens) = body
            .pointer("/usage/total_tokens")
            .and_then(Value::as_u64)
        {
            self.meter.record(tokens);
        }
        body.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                EngineError::Synthesis(format!("LLM response missing content: {}", body))
            })
    }
}

/// Best-effort proposer of concrete parameter/body values and auth
/// candidates for one operation.
pub trait ValueSynthesizer {
    fn propose_values(&self, operation: &OperationProperties, rng: &mut StdRng) -> ValueAction;
    fn propose_credentials(
        &self,
        operation: &OperationProperties,
        rng: &mut StdRng,
    ) -> Vec<BasicCredential>;
}

/// Schema-aware generation without any external service; also the fallback
/// when the language model is disabled or misbehaves.
#[derive(Debug, Default)]
pub struct TypedValueSynthesizer;

impl ValueSynthesizer for TypedValueSynthesizer {
    fn propose_values(&self, operation: &OperationProperties, rng: &mut StdRng) -> ValueAction {
        let param_mappings = operation
            .parameters
            .iter()
            .map(|(name, properties)| {
                let value = properties
                    .schema
                    .as_ref()
                    .map(|schema| schema_value(schema, rng))
                    .unwrap_or_else(|| random_value(rng));
                (name.clone(), value)
            })
            .collect();
        let body_mappings = operation
            .request_body
            .iter()
            .map(|(media_type, schema)| (media_type.clone(), schema_value(schema, rng)))
            .collect();
        ValueAction {
            param_mappings,
            body_mappings,
        }
    }

    fn propose_credentials(
        &self,
        _operation: &OperationProperties,
        rng: &mut StdRng,
    ) -> Vec<BasicCredential> {
        (0..2)
            .map(|_| BasicCredential {
                username: random_string(rng),
                password: random_string(rng),
            })
            .collect()
    }
}

/// Language-model-backed synthesizer. Parse failures fall back to
/// schema-aware generation so the loop never stalls on a bad completion.
pub struct LlmValueSynthesizer {
    client: Box<dyn LlmClient>,
    fallback: TypedValueSynthesizer,
}

impl LlmValueSynthesizer {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self {
            client,
            fallback: TypedValueSynthesizer,
        }
    }

    fn query_json(&self, user: &str) -> Option<Value> {
        match self
            .client
            .complete(prompts::DEFAULT_SYSTEM_MESSAGE, user, true)
        {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(err) => {
                    warn!(error = %err, "discarding unparseable LLM completion");
                    None
                }
            },
            Err(err) => {
                warn!(error = %err, "LLM query failed");
                None
            }
        }
    }
}

impl ValueSynthesizer for LlmValueSynthesizer {
    fn propose_values(&self, operation: &OperationProperties, rng: &mut StdRng) -> ValueAction {
        let summary = operation.summary.as_deref().unwrap_or(&operation.operation_id);
        let mut action = ValueAction::default();

        if !operation.parameters.is_empty() {
            let schema_json = serde_json::to_string(&operation.parameters).unwrap_or_default();
            let prompt = prompts::generation_prompt(summary, &schema_json, false);
            let proposed = self
                .query_json(&prompt)
                .and_then(|v| v.get("parameters").cloned())
                .and_then(|v| match v {
                    Value::Object(map) => Some(map.into_iter().collect::<IndexMap<_, _>>()),
                    _ => None,
                });
            action.param_mappings = match proposed {
                Some(mappings) => mappings,
                None => self.fallback.propose_values(operation, rng).param_mappings,
            };
        }

        for (media_type, schema) in &operation.request_body {
            let schema_json = serde_json::to_string(schema).unwrap_or_default();
            let prompt = prompts::generation_prompt(summary, &schema_json, true);
            let proposed = self
                .query_json(&prompt)
                .and_then(|v| v.get("request_body").cloned());
            let value = match proposed {
                Some(value) => value,
                None => schema_value(schema, rng),
            };
            action.body_mappings.insert(media_type.clone(), value);
        }
        debug!(operation = %operation.operation_id, "synthesized value action");
        action
    }

    fn propose_credentials(
        &self,
        operation: &OperationProperties,
        rng: &mut StdRng,
    ) -> Vec<BasicCredential> {
        let parsed = self
            .query_json(prompts::CREDENTIALS_GEN_PROMPT)
            .and_then(|v| v.get("credentials").cloned())
            .and_then(|v| match v {
                Value::Array(entries) => Some(entries),
                _ => None,
            })
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        Some(BasicCredential {
                            username: entry.get("username")?.as_str()?.to_string(),
                            password: entry.get("password")?.as_str()?.to_string(),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        if parsed.is_empty() {
            self.fallback.propose_credentials(operation, rng)
        } else {
            parsed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HttpMethod, ParameterIn, ParameterProperties};
    use base64::Engine as _;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_basic_token_round_trips() {
        let token = basic_token("user", "pass");
        assert!(token.starts_with("Basic "));
        let decoded = BASE64.decode(token.trim_start_matches("Basic ")).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "user:pass");
    }

    #[test]
    fn test_typed_value_matches_kind() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(typed_value(Some(ValueKind::Integer), &mut rng).is_i64());
        assert!(typed_value(Some(ValueKind::String), &mut rng).is_string());
        assert!(typed_value(Some(ValueKind::Boolean), &mut rng).is_boolean());
        assert!(typed_value(Some(ValueKind::Array), &mut rng).is_array());
        assert!(typed_value(Some(ValueKind::Object), &mut rng).is_object());
    }

    #[test]
    fn test_schema_value_follows_structure() {
        let mut schema = SchemaProperties::of_kind(ValueKind::Object);
        schema
            .properties
            .insert("id".to_string(), SchemaProperties::of_kind(ValueKind::Integer));
        let mut array = SchemaProperties::of_kind(ValueKind::Array);
        array.items = Some(Box::new(SchemaProperties::of_kind(ValueKind::String)));
        schema.properties.insert("tags".to_string(), array);

        let mut rng = StdRng::seed_from_u64(9);
        let value = schema_value(&schema, &mut rng);
        assert!(value["id"].is_i64());
        assert!(value["tags"].is_array());
    }

    struct CountingClient {
        calls: Arc<AtomicUsize>,
    }

    impl LlmClient for CountingClient {
        fn complete(&self, _system: &str, _user: &str, _json_mode: bool) -> EngineResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("{\"parameters\": {\"q\": \"cached\"}}".to_string())
        }
    }

    #[test]
    fn test_cached_client_skips_repeat_queries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counting = CountingClient {
            calls: calls.clone(),
        };
        let cached = CachedClient::new(Box::new(counting), "salt");
        let first = cached.complete("sys", "user", true).unwrap();
        let second = cached.complete("sys", "user", true).unwrap();
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cached.complete("sys", "other", true).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cost_meter_accumulates() {
        let meter = CostMeter::default();
        meter.record(100);
        meter.record(50);
        assert_eq!(meter.total_tokens(), 150);
        assert!((meter.cost_usd(0.000005) - 0.00075).abs() < 1e-12);
    }

    #[test]
    fn test_typed_synthesizer_covers_all_parameters() {
        let mut op = OperationProperties {
            operation_id: "searchItems".to_string(),
            endpoint_path: "/items".to_string(),
            http_method: HttpMethod::Get,
            summary: None,
            parameters: IndexMap::new(),
            request_body: IndexMap::new(),
            responses: IndexMap::new(),
        };
        op.parameters.insert(
            "q".to_string(),
            ParameterProperties {
                in_value: ParameterIn::Query,
                required: true,
                schema: Some(SchemaProperties::of_kind(ValueKind::String)),
            },
        );
        let mut rng = StdRng::seed_from_u64(4);
        let action = TypedValueSynthesizer.propose_values(&op, &mut rng);
        assert!(action.param_mappings.contains_key("q"));
    }
}
