//! Mutation engine.
//!
//! Probability-gated corruption of an otherwise policy-chosen request, used
//! to probe robustness rather than to train the policy: wrong method, wrong
//! media type, corrupted credentials, wrong-typed values, and unknown
//! parameter names. Each kind fires independently; several may fire in one
//! iteration. Mutated iterations are excluded from Q-table updates, and the
//! parameter-name replacement is flagged separately because it invalidates
//! parameter-axis attribution entirely.

use crate::catalog::{HttpMethod, OperationProperties, ValueKind};
use crate::synth::{basic_token, random_object, random_string, random_value, typed_value};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;
use tracing::debug;

const LEGAL_MEDIA_TYPES: [&str; 4] = [
    "application/json",
    "application/x-www-form-urlencoded",
    "multipart/form-data",
    "text/plain",
];

/// Independent trigger probabilities per mutation kind.
#[derive(Debug, Clone)]
pub struct MutationRates {
    /// Per-value wrong-type regeneration.
    pub individual: f64,
    /// HTTP method substitution.
    pub method: f64,
    /// Body re-encoding under a different media type.
    pub media_type: f64,
    /// Replacement of the whole parameter name set.
    pub parameter_names: f64,
    /// Corrupted Basic credentials.
    pub token: f64,
}

impl Default for MutationRates {
    fn default() -> Self {
        Self {
            individual: 0.5,
            method: 0.1,
            media_type: 0.1,
            parameter_names: 0.4,
            token: 0.2,
        }
    }
}

/// What the engine did to the request.
#[derive(Debug, Clone, Default)]
pub struct MutationOutcome {
    /// The declared parameter names were replaced with random ones; the
    /// outcome must not be attributed to the real parameter set.
    pub parameter_names_replaced: bool,
    pub method_override: Option<HttpMethod>,
}

#[derive(Debug, Clone, Default)]
pub struct Mutator {
    rates: MutationRates,
}

impl Mutator {
    pub fn new(rates: MutationRates) -> Self {
        Self { rates }
    }

    /// Wrong-typed value: drawn from a generator of a different kind than
    /// the declared one.
    fn mutated_value(&self, declared: ValueKind, rng: &mut StdRng) -> Value {
        let others: Vec<ValueKind> = ValueKind::ALL
            .iter()
            .copied()
            .filter(|kind| *kind != declared)
            .collect();
        typed_value(Some(others[rng.gen_range(0..others.len())]), rng)
    }

    /// Apply the gated mutations in place.
    pub fn mutate(
        &self,
        operation: &OperationProperties,
        parameters: &mut Option<IndexMap<String, Value>>,
        body: &mut Option<IndexMap<String, Value>>,
        auth_header: &mut Option<String>,
        rng: &mut StdRng,
    ) -> MutationOutcome {
        let mut outcome = MutationOutcome::default();

        if rng.gen::<f64>() < self.rates.method {
            let others: Vec<HttpMethod> = HttpMethod::MUTABLE
                .iter()
                .copied()
                .filter(|method| *method != operation.http_method)
                .collect();
            if !others.is_empty() {
                outcome.method_override = Some(others[rng.gen_range(0..others.len())]);
            }
        }

        if rng.gen::<f64>() < self.rates.token {
            *auth_header = Some(basic_token(&random_string(rng), &random_string(rng)));
        }

        if rng.gen::<f64>() < self.rates.parameter_names {
            outcome.parameter_names_replaced = true;
            let mut replaced = IndexMap::new();
            for _ in 0..rng.gen_range(2..=6) {
                replaced.insert(random_string(rng), random_value(rng));
            }
            *parameters = Some(replaced);
        }

        if let Some(parameters) = parameters.as_mut() {
            if !outcome.parameter_names_replaced {
                for (name, properties) in &operation.parameters {
                    if !parameters.contains_key(name) {
                        continue;
                    }
                    let declared = properties.schema.as_ref().and_then(|schema| schema.kind);
                    if let Some(declared) = declared {
                        if rng.gen::<f64>() < self.rates.individual {
                            parameters.insert(name.clone(), self.mutated_value(declared, rng));
                        }
                    }
                }
            }
        }

        if let Some(body) = body.as_mut() {
            for (media_type, schema) in &operation.request_body {
                if !body.contains_key(media_type) {
                    continue;
                }
                if rng.gen::<f64>() < self.rates.individual {
                    let replacement = if rng.gen_bool(0.5) {
                        self.mutated_value(schema.kind.unwrap_or(ValueKind::Object), rng)
                    } else {
                        random_object(rng)
                    };
                    body.insert(media_type.clone(), replacement);
                }
            }

            if rng.gen::<f64>() < self.rates.media_type {
                if let Some((current, payload)) = body.pop() {
                    let others: Vec<&str> = LEGAL_MEDIA_TYPES
                        .iter()
                        .copied()
                        .filter(|media_type| *media_type != current)
                        .collect();
                    let replacement = others[rng.gen_range(0..others.len())];
                    body.insert(replacement.to_string(), payload);
                }
            }
        }

        debug!(
            operation = %operation.operation_id,
            parameter_names_replaced = outcome.parameter_names_replaced,
            method_override = ?outcome.method_override,
            "request mutated"
        );
        outcome
    }
}
