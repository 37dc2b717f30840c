//! Run-scoped memory of observed outcomes.
//!
//! The Success Store remembers values that previously produced a 2xx
//! response, split into parameters, body fields, and response fields, plus a
//! bucket of bare primitives for operations whose response is not a
//! structured object. Fields are pre-registered from the catalog schema;
//! appends for unregistered fields are no-ops and lists never hold
//! duplicates. The Error Ledger tracks server faults for diagnostics.

use crate::catalog::body_field_names;
use crate::graph::{MatchSource, OperationGraph};
use crate::rl::agents::ProducerRef;
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::Rng;
use serde_json::Value;

type FieldValues = IndexMap<String, Vec<Value>>;

/// De-duplicated history of values seen in successful exchanges.
#[derive(Debug, Clone, Default)]
pub struct SuccessStore {
    parameters: IndexMap<String, FieldValues>,
    bodies: IndexMap<String, FieldValues>,
    responses: IndexMap<String, FieldValues>,
    primitives: IndexMap<String, Vec<Value>>,
}

impl SuccessStore {
    /// Pre-register every trackable field from the graph's operations.
    pub fn from_graph(graph: &OperationGraph) -> Self {
        let mut store = SuccessStore::default();
        for (operation_id, node) in &graph.nodes {
            let op = &node.operation;
            let params = store.parameters.entry(operation_id.clone()).or_default();
            for name in op.parameters.keys() {
                params.entry(name.clone()).or_default();
            }
            let bodies = store.bodies.entry(operation_id.clone()).or_default();
            for schema in op.request_body.values() {
                for field in body_field_names(schema) {
                    bodies.entry(field).or_default();
                }
            }
            let responses = store.responses.entry(operation_id.clone()).or_default();
            for response in op.responses.values() {
                for schema in response.content.values() {
                    for field in body_field_names(schema) {
                        responses.entry(field.clone()).or_default();
                    }
                }
            }
            store.primitives.entry(operation_id.clone()).or_default();
        }
        store
    }

    fn record(
        bucket: &mut IndexMap<String, FieldValues>,
        operation_id: &str,
        field: &str,
        value: Value,
    ) -> bool {
        let Some(fields) = bucket.get_mut(operation_id) else {
            return false;
        };
        // Unregistered fields are ignored: only catalog-declared fields are
        // tracked.
        let Some(values) = fields.get_mut(field) else {
            return false;
        };
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    pub fn record_parameter(&mut self, operation_id: &str, field: &str, value: Value) -> bool {
        Self::record(&mut self.parameters, operation_id, field, value)
    }

    pub fn record_body_field(&mut self, operation_id: &str, field: &str, value: Value) -> bool {
        Self::record(&mut self.bodies, operation_id, field, value)
    }

    pub fn record_response_field(&mut self, operation_id: &str, field: &str, value: Value) -> bool {
        Self::record(&mut self.responses, operation_id, field, value)
    }

    /// Bare primitive observed in a non-object response body.
    pub fn record_primitive(&mut self, operation_id: &str, value: Value) -> bool {
        let Some(values) = self.primitives.get_mut(operation_id) else {
            return false;
        };
        if values.contains(&value) {
            return false;
        }
        values.push(value);
        true
    }

    fn bucket(&self, source: MatchSource) -> &IndexMap<String, FieldValues> {
        match source {
            MatchSource::Params => &self.parameters,
            MatchSource::Body => &self.bodies,
            MatchSource::Response => &self.responses,
        }
    }

    pub fn lookup(&self, source: MatchSource, operation_id: &str, field: &str) -> Option<&[Value]> {
        self.bucket(source)
            .get(operation_id)
            .and_then(|fields| fields.get(field))
            .map(|values| values.as_slice())
    }

    pub fn has_history(&self, producer: &ProducerRef) -> bool {
        self.lookup(
            producer.in_value,
            &producer.dependent_operation,
            &producer.dependent_field,
        )
        .map(|values| !values.is_empty())
        .unwrap_or(false)
    }

    /// Uniformly sample one recorded value for a producer reference.
    pub fn sample(&self, producer: &ProducerRef, rng: &mut StdRng) -> Option<Value> {
        let values = self.lookup(
            producer.in_value,
            &producer.dependent_operation,
            &producer.dependent_field,
        )?;
        if values.is_empty() {
            return None;
        }
        Some(values[rng.gen_range(0..values.len())].clone())
    }

    /// True once some response field has shown more than one distinct value,
    /// i.e. responses expose dynamic data worth wiring dependencies to.
    pub fn has_dynamic_response_values(&self) -> bool {
        self.responses
            .values()
            .flat_map(|fields| fields.values())
            .any(|values| values.len() >= 2)
    }

    pub fn parameters(&self) -> &IndexMap<String, FieldValues> {
        &self.parameters
    }

    pub fn bodies(&self) -> &IndexMap<String, FieldValues> {
        &self.bodies
    }

    pub fn responses(&self) -> &IndexMap<String, FieldValues> {
        &self.responses
    }

    pub fn primitives(&self) -> &IndexMap<String, Vec<Value>> {
        &self.primitives
    }
}

/// De-duplicated signature of a request that produced a server error.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSignature {
    pub operation_id: String,
    pub parameters: Option<Value>,
    pub body: Option<Value>,
}

/// Per-operation record of observed server faults.
#[derive(Debug, Clone, Default)]
pub struct ErrorLedger {
    counts: IndexMap<String, usize>,
    signatures: Vec<ErrorSignature>,
}

impl ErrorLedger {
    pub fn record_server_error(
        &mut self,
        operation_id: &str,
        parameters: Option<Value>,
        body: Option<Value>,
    ) {
        *self.counts.entry(operation_id.to_string()).or_insert(0) += 1;
        let signature = ErrorSignature {
            operation_id: operation_id.to_string(),
            parameters,
            body,
        };
        if !self.signatures.contains(&signature) {
            self.signatures.push(signature);
        }
    }

    pub fn count(&self, operation_id: &str) -> usize {
        self.counts.get(operation_id).copied().unwrap_or(0)
    }

    pub fn signatures(&self) -> &[ErrorSignature] {
        &self.signatures
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// Count of responses per status code across the run.
#[derive(Debug, Clone, Default)]
pub struct StatusTally {
    counts: IndexMap<u16, u64>,
}

impl StatusTally {
    pub fn record(&mut self, status: u16) {
        *self.counts.entry(status).or_insert(0) += 1;
    }

    pub fn count(&self, status: u16) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &IndexMap<u16, u64> {
        &self.counts
    }

    /// "200:14 404:3"-style summary for run logs.
    pub fn summary(&self) -> String {
        let mut sorted: Vec<(u16, u64)> = self.counts.iter().map(|(s, c)| (*s, *c)).collect();
        sorted.sort_by_key(|(status, _)| *status);
        sorted
            .iter()
            .map(|(status, count)| format!("{}:{}", status, count))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
