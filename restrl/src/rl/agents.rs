//! The seven decision agents.
//!
//! Every agent implements the same learning contract over its own
//! state/action granularity: argmax retrieval, legal-space random sampling
//! for exploration, the standard tabular update, and a count of unexplored
//! cells that feeds the exploration scheduler.

use crate::catalog::{body_field_names, OperationProperties};
use crate::graph::{MatchSource, OperationGraph};
use crate::rl::table::QTable;
use crate::store::SuccessStore;
use crate::synth::ValueSynthesizer;
use indexmap::IndexMap;
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Power-set enumeration cap: beyond this many fields only singletons and
/// the full set are tabled.
const MAX_ENUM_FIELDS: usize = 12;

/// State key for the operation agent's single global table.
const GLOBAL_STATE: &str = "*";

/// Common learning contract shared by every decision agent.
pub trait DecisionAgent {
    type State: ?Sized;
    type Action;

    /// Argmax action for the state; ties break first-seen. Never mutates
    /// the table.
    fn best_action(&self, state: &Self::State) -> Option<Self::Action>;

    /// A sample from the legal action space for the state.
    fn random_action(&self, state: &Self::State, rng: &mut StdRng) -> Option<Self::Action>;

    /// `Q(s,a) ← Q(s,a) + α·(r + γ·max_a' Q(s,a') − Q(s,a))`.
    fn update_q_table(&mut self, state: &Self::State, action: &Self::Action, reward: f64);

    /// Count of never-updated action slots for the operation.
    fn number_of_zeros(&self, operation_id: &str) -> usize;
}

fn enumerate_subsets(fields: &[String]) -> Vec<Vec<String>> {
    if fields.len() <= MAX_ENUM_FIELDS {
        fields
            .iter()
            .cloned()
            .powerset()
            .filter(|subset| !subset.is_empty())
            .collect()
    } else {
        let mut subsets: Vec<Vec<String>> = fields.iter().map(|f| vec![f.clone()]).collect();
        subsets.push(fields.to_vec());
        subsets
    }
}

/// Chooses which operation to exercise. Global state; the table rewards
/// fault-revealing operations (see the fault-seeking reward table).
pub struct OperationAgent {
    table: QTable<String>,
    exploration_rate: f64,
}

impl OperationAgent {
    pub fn new(graph: &OperationGraph, alpha: f64, gamma: f64, exploration_rate: f64) -> Self {
        let mut table = QTable::new(alpha, gamma);
        table.seed_actions(GLOBAL_STATE, graph.operation_ids().cloned());
        Self {
            table,
            exploration_rate,
        }
    }

    /// ε-greedy selection over the global operation table.
    pub fn select(&self, rng: &mut StdRng) -> Option<String> {
        if rng.gen::<f64>() < self.exploration_rate {
            self.random_action(&(), rng)
        } else {
            self.best_action(&())
        }
    }
}

impl DecisionAgent for OperationAgent {
    type State = ();
    type Action = String;

    fn best_action(&self, _state: &()) -> Option<String> {
        self.table.best(GLOBAL_STATE).map(|(a, _)| a.clone())
    }

    fn random_action(&self, _state: &(), rng: &mut StdRng) -> Option<String> {
        self.table.random(GLOBAL_STATE, rng).cloned()
    }

    fn update_q_table(&mut self, _state: &(), action: &String, reward: f64) {
        self.table.update(GLOBAL_STATE, action, reward);
    }

    fn number_of_zeros(&self, _operation_id: &str) -> usize {
        self.table.zeros(GLOBAL_STATE)
    }
}

/// Parameter subset plus the request-body media type to exercise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterAction {
    pub parameters: Vec<String>,
    pub media_type: Option<String>,
}

/// Chooses which declared parameters (and which body media type) a request
/// carries.
pub struct ParameterAgent {
    table: QTable<ParameterAction>,
}

impl ParameterAgent {
    pub fn new(graph: &OperationGraph, alpha: f64, gamma: f64) -> Self {
        let mut table = QTable::new(alpha, gamma);
        for (operation_id, node) in &graph.nodes {
            let op = &node.operation;
            let names: Vec<String> = op.parameters.keys().cloned().collect();
            let subsets = if names.is_empty() {
                vec![Vec::new()]
            } else {
                enumerate_subsets(&names)
            };
            let mut media_types: Vec<Option<String>> = vec![None];
            media_types.extend(op.request_body.keys().cloned().map(Some));

            let actions = subsets.iter().flat_map(|subset| {
                media_types.iter().map(move |media_type| ParameterAction {
                    parameters: subset.clone(),
                    media_type: media_type.clone(),
                })
            });
            table.seed_actions(operation_id, actions);
        }
        Self { table }
    }
}

impl DecisionAgent for ParameterAgent {
    type State = str;
    type Action = ParameterAction;

    fn best_action(&self, state: &str) -> Option<ParameterAction> {
        self.table.best(state).map(|(a, _)| a.clone())
    }

    fn random_action(&self, state: &str, rng: &mut StdRng) -> Option<ParameterAction> {
        self.table.random(state, rng).cloned()
    }

    fn update_q_table(&mut self, state: &str, action: &ParameterAction, reward: f64) {
        self.table.update(state, action, reward);
    }

    fn number_of_zeros(&self, operation_id: &str) -> usize {
        self.table.zeros(operation_id)
    }
}

/// Chooses the Authorization value, `None` meaning no header at all.
/// Disabled deployments simply never consult it.
pub struct HeaderAgent {
    table: QTable<Option<String>>,
}

impl HeaderAgent {
    pub fn new(alpha: f64, gamma: f64) -> Self {
        Self {
            table: QTable::new(alpha, gamma),
        }
    }

    /// Seed each operation with the candidate tokens plus "no header".
    pub fn initialize<'a, I>(&mut self, operation_ids: I, candidates: &[String])
    where
        I: IntoIterator<Item = &'a String>,
    {
        for operation_id in operation_ids {
            self.table.seed_actions(operation_id, [None]);
            self.table
                .seed_actions(operation_id, candidates.iter().cloned().map(Some));
        }
    }
}

impl DecisionAgent for HeaderAgent {
    type State = str;
    type Action = Option<String>;

    fn best_action(&self, state: &str) -> Option<Option<String>> {
        self.table.best(state).map(|(a, _)| a.clone())
    }

    fn random_action(&self, state: &str, rng: &mut StdRng) -> Option<Option<String>> {
        self.table.random(state, rng).cloned()
    }

    fn update_q_table(&mut self, state: &str, action: &Option<String>, reward: f64) {
        self.table.update(state, action, reward);
    }

    fn number_of_zeros(&self, operation_id: &str) -> usize {
        self.table.zeros(operation_id)
    }
}

/// Unit of credit assignment for the value agent: concrete parameter values
/// and per-media-type body payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueAction {
    pub param_mappings: IndexMap<String, Value>,
    pub body_mappings: IndexMap<String, Value>,
}

impl ValueAction {
    /// Canonical fingerprint: sha256 over key-sorted entries. Nested
    /// objects serialize key-sorted already.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for mappings in [&self.param_mappings, &self.body_mappings] {
            let mut entries: Vec<(&String, &Value)> = mappings.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in entries {
                hasher.update(key.as_bytes());
                hasher.update([0x1f]);
                hasher.update(value.to_string().as_bytes());
                hasher.update([0x1e]);
            }
            hasher.update([0x1d]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Proposes concrete values. The action space is unbounded, so the table is
/// an approximation cache over previously-seen actions keyed by fingerprint;
/// "best" retrieves the highest-reward cached action and "random" asks the
/// synthesizer for a fresh proposal.
pub struct ValueAgent {
    table: QTable<String>,
    actions: IndexMap<String, ValueAction>,
    synthesizer: Arc<dyn ValueSynthesizer>,
}

impl ValueAgent {
    pub fn new(alpha: f64, gamma: f64, synthesizer: Arc<dyn ValueSynthesizer>) -> Self {
        Self {
            table: QTable::new(alpha, gamma),
            actions: IndexMap::new(),
            synthesizer,
        }
    }
}

impl DecisionAgent for ValueAgent {
    type State = OperationProperties;
    type Action = ValueAction;

    fn best_action(&self, state: &OperationProperties) -> Option<ValueAction> {
        self.table
            .best(&state.operation_id)
            .and_then(|(fingerprint, _)| self.actions.get(fingerprint))
            .cloned()
    }

    fn random_action(&self, state: &OperationProperties, rng: &mut StdRng) -> Option<ValueAction> {
        Some(self.synthesizer.propose_values(state, rng))
    }

    fn update_q_table(&mut self, state: &OperationProperties, action: &ValueAction, reward: f64) {
        let fingerprint = action.fingerprint();
        self.actions
            .entry(fingerprint.clone())
            .or_insert_with(|| action.clone());
        self.table.update(&state.operation_id, &fingerprint, reward);
    }

    fn number_of_zeros(&self, operation_id: &str) -> usize {
        if self.table.is_empty(operation_id) {
            // A fresh synthesis is always an unexplored cell.
            1
        } else {
            self.table.zeros(operation_id)
        }
    }
}

/// Chooses which object properties to keep inside one request-body media
/// type. State is the composite `operation::media-type` key.
pub struct BodyObjAgent {
    table: QTable<Vec<String>>,
    media_types_by_op: IndexMap<String, Vec<String>>,
}

impl BodyObjAgent {
    pub fn new(graph: &OperationGraph, alpha: f64, gamma: f64) -> Self {
        let mut table = QTable::new(alpha, gamma);
        let mut media_types_by_op: IndexMap<String, Vec<String>> = IndexMap::new();
        for (operation_id, node) in &graph.nodes {
            for (media_type, schema) in &node.operation.request_body {
                let fields = body_field_names(schema);
                if fields.is_empty() {
                    continue;
                }
                let key = Self::state_key(operation_id, media_type);
                table.seed_actions(&key, enumerate_subsets(&fields));
                media_types_by_op
                    .entry(operation_id.clone())
                    .or_default()
                    .push(media_type.clone());
            }
        }
        Self {
            table,
            media_types_by_op,
        }
    }

    pub fn state_key(operation_id: &str, media_type: &str) -> String {
        format!("{}::{}", operation_id, media_type)
    }

    /// Whether the media type's payload has selectable object fields.
    pub fn tracks(&self, operation_id: &str, media_type: &str) -> bool {
        !self
            .table
            .is_empty(&Self::state_key(operation_id, media_type))
    }
}

impl DecisionAgent for BodyObjAgent {
    type State = str;
    type Action = Vec<String>;

    fn best_action(&self, state: &str) -> Option<Vec<String>> {
        self.table.best(state).map(|(a, _)| a.clone())
    }

    fn random_action(&self, state: &str, rng: &mut StdRng) -> Option<Vec<String>> {
        self.table.random(state, rng).cloned()
    }

    fn update_q_table(&mut self, state: &str, action: &Vec<String>, reward: f64) {
        self.table.update(state, action, reward);
    }

    fn number_of_zeros(&self, operation_id: &str) -> usize {
        self.media_types_by_op
            .get(operation_id)
            .map(|media_types| {
                media_types
                    .iter()
                    .map(|m| self.table.zeros(&Self::state_key(operation_id, m)))
                    .sum()
            })
            .unwrap_or(0)
    }
}

/// Where a field's value comes from this iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSource {
    /// Language-model-synthesized values.
    Llm,
    /// Type-based default values.
    Default,
    /// Values replayed from producer operations via the dependency graph.
    Dependency,
    /// Warm-up no-op; never tabled.
    Waiting,
}

/// Chooses the value source. The dependency option only joins the action
/// space once responses have shown dynamic values.
pub struct DataSourceAgent {
    table: QTable<DataSource>,
    operation_ids: Vec<String>,
    dependencies_enabled: bool,
}

impl DataSourceAgent {
    pub fn new(graph: &OperationGraph, alpha: f64, gamma: f64) -> Self {
        let mut table = QTable::new(alpha, gamma);
        let operation_ids: Vec<String> = graph.operation_ids().cloned().collect();
        for operation_id in &operation_ids {
            table.seed_actions(operation_id, [DataSource::Llm, DataSource::Default]);
        }
        Self {
            table,
            operation_ids,
            dependencies_enabled: false,
        }
    }

    pub fn dependencies_enabled(&self) -> bool {
        self.dependencies_enabled
    }

    /// Unlock the dependency-derived source for every operation.
    pub fn enable_dependencies(&mut self) {
        if self.dependencies_enabled {
            return;
        }
        for operation_id in &self.operation_ids {
            self.table
                .seed_actions(operation_id, [DataSource::Dependency]);
        }
        self.dependencies_enabled = true;
    }
}

impl DecisionAgent for DataSourceAgent {
    type State = str;
    type Action = DataSource;

    fn best_action(&self, state: &str) -> Option<DataSource> {
        self.table.best(state).map(|(a, _)| *a)
    }

    fn random_action(&self, state: &str, rng: &mut StdRng) -> Option<DataSource> {
        self.table.random(state, rng).copied()
    }

    fn update_q_table(&mut self, state: &str, action: &DataSource, reward: f64) {
        self.table.update(state, action, reward);
    }

    fn number_of_zeros(&self, operation_id: &str) -> usize {
        self.table.zeros(operation_id)
    }
}

/// One producer reference a consumer field can draw its value from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerRef {
    pub in_value: MatchSource,
    pub dependent_operation: String,
    pub dependent_field: String,
}

/// Producer bindings for the fields selected this iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyAction {
    pub parameters: IndexMap<String, ProducerRef>,
    pub body_fields: IndexMap<String, ProducerRef>,
}

/// Chooses, per consumer field, which producer reference supplies the
/// value. Candidates come from the graph's firm and tentative edges; state
/// is the composite `operation::field` key.
pub struct DependencyAgent {
    table: QTable<ProducerRef>,
    fields_by_op: IndexMap<String, Vec<String>>,
}

impl DependencyAgent {
    pub fn new(graph: &OperationGraph, alpha: f64, gamma: f64) -> Self {
        let mut table = QTable::new(alpha, gamma);
        let mut fields_by_op: IndexMap<String, Vec<String>> = IndexMap::new();
        for (operation_id, node) in &graph.nodes {
            for edge in node.outgoing_edges.iter().chain(&node.tentative_edges) {
                for (field, matches) in &edge.similar_fields {
                    let key = Self::state_key(operation_id, field);
                    table.seed_actions(
                        &key,
                        matches.iter().map(|sv| ProducerRef {
                            in_value: sv.in_value,
                            dependent_operation: edge.destination.clone(),
                            dependent_field: sv.destination_field.clone(),
                        }),
                    );
                    let fields = fields_by_op.entry(operation_id.clone()).or_default();
                    if !fields.contains(field) {
                        fields.push(field.clone());
                    }
                }
            }
        }
        Self {
            table,
            fields_by_op,
        }
    }

    pub fn state_key(operation_id: &str, field: &str) -> String {
        format!("{}::{}", operation_id, field)
    }

    fn candidate_with_history(&self, key: &str, store: &SuccessStore) -> Option<ProducerRef> {
        let mut best: Option<(ProducerRef, f64)> = None;
        for candidate in self.table.actions(key) {
            if !store.has_history(candidate) {
                continue;
            }
            let value = self.table.value(key, candidate);
            match &best {
                Some((_, current)) if value <= *current => {}
                _ => best = Some((candidate.clone(), value)),
            }
        }
        best.map(|(candidate, _)| candidate)
    }

    /// Bind each requested field to a producer. Exploitation prefers
    /// producers with recorded Success Store history; exploration samples
    /// uniformly among all legal edges, empty history included.
    pub fn plan(
        &self,
        operation_id: &str,
        parameters: &[String],
        body_fields: &[String],
        store: &SuccessStore,
        explore: bool,
        rng: &mut StdRng,
    ) -> DependencyAction {
        let mut action = DependencyAction::default();
        for (fields, out) in [
            (parameters, &mut action.parameters),
            (body_fields, &mut action.body_fields),
        ] {
            for field in fields {
                let key = Self::state_key(operation_id, field);
                let choice = if explore {
                    self.random_action(&key, rng)
                } else {
                    self.candidate_with_history(&key, store)
                        .or_else(|| self.best_action(&key))
                };
                if let Some(producer) = choice {
                    out.insert(field.clone(), producer);
                }
            }
        }
        action
    }

    /// Apply the shared reward to every producer reference actually used.
    pub fn update_used(&mut self, operation_id: &str, used: &DependencyAction, reward: f64) {
        for (field, producer) in used.parameters.iter().chain(&used.body_fields) {
            let key = Self::state_key(operation_id, field);
            self.update_q_table(&key, producer, reward);
        }
    }
}

impl DecisionAgent for DependencyAgent {
    type State = str;
    type Action = ProducerRef;

    fn best_action(&self, state: &str) -> Option<ProducerRef> {
        self.table.best(state).map(|(a, _)| a.clone())
    }

    fn random_action(&self, state: &str, rng: &mut StdRng) -> Option<ProducerRef> {
        self.table.random(state, rng).cloned()
    }

    fn update_q_table(&mut self, state: &str, action: &ProducerRef, reward: f64) {
        self.table.update(state, action, reward);
    }

    fn number_of_zeros(&self, operation_id: &str) -> usize {
        self.fields_by_op
            .get(operation_id)
            .map(|fields| {
                fields
                    .iter()
                    .map(|f| self.table.zeros(&Self::state_key(operation_id, f)))
                    .sum()
            })
            .unwrap_or(0)
    }
}
