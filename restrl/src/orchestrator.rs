//! The iteration loop.
//!
//! One decision, one HTTP call, one reward update per iteration, bounded by
//! a wall-clock budget. Exactly one scheduler-managed axis explores (and is
//! updated) each iteration; the operation agent sits above the scheduler
//! and its fault-seeking table updates on every non-mutated iteration.
//! Mutated iterations never feed any table.

use crate::catalog::{body_field_names, construct_body, flatten_mappings, OperationProperties};
use crate::config::RunConfig;
use crate::error::EngineResult;
use crate::graph::OperationGraph;
use crate::report;
use crate::request;
use crate::request::mutate::{MutationOutcome, MutationRates, Mutator};
use crate::rl::agents::{
    BodyObjAgent, DataSource, DataSourceAgent, DecisionAgent, DependencyAction, DependencyAgent,
    HeaderAgent, OperationAgent, ParameterAction, ParameterAgent, ValueAction, ValueAgent,
};
use crate::rl::explore::{ExplorationScheduler, ExploreTarget, ZeroCounts};
use crate::rl::reward;
use crate::store::{ErrorLedger, StatusTally, SuccessStore};
use crate::synth::{
    basic_token, default_body_values, default_parameter_values, random_value, ValueSynthesizer,
};
use crate::transport::{ApiResponse, HttpTransport};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// End-of-run accounting.
#[derive(Debug)]
pub struct RunSummary {
    pub iterations: u64,
    pub report_path: PathBuf,
    pub status_summary: String,
    pub server_errors: usize,
}

/// Everything one iteration decided, kept for credit assignment.
struct IterationContext {
    operation: OperationProperties,
    param_action: ParameterAction,
    /// `None` when the header agent is disabled.
    header_action: Option<Option<String>>,
    source: DataSource,
    parameters: Option<IndexMap<String, Value>>,
    used_value_action: Option<ValueAction>,
    dependency_used: Option<DependencyAction>,
    /// Media type and kept fields when the body-object agent acted.
    body_selection: Option<(String, Vec<String>)>,
}

fn pick_value_action(
    agent: &ValueAgent,
    operation: &OperationProperties,
    explore: bool,
    rng: &mut StdRng,
) -> ValueAction {
    let action = if explore {
        agent.random_action(operation, rng)
    } else {
        agent
            .best_action(operation)
            .or_else(|| agent.random_action(operation, rng))
    };
    action.unwrap_or_default()
}

/// Keep only the selected names that have a proposed value.
fn select_mapping(
    selected: &[String],
    available: &IndexMap<String, Value>,
) -> Option<IndexMap<String, Value>> {
    if selected.is_empty() {
        return None;
    }
    let picked: IndexMap<String, Value> = selected
        .iter()
        .filter_map(|name| available.get(name).map(|v| (name.clone(), v.clone())))
        .collect();
    if picked.is_empty() {
        None
    } else {
        Some(picked)
    }
}

fn select_body(
    media_type: Option<&String>,
    available: &IndexMap<String, Value>,
) -> Option<IndexMap<String, Value>> {
    let media_type = media_type?;
    available
        .get(media_type)
        .map(|payload| [(media_type.clone(), payload.clone())].into_iter().collect())
}

pub struct Orchestrator {
    graph: OperationGraph,
    config: RunConfig,
    scheduler: ExplorationScheduler,
    mutator: Mutator,
    operation_agent: OperationAgent,
    parameter_agent: ParameterAgent,
    header_agent: HeaderAgent,
    value_agent: ValueAgent,
    body_obj_agent: BodyObjAgent,
    data_source_agent: DataSourceAgent,
    dependency_agent: DependencyAgent,
    store: SuccessStore,
    ledger: ErrorLedger,
    tally: StatusTally,
    transport: Box<dyn HttpTransport>,
    rng: StdRng,
    iterations: u64,
}

impl Orchestrator {
    pub fn new(
        graph: OperationGraph,
        config: RunConfig,
        transport: Box<dyn HttpTransport>,
        synthesizer: Arc<dyn ValueSynthesizer>,
    ) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let alpha = config.learning_rate;
        let gamma = config.discount_factor;

        let operation_agent =
            OperationAgent::new(&graph, alpha, gamma, config.operation_exploration_rate);
        let parameter_agent = ParameterAgent::new(&graph, alpha, gamma);
        let value_agent = ValueAgent::new(alpha, gamma, synthesizer.clone());
        let body_obj_agent = BodyObjAgent::new(&graph, alpha, gamma);
        let data_source_agent = DataSourceAgent::new(&graph, alpha, gamma);
        let dependency_agent = DependencyAgent::new(&graph, alpha, gamma);

        let mut header_agent = HeaderAgent::new(alpha, gamma);
        if config.header_agent_enabled {
            for (operation_id, node) in &graph.nodes {
                let mut candidates = config.auth_tokens.clone();
                for credential in synthesizer.propose_credentials(&node.operation, &mut rng) {
                    candidates.push(basic_token(&credential.username, &credential.password));
                }
                header_agent.initialize(std::iter::once(operation_id), &candidates);
            }
        }

        let store = SuccessStore::from_graph(&graph);
        let scheduler = ExplorationScheduler::new(config.header_agent_enabled);

        Self {
            scheduler,
            mutator: Mutator::new(MutationRates::default()),
            operation_agent,
            parameter_agent,
            header_agent,
            value_agent,
            body_obj_agent,
            data_source_agent,
            dependency_agent,
            store,
            ledger: ErrorLedger::default(),
            tally: StatusTally::default(),
            transport,
            rng,
            iterations: 0,
            graph,
            config,
        }
    }

    pub fn store(&self) -> &SuccessStore {
        &self.store
    }

    pub fn tally(&self) -> &StatusTally {
        &self.tally
    }

    pub fn ledger(&self) -> &ErrorLedger {
        &self.ledger
    }

    /// Run until the wall-clock budget (or the optional iteration cap) is
    /// exhausted, then persist the success report.
    pub fn run(&mut self) -> EngineResult<RunSummary> {
        let budget = Duration::from_secs(self.config.time_duration_secs.max(1));
        let warmup = Duration::from_secs(self.config.warmup_secs);
        let start = Instant::now();

        while start.elapsed() < budget {
            if let Some(cap) = self.config.max_iterations {
                if self.iterations >= cap {
                    break;
                }
            }
            let elapsed = start.elapsed();
            let fraction = elapsed.as_secs_f64() / budget.as_secs_f64();
            self.step(fraction, elapsed < warmup);

            if self.iterations % 50 == 0 {
                info!(
                    iterations = self.iterations,
                    remaining_secs = (budget.saturating_sub(start.elapsed())).as_secs(),
                    responses = %self.tally.summary(),
                    "run progress"
                );
            }
        }

        let report_path =
            report::write_report(&self.store, &self.config.output_dir, &self.graph.spec_name)?;
        info!(
            iterations = self.iterations,
            server_errors = self.ledger.total(),
            responses = %self.tally.summary(),
            "run finished"
        );
        Ok(RunSummary {
            iterations: self.iterations,
            report_path,
            status_summary: self.tally.summary(),
            server_errors: self.ledger.total(),
        })
    }

    fn zero_counts(&self, operation_id: &str) -> ZeroCounts {
        ZeroCounts {
            parameter_body: self.parameter_agent.number_of_zeros(operation_id)
                + self.body_obj_agent.number_of_zeros(operation_id),
            data_source: self.data_source_agent.number_of_zeros(operation_id),
            value: self.value_agent.number_of_zeros(operation_id),
            dependency: self.dependency_agent.number_of_zeros(operation_id),
            header: if self.config.header_agent_enabled {
                self.header_agent.number_of_zeros(operation_id)
            } else {
                0
            },
        }
    }

    /// One decision → one request → one gated learning update.
    fn step(&mut self, elapsed_fraction: f64, in_warmup: bool) {
        let Some(operation_id) = self.operation_agent.select(&mut self.rng) else {
            return;
        };
        let Some(operation) = self.graph.operation(&operation_id).cloned() else {
            return;
        };

        let zeros = self.zero_counts(&operation_id);
        let target = self
            .scheduler
            .choose(elapsed_fraction, &zeros, &mut self.rng);
        let explores = |axis: ExploreTarget| target == axis || target == ExploreTarget::All;

        let param_action = if explores(ExploreTarget::ParameterBody) {
            self.parameter_agent
                .random_action(&operation_id, &mut self.rng)
        } else {
            self.parameter_agent.best_action(&operation_id)
        }
        .unwrap_or(ParameterAction {
            parameters: Vec::new(),
            media_type: None,
        });

        let header_action = if self.config.header_agent_enabled {
            let choice = if explores(ExploreTarget::Header) {
                self.header_agent.random_action(&operation_id, &mut self.rng)
            } else {
                self.header_agent.best_action(&operation_id)
            };
            Some(choice.unwrap_or(None))
        } else {
            None
        };

        let source = if in_warmup {
            DataSource::Waiting
        } else if target == ExploreTarget::Value {
            DataSource::Llm
        } else if target == ExploreTarget::Dependency
            && self.data_source_agent.dependencies_enabled()
        {
            DataSource::Dependency
        } else if explores(ExploreTarget::DataSource) {
            self.data_source_agent
                .random_action(&operation_id, &mut self.rng)
                .unwrap_or(DataSource::Default)
        } else {
            self.data_source_agent
                .best_action(&operation_id)
                .unwrap_or(DataSource::Default)
        };

        let explore_value = explores(ExploreTarget::Value);
        let mut used_value_action: Option<ValueAction> = None;
        let mut dependency_used: Option<DependencyAction> = None;

        let (mut parameters, mut body) = match source {
            DataSource::Waiting => {
                if self.rng.gen::<f64>() < self.config.warmup_default_share {
                    let param_values = default_parameter_values(&operation, &mut self.rng);
                    let body_values = default_body_values(&operation, &mut self.rng);
                    (
                        select_mapping(&param_action.parameters, &param_values),
                        select_body(param_action.media_type.as_ref(), &body_values),
                    )
                } else {
                    let action = pick_value_action(
                        &self.value_agent,
                        &operation,
                        explore_value,
                        &mut self.rng,
                    );
                    let selected = (
                        select_mapping(&param_action.parameters, &action.param_mappings),
                        select_body(param_action.media_type.as_ref(), &action.body_mappings),
                    );
                    used_value_action = Some(action);
                    selected
                }
            }
            DataSource::Llm => {
                let action =
                    pick_value_action(&self.value_agent, &operation, explore_value, &mut self.rng);
                let selected = (
                    select_mapping(&param_action.parameters, &action.param_mappings),
                    select_body(param_action.media_type.as_ref(), &action.body_mappings),
                );
                used_value_action = Some(action);
                selected
            }
            DataSource::Default => {
                let param_values = default_parameter_values(&operation, &mut self.rng);
                let body_values = default_body_values(&operation, &mut self.rng);
                (
                    select_mapping(&param_action.parameters, &param_values),
                    select_body(param_action.media_type.as_ref(), &body_values),
                )
            }
            DataSource::Dependency => {
                self.resolve_dependency_values(
                    &operation,
                    &param_action,
                    explores(ExploreTarget::Dependency),
                    explore_value,
                    &mut used_value_action,
                    &mut dependency_used,
                )
            }
        };

        // Body-object sub-selection on structured payloads.
        let mut body_selection: Option<(String, Vec<String>)> = None;
        if let Some(body_map) = body.as_mut() {
            if let Some((media_type, payload)) =
                body_map.first().map(|(m, p)| (m.clone(), p.clone()))
            {
                if self.body_obj_agent.tracks(&operation_id, &media_type) {
                    if let Some(deconstructed) = flatten_mappings(&payload) {
                        let key = BodyObjAgent::state_key(&operation_id, &media_type);
                        let selected = if explores(ExploreTarget::ParameterBody) {
                            self.body_obj_agent.random_action(&key, &mut self.rng)
                        } else {
                            self.body_obj_agent.best_action(&key)
                        };
                        if let Some(selected) = selected {
                            let kept: IndexMap<String, Value> = deconstructed
                                .into_iter()
                                .filter(|(name, _)| selected.contains(name))
                                .collect();
                            let rebuilt = operation
                                .request_body
                                .get(&media_type)
                                .and_then(|schema| construct_body(schema, &kept))
                                .unwrap_or_else(|| {
                                    Value::Object(kept.clone().into_iter().collect())
                                });
                            body_map.insert(media_type.clone(), rebuilt);
                            body_selection = Some((media_type, selected));
                        }
                    }
                }
            }
        }

        let mut auth_header = header_action.clone().flatten();
        let mutated = self.rng.gen::<f64>() < self.config.mutation_rate;
        let mut outcome = MutationOutcome::default();
        if mutated {
            outcome = self.mutator.mutate(
                &operation,
                &mut parameters,
                &mut body,
                &mut auth_header,
                &mut self.rng,
            );
        }

        let plan = request::assemble(
            &operation,
            parameters.as_ref(),
            body.as_ref(),
            auth_header.as_deref(),
            outcome.method_override,
        );
        debug!(
            operation = %operation_id,
            method = plan.method.as_str(),
            source = ?source,
            target = ?target,
            mutated,
            "dispatching request"
        );
        let response = self.transport.send(&plan);
        if let Some(response) = &response {
            self.tally.record(response.status_code);
        }

        let context = IterationContext {
            operation,
            param_action,
            header_action,
            source,
            parameters,
            used_value_action,
            dependency_used,
            body_selection,
        };

        if !mutated {
            self.apply_learning(target, &context, response.as_ref());
        }
        self.record_outcome(&context, &body, response.as_ref(), &outcome);
        self.iterations += 1;
    }

    /// Resolve values for the dependency-derived source: Success Store
    /// history first, then the value agent's proposal, then a random typed
    /// value, so the loop never stalls on unobserved dependencies.
    #[allow(clippy::too_many_arguments)]
    fn resolve_dependency_values(
        &mut self,
        operation: &OperationProperties,
        param_action: &ParameterAction,
        explore_dependency: bool,
        explore_value: bool,
        used_value_action: &mut Option<ValueAction>,
        dependency_used: &mut Option<DependencyAction>,
    ) -> (Option<IndexMap<String, Value>>, Option<IndexMap<String, Value>>) {
        let operation_id = operation.operation_id.as_str();
        let body_fields: Vec<String> = param_action
            .media_type
            .as_ref()
            .and_then(|media_type| operation.request_body.get(media_type))
            .map(|schema| body_field_names(schema))
            .unwrap_or_default();

        let plan = self.dependency_agent.plan(
            operation_id,
            &param_action.parameters,
            &body_fields,
            &self.store,
            explore_dependency,
            &mut self.rng,
        );
        let proposal =
            pick_value_action(&self.value_agent, operation, explore_value, &mut self.rng);

        let mut parameters: IndexMap<String, Value> = IndexMap::new();
        for name in &param_action.parameters {
            let from_store = plan
                .parameters
                .get(name)
                .and_then(|producer| self.store.sample(producer, &mut self.rng));
            let value = from_store
                .or_else(|| proposal.param_mappings.get(name).cloned())
                .unwrap_or_else(|| random_value(&mut self.rng));
            parameters.insert(name.clone(), value);
        }

        let mut body: Option<IndexMap<String, Value>> = None;
        if let Some(media_type) = &param_action.media_type {
            if let Some(schema) = operation.request_body.get(media_type) {
                let proposed_fields = proposal
                    .body_mappings
                    .get(media_type)
                    .and_then(flatten_mappings)
                    .unwrap_or_default();
                let mut fields: IndexMap<String, Value> = IndexMap::new();
                for field in &body_fields {
                    let from_store = plan
                        .body_fields
                        .get(field)
                        .and_then(|producer| self.store.sample(producer, &mut self.rng));
                    let value = from_store
                        .or_else(|| proposed_fields.get(field).cloned())
                        .unwrap_or_else(|| random_value(&mut self.rng));
                    fields.insert(field.clone(), value);
                }
                if let Some(payload) = construct_body(schema, &fields) {
                    body = Some([(media_type.clone(), payload)].into_iter().collect());
                }
            }
        }

        *used_value_action = Some(proposal);
        *dependency_used = Some(plan);
        (
            if parameters.is_empty() {
                None
            } else {
                Some(parameters)
            },
            body,
        )
    }

    /// Update exactly the exploring axis (plus the operation agent's
    /// fault-seeking table). Never called on mutated iterations.
    fn apply_learning(
        &mut self,
        target: ExploreTarget,
        context: &IterationContext,
        response: Option<&ApiResponse>,
    ) {
        let operation_id = context.operation.operation_id.clone();
        let explores = |axis: ExploreTarget| target == axis || target == ExploreTarget::All;

        self.operation_agent
            .update_q_table(&(), &operation_id, reward::bad_response_reward(response));

        if explores(ExploreTarget::ParameterBody) {
            self.parameter_agent.update_q_table(
                &operation_id,
                &context.param_action,
                reward::parameter_reward(response),
            );
            if let Some((media_type, selected)) = &context.body_selection {
                let key = BodyObjAgent::state_key(&operation_id, media_type);
                self.body_obj_agent.update_q_table(
                    &key,
                    selected,
                    reward::good_response_reward(response),
                );
            }
        }

        if explores(ExploreTarget::DataSource) && context.source != DataSource::Waiting {
            self.data_source_agent.update_q_table(
                &operation_id,
                &context.source,
                reward::good_response_reward(response),
            );
        }

        if explores(ExploreTarget::Value) && context.source == DataSource::Llm {
            if let Some(proposal) = &context.used_value_action {
                // Credit the parameter values actually sent together with
                // the proposed bodies.
                let processed = ValueAction {
                    param_mappings: context.parameters.clone().unwrap_or_default(),
                    body_mappings: proposal.body_mappings.clone(),
                };
                self.value_agent.update_q_table(
                    &context.operation,
                    &processed,
                    reward::value_reward(response),
                );
            }
        }

        if explores(ExploreTarget::Dependency) && context.source == DataSource::Dependency {
            if let Some(used) = &context.dependency_used {
                self.dependency_agent.update_used(
                    &operation_id,
                    used,
                    reward::good_response_reward(response),
                );
            }
        }

        if explores(ExploreTarget::Header) {
            if let Some(action) = &context.header_action {
                self.header_agent.update_q_table(
                    &operation_id,
                    action,
                    reward::header_reward(response),
                );
            }
        }
    }

    /// Success Store and Error Ledger bookkeeping for the iteration.
    fn record_outcome(
        &mut self,
        context: &IterationContext,
        body: &Option<IndexMap<String, Value>>,
        response: Option<&ApiResponse>,
        outcome: &MutationOutcome,
    ) {
        let Some(response) = response else {
            return;
        };
        let operation_id = context.operation.operation_id.as_str();

        if response.status_code / 100 == 5 {
            let parameters = context
                .parameters
                .as_ref()
                .and_then(|p| serde_json::to_value(p).ok());
            let body_value = body.as_ref().and_then(|b| serde_json::to_value(b).ok());
            self.ledger
                .record_server_error(operation_id, parameters, body_value);
        }

        if !response.ok() || outcome.parameter_names_replaced {
            return;
        }

        if let Some(parameters) = &context.parameters {
            for (name, value) in parameters {
                self.store
                    .record_parameter(operation_id, name, value.clone());
            }
        }
        if let Some(body) = body {
            for payload in body.values() {
                if let Some(fields) = flatten_mappings(payload) {
                    for (name, value) in fields {
                        self.store.record_body_field(operation_id, &name, value);
                    }
                }
            }
        }

        match response.json() {
            Some(Value::Array(items)) => {
                for item in &items {
                    self.record_response_value(operation_id, item);
                }
            }
            Some(content) => {
                self.record_response_value(operation_id, &content);
            }
            None => {
                // Decode failure on a 2xx: no structured dependency data,
                // but the exchange still counts for primitive tracking.
                if !response.text.is_empty() {
                    self.store
                        .record_primitive(operation_id, Value::String(response.text.clone()));
                }
            }
        }

        if !self.data_source_agent.dependencies_enabled()
            && self.store.has_dynamic_response_values()
        {
            info!("dynamic response values observed; dependency source enabled");
            self.data_source_agent.enable_dependencies();
        }
    }

    fn record_response_value(&mut self, operation_id: &str, content: &Value) {
        match flatten_mappings(content) {
            Some(fields) => {
                for (name, value) in fields {
                    self.store.record_response_field(operation_id, &name, value);
                }
            }
            None => {
                self.store.record_primitive(operation_id, content.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{
        HttpMethod, OperationCatalog, ParameterIn, ParameterProperties, ResponseProperties,
        SchemaProperties, ValueKind,
    };
    use crate::request::RequestPlan;
    use crate::synth::TypedValueSynthesizer;

    struct ScriptedTransport {
        responder: Box<dyn Fn(&RequestPlan) -> Option<ApiResponse> + Send>,
    }

    impl HttpTransport for ScriptedTransport {
        fn send(&self, plan: &RequestPlan) -> Option<ApiResponse> {
            (self.responder)(plan)
        }
    }

    fn items_catalog() -> OperationCatalog {
        let mut create = OperationProperties {
            operation_id: "createItem".to_string(),
            endpoint_path: "/items".to_string(),
            http_method: HttpMethod::Post,
            summary: None,
            parameters: IndexMap::new(),
            request_body: IndexMap::new(),
            responses: IndexMap::new(),
        };
        let mut body_schema = SchemaProperties::of_kind(ValueKind::Object);
        body_schema
            .properties
            .insert("name".to_string(), SchemaProperties::of_kind(ValueKind::String));
        create
            .request_body
            .insert("application/json".to_string(), body_schema);
        let mut response_schema = SchemaProperties::of_kind(ValueKind::Object);
        response_schema
            .properties
            .insert("id".to_string(), SchemaProperties::of_kind(ValueKind::Integer));
        let mut response = ResponseProperties::default();
        response
            .content
            .insert("application/json".to_string(), response_schema);
        create.responses.insert("201".to_string(), response);

        let mut get = OperationProperties {
            operation_id: "getItem".to_string(),
            endpoint_path: "/items/{id}".to_string(),
            http_method: HttpMethod::Get,
            summary: None,
            parameters: IndexMap::new(),
            request_body: IndexMap::new(),
            responses: IndexMap::new(),
        };
        get.parameters.insert(
            "id".to_string(),
            ParameterProperties {
                in_value: ParameterIn::Path,
                required: true,
                schema: Some(SchemaProperties::of_kind(ValueKind::Integer)),
            },
        );

        OperationCatalog {
            spec_name: "items".to_string(),
            operations: [
                ("createItem".to_string(), create),
                ("getItem".to_string(), get),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn test_config(dir: &std::path::Path) -> RunConfig {
        RunConfig {
            warmup_secs: 0,
            mutation_rate: 0.0,
            seed: Some(7),
            output_dir: dir.to_path_buf(),
            ..RunConfig::default()
        }
    }

    fn orchestrator_with(
        config: RunConfig,
        responder: Box<dyn Fn(&RequestPlan) -> Option<ApiResponse> + Send>,
    ) -> Orchestrator {
        let limit = config.tentative_edge_limit;
        let graph = OperationGraph::new(items_catalog(), limit);
        let transport = ScriptedTransport { responder };
        Orchestrator::new(
            graph,
            config,
            Box::new(transport),
            Arc::new(TypedValueSynthesizer),
        )
    }

    fn context_for(orchestrator: &Orchestrator, source: DataSource) -> IterationContext {
        let operation = orchestrator.graph.operation("getItem").cloned().unwrap();
        IterationContext {
            operation,
            param_action: ParameterAction {
                parameters: vec!["id".to_string()],
                media_type: None,
            },
            header_action: Some(None),
            source,
            parameters: Some(
                [("id".to_string(), serde_json::json!(1))]
                    .into_iter()
                    .collect(),
            ),
            used_value_action: Some(ValueAction::default()),
            dependency_used: None,
            body_selection: None,
        }
    }

    fn ok_response() -> ApiResponse {
        ApiResponse {
            status_code: 200,
            text: "{}".to_string(),
        }
    }

    #[test]
    fn test_learning_touches_only_the_exploring_axis() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = orchestrator_with(
            test_config(dir.path()),
            Box::new(|_| Some(ok_response())),
        );
        let context = context_for(&orchestrator, DataSource::Llm);

        let parameter_zeros = orchestrator.parameter_agent.number_of_zeros("getItem");
        let header_zeros = orchestrator.header_agent.number_of_zeros("getItem");
        let source_zeros = orchestrator.data_source_agent.number_of_zeros("getItem");

        orchestrator.apply_learning(
            ExploreTarget::DataSource,
            &context,
            Some(&ok_response()),
        );

        assert_eq!(
            orchestrator.data_source_agent.number_of_zeros("getItem"),
            source_zeros - 1,
            "explored axis must be updated"
        );
        assert_eq!(
            orchestrator.parameter_agent.number_of_zeros("getItem"),
            parameter_zeros,
            "non-exploring axis must stay untouched"
        );
        assert_eq!(
            orchestrator.header_agent.number_of_zeros("getItem"),
            header_zeros,
            "non-exploring axis must stay untouched"
        );
    }

    #[test]
    fn test_none_target_updates_no_scheduler_axis() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator = orchestrator_with(
            test_config(dir.path()),
            Box::new(|_| Some(ok_response())),
        );
        let context = context_for(&orchestrator, DataSource::Llm);
        let zeros_before = orchestrator.zero_counts("getItem");

        orchestrator.apply_learning(ExploreTarget::None, &context, Some(&ok_response()));

        let zeros_after = orchestrator.zero_counts("getItem");
        assert_eq!(zeros_before.parameter_body, zeros_after.parameter_body);
        assert_eq!(zeros_before.data_source, zeros_after.data_source);
        assert_eq!(zeros_before.value, zeros_after.value);
        assert_eq!(zeros_before.dependency, zeros_after.dependency);
        assert_eq!(zeros_before.header, zeros_after.header);
    }

    #[test]
    fn test_mutated_iterations_never_update_tables() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            mutation_rate: 1.0,
            max_iterations: Some(10),
            time_duration_secs: 3600,
            ..test_config(dir.path())
        };
        // Non-JSON body keeps the store quiet so zero counts are a faithful
        // no-update probe.
        let mut orchestrator = orchestrator_with(
            config,
            Box::new(|_| {
                Some(ApiResponse {
                    status_code: 200,
                    text: String::new(),
                })
            }),
        );
        let before_get = orchestrator.zero_counts("getItem");
        let before_create = orchestrator.zero_counts("createItem");
        let operation_zeros = orchestrator.operation_agent.number_of_zeros("");

        orchestrator.run().unwrap();

        let after_get = orchestrator.zero_counts("getItem");
        let after_create = orchestrator.zero_counts("createItem");
        assert_eq!(before_get.parameter_body, after_get.parameter_body);
        assert_eq!(before_get.data_source, after_get.data_source);
        assert_eq!(before_get.dependency, after_get.dependency);
        assert_eq!(before_get.header, after_get.header);
        assert_eq!(before_create.parameter_body, after_create.parameter_body);
        assert_eq!(before_create.data_source, after_create.data_source);
        assert_eq!(
            orchestrator.operation_agent.number_of_zeros(""),
            operation_zeros,
            "even the operation agent skips mutated iterations"
        );
        assert_eq!(orchestrator.tally().total(), 10);
    }

    #[test]
    fn test_transport_failure_leaves_tables_unchanged_under_none_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut orchestrator =
            orchestrator_with(test_config(dir.path()), Box::new(|_| None));
        let context = context_for(&orchestrator, DataSource::Llm);
        let zeros_before = orchestrator.zero_counts("getItem");
        orchestrator.apply_learning(ExploreTarget::None, &context, None);
        let zeros_after = orchestrator.zero_counts("getItem");
        assert_eq!(zeros_before.data_source, zeros_after.data_source);
        assert_eq!(zeros_before.parameter_body, zeros_after.parameter_body);
    }

    #[test]
    fn test_run_respects_iteration_cap_and_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            max_iterations: Some(25),
            time_duration_secs: 3600,
            ..test_config(dir.path())
        };
        let mut orchestrator = orchestrator_with(
            config,
            Box::new(|plan| {
                let status = if plan.path == "/items" { 201 } else { 404 };
                Some(ApiResponse {
                    status_code: status,
                    text: "{\"id\": 5}".to_string(),
                })
            }),
        );
        let summary = orchestrator.run().unwrap();
        assert_eq!(summary.iterations, 25);
        assert_eq!(orchestrator.tally().total(), 25);
        assert!(summary.report_path.exists());
    }

    #[test]
    fn test_server_errors_land_in_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig {
            max_iterations: Some(10),
            time_duration_secs: 3600,
            ..test_config(dir.path())
        };
        let mut orchestrator = orchestrator_with(
            config,
            Box::new(|_| {
                Some(ApiResponse {
                    status_code: 500,
                    text: "boom".to_string(),
                })
            }),
        );
        orchestrator.run().unwrap();
        assert_eq!(orchestrator.ledger().total(), 10);
        assert!(!orchestrator.ledger().signatures().is_empty());
    }
}
