//! End-to-end loop against a scripted in-process API.

use indexmap::IndexMap;
use restrl::catalog::{
    HttpMethod, OperationCatalog, OperationProperties, ParameterIn, ParameterProperties,
    ResponseProperties, SchemaProperties, ValueKind,
};
use restrl::graph::{LexicalComparator, MatchSource, OperationGraph};
use restrl::orchestrator::Orchestrator;
use restrl::request::RequestPlan;
use restrl::rl::agents::DependencyAgent;
use restrl::store::SuccessStore;
use restrl::synth::TypedValueSynthesizer;
use restrl::transport::{ApiResponse, HttpTransport};
use restrl::RunConfig;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

fn items_catalog() -> OperationCatalog {
    let mut create = OperationProperties {
        operation_id: "createItem".to_string(),
        endpoint_path: "/items".to_string(),
        http_method: HttpMethod::Post,
        summary: Some("Create an item".to_string()),
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
    let mut created = ResponseProperties::default();
    created
        .content
        .insert("application/json".to_string(), response_schema);
    create.responses.insert("201".to_string(), created);

    let mut get = OperationProperties {
        operation_id: "getItem".to_string(),
        endpoint_path: "/items/{id}".to_string(),
        http_method: HttpMethod::Get,
        summary: Some("Fetch an item".to_string()),
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
    let mut item_schema = SchemaProperties::of_kind(ValueKind::Object);
    item_schema
        .properties
        .insert("id".to_string(), SchemaProperties::of_kind(ValueKind::Integer));
    item_schema
        .properties
        .insert("name".to_string(), SchemaProperties::of_kind(ValueKind::String));
    let mut fetched = ResponseProperties::default();
    fetched
        .content
        .insert("application/json".to_string(), item_schema);
    get.responses.insert("200".to_string(), fetched);

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

fn items_graph() -> OperationGraph {
    let mut graph = OperationGraph::new(items_catalog(), 5);
    graph
        .build_dependencies(&LexicalComparator::default())
        .unwrap();
    graph
}

/// In-process item store: POST mints increasing ids, GET serves minted ids.
struct ItemsApi {
    next_id: AtomicI64,
}

impl HttpTransport for ItemsApi {
    fn send(&self, plan: &RequestPlan) -> Option<ApiResponse> {
        if plan.path == "/items" && plan.method == HttpMethod::Post {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            return Some(ApiResponse {
                status_code: 201,
                text: json!({"id": id}).to_string(),
            });
        }
        if plan.method == HttpMethod::Get {
            if let Some(raw) = plan.path.strip_prefix("/items/") {
                if let Ok(id) = raw.parse::<i64>() {
                    if id < self.next_id.load(Ordering::SeqCst) {
                        return Some(ApiResponse {
                            status_code: 200,
                            text: json!({"id": id, "name": "item"}).to_string(),
                        });
                    }
                }
                return Some(ApiResponse {
                    status_code: 404,
                    text: json!({"error": "no such item"}).to_string(),
                });
            }
        }
        Some(ApiResponse {
            status_code: 405,
            text: String::new(),
        })
    }
}

#[test]
fn lexical_comparator_wires_the_id_dependency() {
    let graph = items_graph();
    let consumer = graph.node("getItem").unwrap();
    let edge = consumer
        .outgoing_edges
        .iter()
        .find(|edge| edge.destination == "createItem")
        .expect("firm edge getItem -> createItem");
    let matches = edge.similar_fields.get("id").unwrap();
    assert_eq!(matches[0].destination_field, "id");
    assert_eq!(matches[0].in_value, MatchSource::Response);
}

#[test]
fn recorded_producer_value_resolves_a_dependency_lookup() {
    let graph = items_graph();
    let agent = DependencyAgent::new(&graph, 0.1, 0.9);
    let mut store = SuccessStore::from_graph(&graph);
    assert!(store.record_response_field("createItem", "id", json!(42)));
    assert_eq!(
        store.responses()["createItem"]["id"],
        vec![json!(42)],
        "single successful POST must be visible verbatim"
    );

    let mut rng: rand::rngs::StdRng = rand::SeedableRng::seed_from_u64(1);
    let plan = agent.plan(
        "getItem",
        &["id".to_string()],
        &[],
        &store,
        false,
        &mut rng,
    );
    let producer = plan.parameters.get("id").expect("id must be bound");
    assert_eq!(producer.dependent_operation, "createItem");
    assert_eq!(store.sample(producer, &mut rng), Some(json!(42)));
}

#[test]
fn loop_mines_dynamic_ids_and_writes_the_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        warmup_secs: 0,
        mutation_rate: 0.1,
        header_agent_enabled: false,
        time_duration_secs: 3600,
        max_iterations: Some(400),
        seed: Some(3),
        output_dir: dir.path().to_path_buf(),
        ..RunConfig::default()
    };
    let transport = ItemsApi {
        next_id: AtomicI64::new(0),
    };
    let mut orchestrator = Orchestrator::new(
        items_graph(),
        config,
        Box::new(transport),
        Arc::new(TypedValueSynthesizer),
    );
    let summary = orchestrator.run().unwrap();

    assert_eq!(summary.iterations, 400);
    assert_eq!(orchestrator.tally().total(), 400);
    assert!(orchestrator.tally().count(201) > 0, "POSTs must succeed");

    // Every successful POST minted a fresh id; the store must have seen
    // more than one distinct value.
    let ids = &orchestrator.store().responses()["createItem"]["id"];
    assert!(ids.len() >= 2, "expected dynamic ids, got {:?}", ids);

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(&summary.report_path).unwrap(),
    )
    .unwrap();
    assert!(report["RESPONSES"]["createItem"]["id"]
        .as_array()
        .map(|values| !values.is_empty())
        .unwrap_or(false));
}
