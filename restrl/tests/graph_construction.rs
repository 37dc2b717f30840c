//! Graph construction against a scripted comparator.

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use restrl::catalog::{
    HttpMethod, OperationCatalog, OperationProperties, ParameterIn, ParameterProperties,
    ResponseProperties, SchemaProperties, ValueKind,
};
use restrl::graph::{
    Comparison, DependencyComparator, MatchSource, OperationGraph, SimilarityValue,
};

fn consumer_op(id: &str) -> OperationProperties {
    let mut op = OperationProperties {
        operation_id: id.to_string(),
        endpoint_path: format!("/{}/{{id}}", id),
        http_method: HttpMethod::Get,
        summary: None,
        parameters: IndexMap::new(),
        request_body: IndexMap::new(),
        responses: IndexMap::new(),
    };
    op.parameters.insert(
        "id".to_string(),
        ParameterProperties {
            in_value: ParameterIn::Path,
            required: true,
            schema: Some(SchemaProperties::of_kind(ValueKind::Integer)),
        },
    );
    op
}

fn producer_op(id: &str) -> OperationProperties {
    let mut op = OperationProperties {
        operation_id: id.to_string(),
        endpoint_path: format!("/{}", id),
        http_method: HttpMethod::Post,
        summary: None,
        parameters: IndexMap::new(),
        request_body: IndexMap::new(),
        responses: IndexMap::new(),
    };
    let mut schema = SchemaProperties::of_kind(ValueKind::Object);
    schema
        .properties
        .insert("id".to_string(), SchemaProperties::of_kind(ValueKind::Integer));
    let mut response = ResponseProperties::default();
    response
        .content
        .insert("application/json".to_string(), schema);
    op.responses.insert("201".to_string(), response);
    op
}

fn catalog(ops: Vec<OperationProperties>) -> OperationCatalog {
    OperationCatalog {
        spec_name: "stub".to_string(),
        operations: ops
            .into_iter()
            .map(|op| (op.operation_id.clone(), op))
            .collect(),
    }
}

/// Accepts every pairing firmly.
struct FirmComparator;

impl DependencyComparator for FirmComparator {
    fn compare(
        &self,
        _consumer: &OperationProperties,
        _producer: &OperationProperties,
    ) -> Comparison {
        let mut comparison = Comparison::default();
        comparison.firm.insert(
            "id".to_string(),
            SimilarityValue {
                similarity: 0.95,
                destination_field: "id".to_string(),
                in_value: MatchSource::Response,
            },
        );
        comparison
    }
}

/// Only runner-up matches, scored by the producer's name.
struct TentativeComparator;

impl DependencyComparator for TentativeComparator {
    fn compare(
        &self,
        _consumer: &OperationProperties,
        producer: &OperationProperties,
    ) -> Comparison {
        let similarity = match producer.operation_id.as_str() {
            "producerA" => 0.7,
            "producerB" => 0.5,
            _ => 0.3,
        };
        let mut comparison = Comparison::default();
        comparison.tentative.push((
            "id".to_string(),
            SimilarityValue {
                similarity,
                destination_field: "itemId".to_string(),
                in_value: MatchSource::Response,
            },
        ));
        comparison
    }
}

#[test]
fn firm_matches_create_outgoing_edges() {
    let mut graph = OperationGraph::new(
        catalog(vec![consumer_op("getItem"), producer_op("createItem")]),
        5,
    );
    graph.build_dependencies(&FirmComparator).unwrap();

    let consumer = graph.node("getItem").unwrap();
    assert_eq!(consumer.outgoing_edges.len(), 1);
    let edge = &consumer.outgoing_edges[0];
    assert_eq!(edge.destination, "createItem");
    let matches = edge.similar_fields.get("id").unwrap();
    assert_eq!(matches[0].destination_field, "id");
    assert_eq!(matches[0].in_value, MatchSource::Response);

    // The producer has no parameters or body, so it consumes nothing.
    let producer = graph.node("createItem").unwrap();
    assert!(producer.outgoing_edges.is_empty());
    assert!(producer.tentative_edges.is_empty());
}

#[test]
fn runner_ups_create_tentative_edges_only() {
    let mut graph = OperationGraph::new(
        catalog(vec![
            consumer_op("getItem"),
            producer_op("producerA"),
            producer_op("producerB"),
            producer_op("producerC"),
        ]),
        2,
    );
    graph.build_dependencies(&TentativeComparator).unwrap();

    let consumer = graph.node("getItem").unwrap();
    assert!(consumer.outgoing_edges.is_empty());
    // Capped at K = 2, sorted by descending primary similarity.
    assert_eq!(consumer.tentative_edges.len(), 2);
    let similarities: Vec<f64> = consumer
        .tentative_edges
        .iter()
        .map(|edge| edge.primary_similarity())
        .collect();
    assert_eq!(similarities, vec![0.7, 0.5]);
    assert_eq!(consumer.tentative_edges[0].destination, "producerA");
}

#[test]
fn operations_without_responses_are_never_producers() {
    // Both operations are consumers only; no pair qualifies.
    let mut graph = OperationGraph::new(
        catalog(vec![consumer_op("a"), consumer_op("b")]),
        5,
    );
    graph.build_dependencies(&FirmComparator).unwrap();
    for node in graph.nodes.values() {
        assert!(node.outgoing_edges.is_empty());
        assert!(node.tentative_edges.is_empty());
    }
}
