//! Semantic operation dependency graph.
//!
//! Nodes wrap catalog operations; edges record field-level matches between a
//! consumer's parameters/body fields and a producer's outputs. Firm edges
//! carry the accepted best match per field; tentative edges keep a bounded
//! pool of runner-up matches for fallback. Cycles are allowed.

pub mod compare;

pub use compare::{Comparison, DependencyComparator, LexicalComparator};

use crate::catalog::{OperationCatalog, OperationProperties};
use crate::error::{EngineError, EngineResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use tracing::debug;

/// Where a matched producer field lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Params,
    Body,
    Response,
}

/// One scored field match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityValue {
    pub similarity: f64,
    pub destination_field: String,
    pub in_value: MatchSource,
}

/// Directed edge from a consumer operation to a producer operation, mapping
/// each consumer field to one or more matches among the producer's fields.
#[derive(Debug, Clone)]
pub struct OperationEdge {
    pub source: String,
    pub destination: String,
    pub similar_fields: IndexMap<String, Vec<SimilarityValue>>,
}

impl OperationEdge {
    /// Similarity of the edge's primary (first-inserted) field, used to
    /// order tentative edges.
    pub fn primary_similarity(&self) -> f64 {
        self.similar_fields
            .first()
            .and_then(|(_, matches)| matches.first())
            .map(|sv| sv.similarity)
            .unwrap_or(0.0)
    }
}

/// Graph node owning its outgoing firm and tentative edges.
#[derive(Debug, Clone)]
pub struct OperationNode {
    pub operation: OperationProperties,
    pub outgoing_edges: Vec<OperationEdge>,
    pub tentative_edges: Vec<OperationEdge>,
}

impl OperationNode {
    fn new(operation: OperationProperties) -> Self {
        Self {
            operation,
            outgoing_edges: Vec::new(),
            tentative_edges: Vec::new(),
        }
    }
}

/// The dependency graph over all catalog operations.
#[derive(Debug, Clone)]
pub struct OperationGraph {
    pub spec_name: String,
    pub nodes: IndexMap<String, OperationNode>,
    tentative_limit: usize,
}

impl OperationGraph {
    /// Build nodes from a catalog; edges are added by [`build_dependencies`]
    /// or directly.
    pub fn new(catalog: OperationCatalog, tentative_limit: usize) -> Self {
        let nodes = catalog
            .operations
            .into_iter()
            .map(|(id, op)| (id, OperationNode::new(op)))
            .collect();
        Self {
            spec_name: catalog.spec_name,
            nodes,
            tentative_limit,
        }
    }

    pub fn node(&self, operation_id: &str) -> Option<&OperationNode> {
        self.nodes.get(operation_id)
    }

    pub fn operation(&self, operation_id: &str) -> Option<&OperationProperties> {
        self.nodes.get(operation_id).map(|n| &n.operation)
    }

    pub fn operation_ids(&self) -> impl Iterator<Item = &String> {
        self.nodes.keys()
    }

    fn check_nodes(&self, source: &str, destination: &str) -> EngineResult<()> {
        if !self.nodes.contains_key(source) {
            return Err(EngineError::Graph(format!(
                "operation {} not found in the graph",
                source
            )));
        }
        if !self.nodes.contains_key(destination) {
            return Err(EngineError::Graph(format!(
                "operation {} not found in the graph",
                destination
            )));
        }
        Ok(())
    }

    /// Add a firm edge. Both endpoints must already exist as nodes.
    pub fn add_edge(
        &mut self,
        source: &str,
        destination: &str,
        similar_fields: IndexMap<String, Vec<SimilarityValue>>,
    ) -> EngineResult<()> {
        self.check_nodes(source, destination)?;
        let edge = OperationEdge {
            source: source.to_string(),
            destination: destination.to_string(),
            similar_fields,
        };
        if let Some(node) = self.nodes.get_mut(source) {
            node.outgoing_edges.push(edge);
        }
        Ok(())
    }

    /// Add a tentative edge holding runner-up matches, then re-truncate the
    /// source's tentative set to the top-K by primary-field similarity.
    pub fn add_tentative_edge(
        &mut self,
        source: &str,
        destination: &str,
        runner_ups: Vec<(String, SimilarityValue)>,
    ) -> EngineResult<()> {
        self.check_nodes(source, destination)?;
        let mut similar_fields: IndexMap<String, Vec<SimilarityValue>> = IndexMap::new();
        for (field, sv) in runner_ups {
            similar_fields.entry(field).or_default().push(sv);
        }
        let edge = OperationEdge {
            source: source.to_string(),
            destination: destination.to_string(),
            similar_fields,
        };
        let limit = self.tentative_limit;
        if let Some(node) = self.nodes.get_mut(source) {
            node.tentative_edges.push(edge);
            node.tentative_edges.sort_by(|a, b| {
                b.primary_similarity()
                    .partial_cmp(&a.primary_similarity())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            node.tentative_edges.truncate(limit);
        }
        Ok(())
    }

    /// Compare every ordered pair of distinct operations where the consumer
    /// has inputs and the producer has responses, and record the resulting
    /// firm and tentative edges. O(n²) in operation count; the graph is
    /// built once per run.
    pub fn build_dependencies(
        &mut self,
        comparator: &dyn DependencyComparator,
    ) -> EngineResult<()> {
        let ids: Vec<String> = self.nodes.keys().cloned().collect();
        let mut pending: Vec<(String, String, Comparison)> = Vec::new();
        for consumer_id in &ids {
            for producer_id in &ids {
                if consumer_id == producer_id {
                    continue;
                }
                let consumer = &self.nodes[consumer_id].operation;
                let producer = &self.nodes[producer_id].operation;
                let has_inputs =
                    !consumer.parameters.is_empty() || !consumer.request_body.is_empty();
                if !has_inputs || producer.responses.is_empty() {
                    continue;
                }
                let comparison = comparator.compare(consumer, producer);
                if !comparison.firm.is_empty() || !comparison.tentative.is_empty() {
                    pending.push((consumer_id.clone(), producer_id.clone(), comparison));
                }
            }
        }
        for (consumer_id, producer_id, comparison) in pending {
            if !comparison.firm.is_empty() {
                let fields = comparison
                    .firm
                    .into_iter()
                    .map(|(field, sv)| (field, vec![sv]))
                    .collect();
                self.add_edge(&consumer_id, &producer_id, fields)?;
            }
            if !comparison.tentative.is_empty() {
                self.add_tentative_edge(&consumer_id, &producer_id, comparison.tentative)?;
            }
        }
        debug!(
            spec = %self.spec_name,
            edges = self.nodes.values().map(|n| n.outgoing_edges.len()).sum::<usize>(),
            "dependency graph built"
        );
        Ok(())
    }

    /// Human-readable dump of nodes and edges for diagnostics.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (id, node) in &self.nodes {
            let _ = writeln!(out, "operation: {}", id);
            for edge in &node.outgoing_edges {
                for (field, matches) in &edge.similar_fields {
                    for sv in matches {
                        let _ = writeln!(
                            out,
                            "  edge {} -> {}: {} ~ {} ({:.2}, {:?})",
                            edge.source,
                            edge.destination,
                            field,
                            sv.destination_field,
                            sv.similarity,
                            sv.in_value
                        );
                    }
                }
            }
            for edge in &node.tentative_edges {
                let _ = writeln!(
                    out,
                    "  tentative {} -> {} (primary {:.2})",
                    edge.source,
                    edge.destination,
                    edge.primary_similarity()
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HttpMethod, OperationProperties};

    fn operation(id: &str) -> OperationProperties {
        OperationProperties {
            operation_id: id.to_string(),
            endpoint_path: format!("/{}", id),
            http_method: HttpMethod::Get,
            summary: None,
            parameters: IndexMap::new(),
            request_body: IndexMap::new(),
            responses: IndexMap::new(),
        }
    }

    fn graph(ids: &[&str]) -> OperationGraph {
        let operations = ids
            .iter()
            .map(|id| (id.to_string(), operation(id)))
            .collect();
        OperationGraph::new(
            OperationCatalog {
                spec_name: "test".to_string(),
                operations,
            },
            3,
        )
    }

    fn similarity(score: f64, field: &str) -> SimilarityValue {
        SimilarityValue {
            similarity: score,
            destination_field: field.to_string(),
            in_value: MatchSource::Response,
        }
    }

    #[test]
    fn test_edge_to_unknown_operation_is_an_error() {
        let mut g = graph(&["a"]);
        let err = g.add_edge("a", "missing", IndexMap::new());
        assert!(err.is_err());
        let err = g.add_tentative_edge("missing", "a", Vec::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_tentative_edges_bounded_and_sorted() {
        let mut g = graph(&["a", "b"]);
        for score in [0.2, 0.6, 0.4, 0.8, 0.1] {
            g.add_tentative_edge("a", "b", vec![("f".to_string(), similarity(score, "g"))])
                .unwrap();
        }
        let node = g.node("a").unwrap();
        assert_eq!(node.tentative_edges.len(), 3);
        let scores: Vec<f64> = node
            .tentative_edges
            .iter()
            .map(|e| e.primary_similarity())
            .collect();
        assert_eq!(scores, vec![0.8, 0.6, 0.4]);
    }

    #[test]
    fn test_cycles_are_allowed() {
        let mut g = graph(&["a", "b"]);
        let fields: IndexMap<String, Vec<SimilarityValue>> =
            [("f".to_string(), vec![similarity(0.9, "g")])]
                .into_iter()
                .collect();
        g.add_edge("a", "b", fields.clone()).unwrap();
        g.add_edge("b", "a", fields).unwrap();
        assert_eq!(g.node("a").unwrap().outgoing_edges.len(), 1);
        assert_eq!(g.node("b").unwrap().outgoing_edges.len(), 1);
    }
}
