//! Dependency comparator boundary.
//!
//! The reference comparator scores field pairs with embedding-based semantic
//! similarity; it plugs in behind [`DependencyComparator`]. The in-tree
//! default is a lexical character-bigram comparator, good enough to wire up
//! specs whose producer and consumer fields share naming.

use crate::catalog::{body_field_names, OperationProperties};
use crate::graph::{MatchSource, SimilarityValue};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Outcome of comparing one consumer operation against one producer.
#[derive(Debug, Clone, Default)]
pub struct Comparison {
    /// Accepted best match per consumer field (similarity above threshold).
    pub firm: IndexMap<String, SimilarityValue>,
    /// Runner-up matches, best first, kept as the fallback pool.
    pub tentative: Vec<(String, SimilarityValue)>,
}

/// Scores the fields of a consumer operation against a producer's outputs.
pub trait DependencyComparator {
    fn compare(&self, consumer: &OperationProperties, producer: &OperationProperties)
        -> Comparison;
}

/// Lexical comparator: Jaccard similarity over character bigrams of
/// normalized field names.
#[derive(Debug, Clone)]
pub struct LexicalComparator {
    threshold: f64,
    runner_up_count: usize,
}

impl LexicalComparator {
    pub fn new(threshold: f64, runner_up_count: usize) -> Self {
        Self {
            threshold,
            runner_up_count,
        }
    }
}

impl Default for LexicalComparator {
    fn default() -> Self {
        Self::new(0.75, 5)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn bigrams(name: &str) -> HashSet<(char, char)> {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() < 2 {
        return chars.first().map(|c| (*c, '\0')).into_iter().collect();
    }
    chars.windows(2).map(|w| (w[0], w[1])).collect()
}

/// Similarity in [0, 1] between two field names.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    let ga = bigrams(&a);
    let gb = bigrams(&b);
    let intersection = ga.intersection(&gb).count() as f64;
    let union = ga.union(&gb).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Fields a consumer may need values for: its parameters and, per media
/// type, the flat fields of its request body.
fn consumer_fields(operation: &OperationProperties) -> Vec<String> {
    let mut fields: Vec<String> = operation.parameters.keys().cloned().collect();
    for schema in operation.request_body.values() {
        for field in body_field_names(schema) {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }
    fields
}

/// Fields a producer may expose values through, tagged with their source.
fn producer_fields(operation: &OperationProperties) -> Vec<(String, MatchSource)> {
    let mut fields: Vec<(String, MatchSource)> = Vec::new();
    for response in operation.responses.values() {
        for schema in response.content.values() {
            for field in body_field_names(schema) {
                if !fields.iter().any(|(f, _)| f == &field) {
                    fields.push((field, MatchSource::Response));
                }
            }
        }
    }
    for name in operation.parameters.keys() {
        if !fields.iter().any(|(f, _)| f == name) {
            fields.push((name.clone(), MatchSource::Params));
        }
    }
    for schema in operation.request_body.values() {
        for field in body_field_names(schema) {
            if !fields.iter().any(|(f, _)| f == &field) {
                fields.push((field, MatchSource::Body));
            }
        }
    }
    fields
}

impl DependencyComparator for LexicalComparator {
    fn compare(
        &self,
        consumer: &OperationProperties,
        producer: &OperationProperties,
    ) -> Comparison {
        let candidates = producer_fields(producer);
        let mut comparison = Comparison::default();
        if candidates.is_empty() {
            return comparison;
        }

        for field in consumer_fields(consumer) {
            let mut scored: Vec<SimilarityValue> = candidates
                .iter()
                .map(|(name, source)| SimilarityValue {
                    similarity: name_similarity(&field, name),
                    destination_field: name.clone(),
                    in_value: *source,
                })
                .filter(|sv| sv.similarity > 0.0)
                .collect();
            // Stable sort keeps first-encountered order among equal scores.
            scored.sort_by(|a, b| {
                b.similarity
                    .partial_cmp(&a.similarity)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut rest = scored.into_iter();
            if let Some(best) = rest.next() {
                if best.similarity >= self.threshold {
                    comparison.firm.insert(field.clone(), best);
                } else {
                    comparison.tentative.push((field.clone(), best));
                }
            }
            for runner_up in rest.take(self.runner_up_count) {
                comparison.tentative.push((field.clone(), runner_up));
            }
        }
        comparison
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{HttpMethod, ParameterIn, ParameterProperties, ResponseProperties};
    use crate::catalog::{SchemaProperties, ValueKind};

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

    fn with_response_fields(mut op: OperationProperties, fields: &[&str]) -> OperationProperties {
        let mut schema = SchemaProperties::of_kind(ValueKind::Object);
        for field in fields {
            schema
                .properties
                .insert(field.to_string(), SchemaProperties::of_kind(ValueKind::String));
        }
        let mut response = ResponseProperties::default();
        response.content.insert("application/json".to_string(), schema);
        op.responses.insert("200".to_string(), response);
        op
    }

    fn with_parameter(mut op: OperationProperties, name: &str) -> OperationProperties {
        op.parameters.insert(
            name.to_string(),
            ParameterProperties {
                in_value: ParameterIn::Query,
                required: false,
                schema: Some(SchemaProperties::of_kind(ValueKind::String)),
            },
        );
        op
    }

    #[test]
    fn test_identical_names_match_firmly() {
        let consumer = with_parameter(operation("getItem"), "itemId");
        let producer = with_response_fields(operation("createItem"), &["itemId", "label"]);
        let comparison = LexicalComparator::default().compare(&consumer, &producer);
        let sv = comparison.firm.get("itemId").unwrap();
        assert_eq!(sv.similarity, 1.0);
        assert_eq!(sv.destination_field, "itemId");
        assert_eq!(sv.in_value, MatchSource::Response);
    }

    #[test]
    fn test_weak_matches_stay_tentative() {
        let consumer = with_parameter(operation("getItem"), "ownerName");
        let producer = with_response_fields(operation("createItem"), &["name"]);
        let comparison = LexicalComparator::default().compare(&consumer, &producer);
        assert!(comparison.firm.is_empty());
        assert_eq!(comparison.tentative.len(), 1);
        assert!(comparison.tentative[0].1.similarity < 0.75);
    }

    #[test]
    fn test_runner_up_count_is_respected() {
        let consumer = with_parameter(operation("a"), "userId");
        let producer = with_response_fields(
            operation("b"),
            &["userId", "userIdx", "userIds", "userInfo", "userIdent", "useId", "uid"],
        );
        let comparator = LexicalComparator::new(0.75, 3);
        let comparison = comparator.compare(&consumer, &producer);
        assert!(comparison.firm.contains_key("userId"));
        assert!(comparison.tentative.len() <= 3);
    }

    #[test]
    fn test_name_similarity_bounds() {
        assert_eq!(name_similarity("id", "id"), 1.0);
        assert_eq!(name_similarity("", "id"), 0.0);
        let mid = name_similarity("petName", "pet_name");
        assert!(mid > 0.9, "normalization should ignore separators: {}", mid);
    }
}
