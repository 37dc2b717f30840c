//! Error-response classification boundary.
//!
//! The surrounding error-handling layer asks a language model what kind of
//! failure a response text describes; this module owns the verdict taxonomy
//! and the keyword extraction of the model's answer.

use crate::error::EngineResult;
use crate::synth::LlmClient;

/// What an HTTP error body complains about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    ParameterConstraint,
    Format,
    ParameterDependency,
    OperationDependency,
}

/// Extract the verdict from a classification answer. The first recognized
/// marker wins; anything else means "none".
pub fn extract_classification(text: &str) -> Option<ErrorClass> {
    if text.contains("PARAMETER CONSTRAINT") {
        Some(ErrorClass::ParameterConstraint)
    } else if text.contains("FORMAT") {
        Some(ErrorClass::Format)
    } else if text.contains("PARAMETER DEPENDENCY") {
        Some(ErrorClass::ParameterDependency)
    } else if text.contains("OPERATION DEPENDENCY") {
        Some(ErrorClass::OperationDependency)
    } else {
        None
    }
}

const CLASSIFICATION_SYSTEM_MESSAGE: &str =
    "You classify REST API error messages. Answer with exactly one of: \
     PARAMETER CONSTRAINT, FORMAT, PARAMETER DEPENDENCY, OPERATION DEPENDENCY, or NONE.";

/// Classifier over response text.
pub trait ResponseClassifier {
    fn classify(&self, response_text: &str) -> EngineResult<Option<ErrorClass>>;
}

/// Language-model-backed classifier.
pub struct LlmResponseClassifier {
    client: Box<dyn LlmClient>,
}

impl LlmResponseClassifier {
    pub fn new(client: Box<dyn LlmClient>) -> Self {
        Self { client }
    }
}

impl ResponseClassifier for LlmResponseClassifier {
    fn classify(&self, response_text: &str) -> EngineResult<Option<ErrorClass>> {
        let verdict = self
            .client
            .complete(CLASSIFICATION_SYSTEM_MESSAGE, response_text, false)?;
        Ok(extract_classification(&verdict))
    }
}
