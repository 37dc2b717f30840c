//! Success report.
//!
//! At the end of a run the accumulated Success Store is persisted as a JSON
//! document with `PARAMETERS`, `BODIES`, and `RESPONSES` top-level keys,
//! written to a path derived from the spec's name.

use crate::error::{EngineError, EngineResult};
use crate::store::SuccessStore;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
pub struct SuccessReport<'a> {
    #[serde(rename = "PARAMETERS")]
    pub parameters: &'a IndexMap<String, IndexMap<String, Vec<Value>>>,
    #[serde(rename = "BODIES")]
    pub bodies: &'a IndexMap<String, IndexMap<String, Vec<Value>>>,
    #[serde(rename = "RESPONSES")]
    pub responses: &'a IndexMap<String, IndexMap<String, Vec<Value>>>,
}

/// Write the report to `<output_dir>/<spec_name>.json`, creating the
/// directory when needed. Returns the written path.
pub fn write_report(
    store: &SuccessStore,
    output_dir: &Path,
    spec_name: &str,
) -> EngineResult<PathBuf> {
    let report = SuccessReport {
        parameters: store.parameters(),
        bodies: store.bodies(),
        responses: store.responses(),
    };
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("{}.json", spec_name));
    let serialized = serde_json::to_string_pretty(&report)
        .map_err(|e| EngineError::Report(format!("failed to serialize report: {}", e)))?;
    std::fs::write(&path, serialized)?;
    info!(path = %path.display(), "success report written");
    Ok(path)
}
