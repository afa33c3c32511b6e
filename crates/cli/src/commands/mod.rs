pub(crate) mod evaluate;
pub(crate) mod replay;
pub(crate) mod simulate;
pub(crate) mod validate;

use std::path::Path;
use std::process;

use pathway_core::{GraphError, ProtocolGraph};
use pathway_eval::StepValues;

use crate::{report_error, OutputFormat};

/// Unwrap or report and exit with status 1.
pub(crate) fn or_exit<T>(result: Result<T, String>, output: OutputFormat, quiet: bool) -> T {
    match result {
        Ok(v) => v,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    }
}

pub(crate) fn read_json(path: &Path) -> Result<serde_json::Value, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))
}

/// Parse and validate a definition. Definitions without an id are named
/// after the file stem.
pub(crate) fn load_graph(path: &Path) -> Result<ProtocolGraph, GraphLoadError> {
    let doc = read_json(path).map_err(GraphLoadError::Read)?;
    let stem = path.file_stem().and_then(|s| s.to_str());
    pathway_core::from_json(&doc, stem).map_err(GraphLoadError::Graph)
}

/// [`load_graph`] for commands that only report the message.
pub(crate) fn load_graph_or_exit(path: &Path, output: OutputFormat, quiet: bool) -> ProtocolGraph {
    or_exit(
        load_graph(path).map_err(|e| e.to_string()),
        output,
        quiet,
    )
}

pub(crate) enum GraphLoadError {
    Read(String),
    Graph(GraphError),
}

impl std::fmt::Display for GraphLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphLoadError::Read(msg) => write!(f, "{}", msg),
            GraphLoadError::Graph(e) => write!(f, "{}", e),
        }
    }
}

/// Parse `--values`: a JSON object of field id to value.
pub(crate) fn parse_values(raw: &str) -> Result<StepValues, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err("error: --values must be a JSON object".to_string()),
        Err(e) => Err(format!("error: invalid JSON in --values: {}", e)),
    }
}
