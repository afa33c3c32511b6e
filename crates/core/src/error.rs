use serde::Serialize;

use pathway_interchange::InterchangeError;

/// A single structural problem found while validating a protocol graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Step the problem was found in, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Location inside the definition, e.g. `steps.s1.transitions[0]`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(step_id: Option<&str>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation {
            step_id: step_id.map(str::to_owned),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors raised by the graph model.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// The definition does not form a well-formed step graph. A graph that
    /// fails validation is never handed out.
    #[error("protocol graph '{graph_id}' failed validation: {}", join_violations(.violations))]
    GraphIntegrity {
        graph_id: String,
        violations: Vec<Violation>,
    },

    /// A step id was looked up that the graph does not declare.
    #[error("unknown step '{step_id}' in protocol graph '{graph_id}'")]
    UnknownStep { graph_id: String, step_id: String },

    /// The definition document itself could not be read.
    #[error("definition document: {0}")]
    Definition(#[from] InterchangeError),
}

impl GraphError {
    pub(crate) fn integrity(graph_id: &str, violations: Vec<Violation>) -> Self {
        GraphError::GraphIntegrity {
            graph_id: graph_id.to_string(),
            violations,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
