//! Session reconstruction: where to resume and with which values,
//! derived only from the log.
//!
//! The resume step is found by applying the transition evaluator to the
//! last-touched step with its latest snapshot, exactly as a live advance
//! would. The step's position in the definition plays no part.

use std::collections::{BTreeMap, HashSet};

use pathway_core::ProtocolGraph;
use pathway_storage::DataEntryRecord;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::SessionError;
use crate::log::{fold_latest, SessionLog};
use crate::transition::next_step;
use crate::visibility::NoValues;

/// Resumable state of one instance at the time of the read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumePoint {
    pub current_step_id: String,
    /// Exactly the latest snapshot per step, unfiltered.
    pub values_by_step: BTreeMap<String, Value>,
    /// Step of the chronologically last entry.
    pub last_step_id: Option<String>,
    /// Back-stack leading to `current_step_id`, oldest first.
    pub history: Vec<String>,
}

/// Reconstruct from entries already in `(created_at, seq)` order.
pub fn reconstruct(graph: &ProtocolGraph, entries: &[DataEntryRecord]) -> ResumePoint {
    let values_by_step = fold_latest(entries);

    let Some(last) = entries.last() else {
        return ResumePoint {
            current_step_id: graph.initial_step_id().to_string(),
            values_by_step,
            last_step_id: None,
            history: Vec::new(),
        };
    };

    let last_step_id = last.step_id.clone();
    let current_step_id = match graph.step(&last_step_id) {
        Some(step) => {
            let captured = values_by_step.get(&last_step_id);
            let next = match captured {
                Some(values) => next_step(step, values),
                None => next_step(step, &NoValues),
            };
            next.unwrap_or(last_step_id.as_str()).to_string()
        }
        None => last_step_id.clone(),
    };

    let history = rebuild_history(graph, &values_by_step, &current_step_id, &last_step_id);

    ResumePoint {
        current_step_id,
        values_by_step,
        last_step_id: Some(last_step_id),
        history,
    }
}

/// Read the log and reconstruct. A point-in-time read: later appends are
/// not reflected.
pub async fn resume(
    log: &SessionLog,
    graph: &ProtocolGraph,
    instance_id: &str,
) -> Result<ResumePoint, SessionError> {
    let entries = log.entries_for(instance_id).await?;
    let point = reconstruct(graph, &entries);
    debug!(
        instance = %instance_id,
        entries = entries.len(),
        current = %point.current_step_id,
        "session reconstructed"
    );
    Ok(point)
}

/// Walk the evaluator from the initial step until `current` is reached.
/// When the walk cannot reach it (the log was written under other answers
/// or the graph changed), fall back to the last-touched step alone.
fn rebuild_history(
    graph: &ProtocolGraph,
    values_by_step: &BTreeMap<String, Value>,
    current: &str,
    last: &str,
) -> Vec<String> {
    let mut trail = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = graph.initial_step_id();

    while cursor != current {
        if !seen.insert(cursor) {
            break;
        }
        let Some(step) = graph.step(cursor) else {
            break;
        };
        trail.push(cursor.to_string());
        let next = match values_by_step.get(cursor) {
            Some(values) => next_step(step, values),
            None => next_step(step, &NoValues),
        };
        match next {
            Some(n) => cursor = n,
            None => break,
        }
    }

    if cursor == current {
        return trail;
    }
    if last != current {
        vec![last.to_string()]
    } else {
        Vec::new()
    }
}
