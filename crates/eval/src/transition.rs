//! Transition evaluation: which step comes after this one.

use pathway_core::{GraphError, ProtocolGraph, Step};

use crate::visibility::FieldLookup;

/// Next step id for `step` given its captured values, or `None` when the
/// step is terminal.
///
/// Predicated transitions are tried in declared order and the first whose
/// field holds exactly the expected value wins. Without a match the
/// unconditioned transition applies. Pure.
pub fn next_step<'g, L: FieldLookup + ?Sized>(step: &'g Step, captured: &L) -> Option<&'g str> {
    let matched = step.transitions.iter().find(|t| match &t.predicate {
        Some(pred) => captured.lookup(&pred.field_id) == Some(&pred.equals),
        None => false,
    });
    matched
        .or_else(|| step.default_transition())
        .map(|t| t.target.as_str())
}

/// [`next_step`] by step id.
pub fn next_step_id<'g, L: FieldLookup + ?Sized>(
    graph: &'g ProtocolGraph,
    step_id: &str,
    captured: &L,
) -> Result<Option<&'g str>, GraphError> {
    Ok(next_step(graph.step_by_id(step_id)?, captured))
}
