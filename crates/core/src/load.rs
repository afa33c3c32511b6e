//! Conversion from a definition document to a validated [`ProtocolGraph`].
//!
//! Kind strings are mapped onto the model's sum types here; anything the
//! model does not know is reported as a violation alongside the structural
//! checks, never silently dropped.

use pathway_interchange::{
    from_document, ConditionDecl, ConditionValueDecl, DefinitionDocument, FieldDecl,
    NavigationDecl, StepDecl, STEP_KIND_FORM, STEP_KIND_INFO,
};

use crate::error::{GraphError, Violation};
use crate::graph::{
    ChoiceOption, Condition, ConditionMatch, FieldSpec, FieldType, ProtocolGraph, Step, StepKind,
    Transition, TransitionPredicate,
};

/// Build a graph from a definition document.
///
/// `fallback_id` names the graph when the document carries no id of its own
/// (definitions stored as bare `structureJson`).
pub fn from_definition(
    doc: DefinitionDocument,
    fallback_id: Option<&str>,
) -> Result<ProtocolGraph, GraphError> {
    let graph_id = match (doc.id, fallback_id) {
        (Some(id), _) => id,
        (None, Some(id)) => id.to_string(),
        (None, None) => {
            return Err(GraphError::integrity(
                "",
                vec![Violation::new(None, "id", "definition has no protocol id")],
            ))
        }
    };

    let mut violations = Vec::new();
    let steps: Vec<Step> = doc
        .steps
        .into_iter()
        .map(|s| convert_step(s, &mut violations))
        .collect();

    if !violations.is_empty() {
        return Err(GraphError::integrity(&graph_id, violations));
    }

    ProtocolGraph::new(
        graph_id,
        doc.title,
        doc.description,
        doc.initial_step,
        steps,
    )
}

/// Parse and build a graph straight from definition JSON.
pub fn from_json(
    value: &serde_json::Value,
    fallback_id: Option<&str>,
) -> Result<ProtocolGraph, GraphError> {
    let doc = from_document(value)?;
    from_definition(doc, fallback_id)
}

fn convert_step(decl: StepDecl, violations: &mut Vec<Violation>) -> Step {
    let kind = match decl.kind.as_str() {
        STEP_KIND_INFO => StepKind::Info,
        STEP_KIND_FORM => StepKind::Form,
        other => {
            violations.push(Violation::new(
                Some(&decl.id),
                format!("steps.{}.type", decl.id),
                format!("unknown step type '{}'", other),
            ));
            StepKind::Form
        }
    };

    let fields = decl
        .fields
        .into_iter()
        .map(|f| convert_field(&decl.id, f, violations))
        .collect();

    let transitions = decl.navigation.into_iter().map(convert_navigation).collect();

    Step {
        id: decl.id,
        kind,
        label: decl.label,
        fields,
        transitions,
    }
}

fn convert_field(step_id: &str, decl: FieldDecl, violations: &mut Vec<Violation>) -> FieldSpec {
    let field_type = FieldType::parse(&decl.field_type).unwrap_or_else(|| {
        violations.push(Violation::new(
            Some(step_id),
            format!("steps.{}.fields.{}.type", step_id, decl.id),
            format!("unknown field type '{}'", decl.field_type),
        ));
        FieldType::Text
    });

    FieldSpec {
        id: decl.id,
        label: decl.label,
        field_type,
        options: decl
            .options
            .into_iter()
            .map(|o| ChoiceOption {
                label: o.label,
                value: o.value,
                exclusive: o.exclusive,
            })
            .collect(),
        condition: decl.condition.map(convert_condition),
        subfields: decl
            .fields
            .into_iter()
            .map(|f| convert_field(step_id, f, violations))
            .collect(),
    }
}

fn convert_condition(decl: ConditionDecl) -> Condition {
    Condition {
        field_id: decl.field,
        matches: match decl.value {
            ConditionValueDecl::Single(v) => ConditionMatch::Equals(v),
            ConditionValueDecl::AnyOf(vs) => ConditionMatch::AnyOf(vs),
        },
    }
}

fn convert_navigation(decl: NavigationDecl) -> Transition {
    let predicate = match (decl.field, decl.on_value) {
        (Some(field_id), Some(equals)) => Some(TransitionPredicate { field_id, equals }),
        _ => None,
    };
    Transition {
        predicate,
        target: decl.go_to,
    }
}
