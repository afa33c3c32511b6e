//! Protocol graph model.
//!
//! A [`ProtocolGraph`] is plain data: steps, their fields and their
//! ordered transitions. It has no behavior beyond structural queries;
//! evaluation lives in pathway-eval. Values that are compared at runtime
//! are `serde_json::Value` and compare by exact JSON equality.
//!
//! Graphs are only obtainable through [`ProtocolGraph::new`] (or the
//! definition loaders built on it), all of which validate the structure
//! first, so every `ProtocolGraph` in circulation is well-formed.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::validate;

/// Kind of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Data-capture step with fields.
    Form,
    /// Informational step; captures nothing.
    Info,
}

/// Type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Time,
    SingleChoice,
    MultipleChoice,
    /// One level of nested sub-fields; its value is an object keyed by
    /// sub-field id.
    Group,
}

impl FieldType {
    /// Parse the authoring-format type name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(FieldType::Text),
            "number" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "time" => Some(FieldType::Time),
            "singleChoice" => Some(FieldType::SingleChoice),
            "multipleChoice" => Some(FieldType::MultipleChoice),
            "group" => Some(FieldType::Group),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::SingleChoice => "singleChoice",
            FieldType::MultipleChoice => "multipleChoice",
            FieldType::Group => "group",
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(self, FieldType::SingleChoice | FieldType::MultipleChoice)
    }
}

/// An option of a choice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: serde_json::Value,
    /// Selecting this option deselects every other one.
    #[serde(default)]
    pub exclusive: bool,
}

/// What a governing field's value must be for a conditional field to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionMatch {
    /// Exactly this value.
    Equals(serde_json::Value),
    /// Any member of this set.
    AnyOf(Vec<serde_json::Value>),
}

/// Visibility condition on a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field_id: String,
    pub matches: ConditionMatch,
}

/// A field of a step (or a sub-field of a group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub id: String,
    pub label: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    /// Sub-fields; non-empty only for `FieldType::Group`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subfields: Vec<FieldSpec>,
}

impl FieldSpec {
    /// Option by value, for choice fields.
    pub fn option(&self, value: &serde_json::Value) -> Option<&ChoiceOption> {
        self.options.iter().find(|o| &o.value == value)
    }

    pub fn subfield(&self, id: &str) -> Option<&FieldSpec> {
        self.subfields.iter().find(|f| f.id == id)
    }
}

/// Predicate guarding a transition: exact equality on one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionPredicate {
    pub field_id: String,
    pub equals: serde_json::Value,
}

/// An edge to another step. `predicate == None` marks the default rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<TransitionPredicate>,
    pub target: String,
}

impl Transition {
    pub fn when(field_id: &str, equals: serde_json::Value, target: &str) -> Self {
        Transition {
            predicate: Some(TransitionPredicate {
                field_id: field_id.to_string(),
                equals,
            }),
            target: target.to_string(),
        }
    }

    pub fn otherwise(target: &str) -> Self {
        Transition {
            predicate: None,
            target: target.to_string(),
        }
    }
}

/// A node of the protocol graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub kind: StepKind,
    pub label: String,
    /// Display/fill order.
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// First match wins.
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl Step {
    pub fn field(&self, id: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// The unconditioned fallback transition, if declared.
    pub fn default_transition(&self) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.predicate.is_none())
    }

    /// A step without transitions ends the protocol.
    pub fn is_terminal(&self) -> bool {
        self.transitions.is_empty()
    }
}

/// Immutable, validated protocol definition.
#[derive(Debug, Clone)]
pub struct ProtocolGraph {
    id: String,
    title: String,
    description: String,
    initial_step_id: String,
    /// Declaration order is preserved.
    steps: Vec<Step>,
    step_index: HashMap<String, usize>,
    /// Top-level field id -> index of the first step declaring it.
    field_owners: HashMap<String, usize>,
}

impl ProtocolGraph {
    /// Validate and build a graph. Fails with `GraphIntegrity` listing every
    /// structural violation found.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        initial_step_id: impl Into<String>,
        steps: Vec<Step>,
    ) -> Result<Self, GraphError> {
        let id = id.into();
        let initial_step_id = initial_step_id.into();

        let violations = validate::validate_steps(&initial_step_id, &steps);
        if !violations.is_empty() {
            return Err(GraphError::integrity(&id, violations));
        }

        let step_index = steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();

        let mut field_owners = HashMap::new();
        for (i, step) in steps.iter().enumerate() {
            for field in &step.fields {
                field_owners.entry(field.id.clone()).or_insert(i);
            }
        }

        Ok(ProtocolGraph {
            id,
            title: title.into(),
            description: description.into(),
            initial_step_id,
            steps,
            step_index,
            field_owners,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn initial_step_id(&self) -> &str {
        &self.initial_step_id
    }

    /// The declared initial step.
    pub fn initial_step(&self) -> Result<&Step, GraphError> {
        self.step(&self.initial_step_id).ok_or_else(|| {
            GraphError::integrity(
                &self.id,
                vec![crate::error::Violation::new(
                    None,
                    "initialStep",
                    format!("initial step '{}' is not declared", self.initial_step_id),
                )],
            )
        })
    }

    /// Step by id, or `UnknownStep`.
    pub fn step_by_id(&self, id: &str) -> Result<&Step, GraphError> {
        self.step(id).ok_or_else(|| GraphError::UnknownStep {
            graph_id: self.id.clone(),
            step_id: id.to_string(),
        })
    }

    /// Step by id, if declared.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.step_index.get(id).map(|&i| &self.steps[i])
    }

    /// Steps in declaration order.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The first step (in declaration order) declaring a top-level field.
    pub fn field_owner(&self, field_id: &str) -> Option<&Step> {
        self.field_owners.get(field_id).map(|&i| &self.steps[i])
    }

    /// Field of a step, if both exist.
    pub fn field(&self, step_id: &str, field_id: &str) -> Option<&FieldSpec> {
        self.step(step_id).and_then(|s| s.field(field_id))
    }

    pub fn field_count(&self) -> usize {
        self.steps.iter().map(|s| s.fields.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(id: &str, transitions: Vec<Transition>) -> Step {
        Step {
            id: id.to_string(),
            kind: StepKind::Info,
            label: id.to_string(),
            fields: vec![],
            transitions,
        }
    }

    fn choice(id: &str, values: &[&str]) -> FieldSpec {
        FieldSpec {
            id: id.to_string(),
            label: id.to_string(),
            field_type: FieldType::SingleChoice,
            options: values
                .iter()
                .map(|v| ChoiceOption {
                    label: v.to_string(),
                    value: json!(v),
                    exclusive: false,
                })
                .collect(),
            condition: None,
            subfields: vec![],
        }
    }

    fn two_step_graph() -> ProtocolGraph {
        let first = Step {
            id: "a".to_string(),
            kind: StepKind::Form,
            label: "A".to_string(),
            fields: vec![choice("answer", &["yes", "no"])],
            transitions: vec![Transition::otherwise("b")],
        };
        ProtocolGraph::new("g", "Graph", "", "a", vec![first, info("b", vec![])]).unwrap()
    }

    #[test]
    fn step_by_id_finds_declared_steps() {
        let graph = two_step_graph();
        assert_eq!(graph.step_by_id("b").unwrap().kind, StepKind::Info);
        assert_eq!(graph.initial_step().unwrap().id, "a");
    }

    #[test]
    fn step_by_id_unknown_fails() {
        let graph = two_step_graph();
        let err = graph.step_by_id("zzz").unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownStep {
                graph_id: "g".to_string(),
                step_id: "zzz".to_string()
            }
        );
    }

    #[test]
    fn field_owner_points_at_declaring_step() {
        let graph = two_step_graph();
        assert_eq!(graph.field_owner("answer").unwrap().id, "a");
        assert!(graph.field_owner("missing").is_none());
        assert_eq!(graph.field_count(), 1);
    }

    #[test]
    fn terminal_step_has_no_transitions() {
        let graph = two_step_graph();
        assert!(graph.step("b").unwrap().is_terminal());
        assert!(!graph.step("a").unwrap().is_terminal());
    }

    #[test]
    fn field_type_names_round_trip() {
        for t in [
            FieldType::Text,
            FieldType::Number,
            FieldType::Date,
            FieldType::Time,
            FieldType::SingleChoice,
            FieldType::MultipleChoice,
            FieldType::Group,
        ] {
            assert_eq!(FieldType::parse(t.as_str()), Some(t));
        }
        assert_eq!(FieldType::parse("slider"), None);
    }
}
