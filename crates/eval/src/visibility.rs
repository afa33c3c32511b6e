//! Field visibility.
//!
//! A field with a condition is shown only while its governing field holds
//! the matching value; an unanswered governing field hides it. Visibility
//! also decides which captured values count as meaningfully submitted:
//! [`evaluate_step`] walks a step's fields in order and drops values of
//! hidden fields, so a field hidden by a hidden field is hidden too.

use std::collections::{BTreeMap, HashMap};

use pathway_core::{ConditionMatch, FieldSpec, FieldType, ProtocolGraph, Step};
use serde_json::{Map, Value};

/// Values captured for one step: field id to value.
pub type StepValues = Map<String, Value>;

/// Read access to captured values by field id.
pub trait FieldLookup {
    fn lookup(&self, field_id: &str) -> Option<&Value>;
}

impl FieldLookup for Map<String, Value> {
    fn lookup(&self, field_id: &str) -> Option<&Value> {
        self.get(field_id)
    }
}

/// Non-object values have no fields.
impl FieldLookup for Value {
    fn lookup(&self, field_id: &str) -> Option<&Value> {
        self.as_object().and_then(|m| m.get(field_id))
    }
}

impl FieldLookup for BTreeMap<String, Value> {
    fn lookup(&self, field_id: &str) -> Option<&Value> {
        self.get(field_id)
    }
}

impl FieldLookup for HashMap<String, Value> {
    fn lookup(&self, field_id: &str) -> Option<&Value> {
        self.get(field_id)
    }
}

/// Nothing captured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoValues;

impl FieldLookup for NoValues {
    fn lookup(&self, _field_id: &str) -> Option<&Value> {
        None
    }
}

/// Cross-step lookup over a session's latest snapshots. A field id
/// resolves to the first step, in declaration order, that declares it.
pub struct SessionScope<'a> {
    graph: &'a ProtocolGraph,
    values_by_step: &'a BTreeMap<String, Value>,
}

impl<'a> SessionScope<'a> {
    pub fn new(graph: &'a ProtocolGraph, values_by_step: &'a BTreeMap<String, Value>) -> Self {
        Self {
            graph,
            values_by_step,
        }
    }
}

impl FieldLookup for SessionScope<'_> {
    fn lookup(&self, field_id: &str) -> Option<&Value> {
        let owner = self.graph.field_owner(field_id)?;
        self.values_by_step.get(&owner.id)?.lookup(field_id)
    }
}

/// Fields of the step being evaluated resolve against `local`; anything
/// else falls through to `outer`.
struct StepScope<'a> {
    step: &'a Step,
    local: &'a StepValues,
    outer: &'a dyn FieldLookup,
}

impl FieldLookup for StepScope<'_> {
    fn lookup(&self, field_id: &str) -> Option<&Value> {
        if self.step.field(field_id).is_some() {
            self.local.get(field_id)
        } else {
            self.outer.lookup(field_id)
        }
    }
}

/// Whether `field` is visible given the captured values.
pub fn is_visible<L: FieldLookup + ?Sized>(field: &FieldSpec, captured: &L) -> bool {
    let Some(condition) = &field.condition else {
        return true;
    };
    let Some(value) = captured.lookup(&condition.field_id) else {
        return false;
    };
    match &condition.matches {
        ConditionMatch::Equals(expected) => value == expected,
        ConditionMatch::AnyOf(set) => set.contains(value),
    }
}

/// Visible fields of a step and the values that survive gating.
#[derive(Debug, Clone, PartialEq)]
pub struct StepVisibility<'g> {
    pub fields: Vec<&'g FieldSpec>,
    pub values: StepValues,
}

impl StepVisibility<'_> {
    pub fn field_ids(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.id.clone()).collect()
    }
}

/// Evaluate visibility for every field of `step`, in display order.
///
/// Conditions on fields of this step read the already-gated values of
/// earlier fields; conditions on other steps' fields go through `outer`.
/// Values whose key is not a declared field are dropped.
pub fn evaluate_step<'g>(
    step: &'g Step,
    raw: &StepValues,
    outer: &dyn FieldLookup,
) -> StepVisibility<'g> {
    let mut fields = Vec::new();
    let mut values = StepValues::new();

    for field in &step.fields {
        let visible = {
            let scope = StepScope {
                step,
                local: &values,
                outer,
            };
            is_visible(field, &scope)
        };
        if !visible {
            continue;
        }
        fields.push(field);
        if let Some(value) = raw.get(&field.id) {
            values.insert(field.id.clone(), gate_value(field, value));
        }
    }

    StepVisibility { fields, values }
}

/// Visible fields only.
pub fn visible_fields<'g>(
    step: &'g Step,
    raw: &StepValues,
    outer: &dyn FieldLookup,
) -> Vec<&'g FieldSpec> {
    evaluate_step(step, raw, outer).fields
}

/// Values of visible fields only.
pub fn effective_values(step: &Step, raw: &StepValues, outer: &dyn FieldLookup) -> StepValues {
    evaluate_step(step, raw, outer).values
}

/// Group values are gated sub-field by sub-field against their siblings.
fn gate_value(field: &FieldSpec, value: &Value) -> Value {
    if field.field_type != FieldType::Group {
        return value.clone();
    }
    let Some(raw) = value.as_object() else {
        return value.clone();
    };
    let mut gated = Map::new();
    for sub in &field.subfields {
        if !is_visible(sub, &gated) {
            continue;
        }
        if let Some(v) = raw.get(&sub.id) {
            gated.insert(sub.id.clone(), v.clone());
        }
    }
    Value::Object(gated)
}
