//! Load-time structural validation of a protocol graph.
//!
//! Every check runs and every violation is collected, so a definition
//! author sees all problems at once. An empty result means the steps form
//! a well-formed graph.

use std::collections::HashSet;

use crate::error::Violation;
use crate::graph::{FieldSpec, FieldType, Step, StepKind};

pub(crate) fn validate_steps(initial_step_id: &str, steps: &[Step]) -> Vec<Violation> {
    let mut violations = Vec::new();

    let mut step_ids = HashSet::new();
    for step in steps {
        if !step_ids.insert(step.id.as_str()) {
            violations.push(Violation::new(
                Some(&step.id),
                format!("steps.{}", step.id),
                format!("step id '{}' is declared more than once", step.id),
            ));
        }
    }

    if !step_ids.contains(initial_step_id) {
        violations.push(Violation::new(
            None,
            "initialStep",
            format!("initial step '{}' is not declared", initial_step_id),
        ));
    }

    // Top-level field ids of every step declared before the one being checked.
    let mut earlier_fields: HashSet<&str> = HashSet::new();

    for step in steps {
        validate_fields(step, &earlier_fields, &mut violations);
        validate_transitions(step, &step_ids, &mut violations);
        earlier_fields.extend(step.fields.iter().map(|f| f.id.as_str()));
    }

    violations
}

fn validate_fields(step: &Step, earlier_fields: &HashSet<&str>, violations: &mut Vec<Violation>) {
    if step.kind == StepKind::Info && !step.fields.is_empty() {
        violations.push(Violation::new(
            Some(&step.id),
            format!("steps.{}.fields", step.id),
            "info steps cannot declare fields",
        ));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for field in &step.fields {
        let path = format!("steps.{}.fields.{}", step.id, field.id);

        if seen.contains(field.id.as_str()) {
            violations.push(Violation::new(
                Some(&step.id),
                &path,
                format!("field id '{}' is declared more than once", field.id),
            ));
        }

        if let Some(cond) = &field.condition {
            let declared_earlier = seen.contains(cond.field_id.as_str())
                || earlier_fields.contains(cond.field_id.as_str());
            if !declared_earlier {
                violations.push(Violation::new(
                    Some(&step.id),
                    format!("{}.condition", path),
                    format!(
                        "condition references '{}', which is not declared earlier in this step or in an earlier step",
                        cond.field_id
                    ),
                ));
            }
        }

        validate_field_shape(&step.id, field, &path, true, violations);
        seen.insert(field.id.as_str());
    }
}

fn validate_field_shape(
    step_id: &str,
    field: &FieldSpec,
    path: &str,
    top_level: bool,
    violations: &mut Vec<Violation>,
) {
    if field.field_type.is_choice() && field.options.is_empty() {
        violations.push(Violation::new(
            Some(step_id),
            path,
            "choice fields must declare at least one option",
        ));
    }

    if field.field_type != FieldType::Group {
        if !field.subfields.is_empty() {
            violations.push(Violation::new(
                Some(step_id),
                path,
                format!("{} fields cannot declare sub-fields", field.field_type.as_str()),
            ));
        }
        return;
    }

    if !top_level {
        violations.push(Violation::new(
            Some(step_id),
            path,
            "groups nest only one level",
        ));
        return;
    }

    if field.subfields.is_empty() {
        violations.push(Violation::new(
            Some(step_id),
            path,
            "group fields must declare at least one sub-field",
        ));
    }

    let mut siblings: HashSet<&str> = HashSet::new();
    for sub in &field.subfields {
        let sub_path = format!("{}.{}", path, sub.id);
        if siblings.contains(sub.id.as_str()) {
            violations.push(Violation::new(
                Some(step_id),
                &sub_path,
                format!("sub-field id '{}' is declared more than once", sub.id),
            ));
        }
        if let Some(cond) = &sub.condition {
            if !siblings.contains(cond.field_id.as_str()) {
                violations.push(Violation::new(
                    Some(step_id),
                    format!("{}.condition", sub_path),
                    format!(
                        "condition references '{}', which is not an earlier sub-field of '{}'",
                        cond.field_id, field.id
                    ),
                ));
            }
        }
        validate_field_shape(step_id, sub, &sub_path, false, violations);
        siblings.insert(sub.id.as_str());
    }
}

fn validate_transitions(step: &Step, step_ids: &HashSet<&str>, violations: &mut Vec<Violation>) {
    let last = step.transitions.len().saturating_sub(1);
    let mut defaults = 0usize;

    for (i, transition) in step.transitions.iter().enumerate() {
        let path = format!("steps.{}.transitions[{}]", step.id, i);

        if !step_ids.contains(transition.target.as_str()) {
            violations.push(Violation::new(
                Some(&step.id),
                &path,
                format!("target step '{}' is not declared", transition.target),
            ));
        }

        match &transition.predicate {
            None => {
                defaults += 1;
                if defaults > 1 {
                    violations.push(Violation::new(
                        Some(&step.id),
                        &path,
                        "at most one unconditioned transition is allowed per step",
                    ));
                } else if i != last {
                    violations.push(Violation::new(
                        Some(&step.id),
                        &path,
                        "the unconditioned transition must be the last one",
                    ));
                }
            }
            Some(pred) => {
                if step.field(&pred.field_id).is_none() {
                    violations.push(Violation::new(
                        Some(&step.id),
                        &path,
                        format!(
                            "predicate references '{}', which is not a field of this step",
                            pred.field_id
                        ),
                    ));
                }
            }
        }
    }
}
