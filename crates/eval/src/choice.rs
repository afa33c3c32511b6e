//! Multiple-choice selection rules.

use pathway_core::FieldSpec;
use serde_json::Value;

/// Reconcile a new multiple-choice selection with the previous one.
///
/// Newly selecting an exclusive option (e.g. "none of the above") leaves
/// only that option selected. Newly selecting any other option drops the
/// exclusive ones. Removals pass through untouched. Duplicates are removed,
/// first occurrence kept.
pub fn normalize_selection(field: &FieldSpec, previous: &[Value], next: &[Value]) -> Vec<Value> {
    let mut selection: Vec<Value> = Vec::with_capacity(next.len());
    for v in next {
        if !selection.contains(v) {
            selection.push(v.clone());
        }
    }

    let added: Vec<&Value> = selection.iter().filter(|v| !previous.contains(v)).collect();

    if let Some(exclusive) = added.iter().rev().find(|v| is_exclusive(field, v)) {
        return vec![(*exclusive).clone()];
    }
    if !added.is_empty() {
        selection.retain(|v| !is_exclusive(field, v));
    }
    selection
}

fn is_exclusive(field: &FieldSpec, value: &Value) -> bool {
    field.option(value).is_some_and(|o| o.exclusive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathway_core::{ChoiceOption, FieldType};
    use serde_json::json;

    fn risk_factors() -> FieldSpec {
        let option = |v: &str, exclusive: bool| ChoiceOption {
            label: v.to_string(),
            value: json!(v),
            exclusive,
        };
        FieldSpec {
            id: "fatores".to_string(),
            label: "Fatores de risco".to_string(),
            field_type: FieldType::MultipleChoice,
            options: vec![
                option("has", false),
                option("dm", false),
                option("nenhuma", true),
            ],
            condition: None,
            subfields: vec![],
        }
    }

    #[test]
    fn exclusive_option_clears_others() {
        let f = risk_factors();
        let out = normalize_selection(
            &f,
            &[json!("has"), json!("dm")],
            &[json!("has"), json!("dm"), json!("nenhuma")],
        );
        assert_eq!(out, vec![json!("nenhuma")]);
    }

    #[test]
    fn regular_option_clears_exclusive() {
        let f = risk_factors();
        let out = normalize_selection(&f, &[json!("nenhuma")], &[json!("nenhuma"), json!("dm")]);
        assert_eq!(out, vec![json!("dm")]);
    }

    #[test]
    fn removal_and_duplicates() {
        let f = risk_factors();
        let out = normalize_selection(&f, &[json!("has"), json!("dm")], &[json!("dm"), json!("dm")]);
        assert_eq!(out, vec![json!("dm")]);
    }
}
