//! Deserialization from protocol definition JSON into typed structs.
//!
//! The main entry point is [`from_document`], which takes a
//! `&serde_json::Value` and produces a [`DefinitionDocument`].
//!
//! Two document shapes are accepted: a stored definition
//! (`{ id, title, description, structureJson: { initialStep, steps } }`)
//! and the bare structure (`{ initialStep, steps }`).

use crate::types::*;
use std::fmt;

/// Errors during definition document deserialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    /// The document is missing a required top-level field.
    MissingField { field: String },
    /// A step or field declaration is malformed.
    DeclarationError {
        kind: String,
        id: String,
        message: String,
    },
    /// The document structure is invalid.
    InvalidDocument(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::MissingField { field } => {
                write!(f, "definition missing required field: '{}'", field)
            }
            InterchangeError::DeclarationError { kind, id, message } => {
                write!(f, "{} '{}': {}", kind, id, message)
            }
            InterchangeError::InvalidDocument(msg) => {
                write!(f, "invalid definition: {}", msg)
            }
        }
    }
}

impl std::error::Error for InterchangeError {}

/// Field type strings that may appear as a step `type`. Such a step is
/// lifted into a form step holding a single field of that type.
const LIFTABLE_FIELD_TYPES: &[&str] = &[
    "text",
    "number",
    "date",
    "time",
    "singleChoice",
    "multipleChoice",
];

/// Deserialize a protocol definition document into typed structs.
pub fn from_document(doc: &serde_json::Value) -> Result<DefinitionDocument, InterchangeError> {
    if !doc.is_object() {
        return Err(InterchangeError::InvalidDocument(
            "document must be a JSON object".to_string(),
        ));
    }

    let id = doc.get("id").and_then(scalar_to_string);
    let title = optional_str(doc, "title").unwrap_or_default();
    let description = optional_str(doc, "description").unwrap_or_default();

    // Stored definitions may carry the structure as an embedded JSON string.
    let embedded: serde_json::Value;
    let structure = match doc.get("structureJson") {
        Some(serde_json::Value::String(raw)) => {
            embedded = serde_json::from_str(raw).map_err(|e| {
                InterchangeError::InvalidDocument(format!("structureJson: {}", e))
            })?;
            &embedded
        }
        Some(structure) => structure,
        None => doc,
    };

    let initial_step = structure
        .get("initialStep")
        .and_then(|v| v.as_str())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "initialStep".to_string(),
        })?
        .to_string();

    let steps_arr = structure
        .get("steps")
        .and_then(|s| s.as_array())
        .ok_or_else(|| InterchangeError::MissingField {
            field: "steps".to_string(),
        })?;

    let steps = steps_arr
        .iter()
        .map(parse_step)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DefinitionDocument {
        id,
        title,
        description,
        initial_step,
        steps,
    })
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_str(obj: &serde_json::Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn required_str(
    obj: &serde_json::Value,
    field: &str,
    kind: &str,
    id: &str,
) -> Result<String, InterchangeError> {
    optional_str(obj, field).ok_or_else(|| InterchangeError::DeclarationError {
        kind: kind.to_string(),
        id: id.to_string(),
        message: format!("missing '{}' field", field),
    })
}

fn declaration_id(obj: &serde_json::Value, kind: &str) -> Result<String, InterchangeError> {
    optional_str(obj, "id").ok_or_else(|| {
        InterchangeError::InvalidDocument(format!("{} declaration without an 'id'", kind))
    })
}

fn parse_step(obj: &serde_json::Value) -> Result<StepDecl, InterchangeError> {
    let id = declaration_id(obj, "step")?;
    let kind = required_str(obj, "type", "step", &id)?;
    let label = optional_str(obj, "label").unwrap_or_default();
    let navigation = parse_navigation(obj, &id)?;

    match kind.as_str() {
        STEP_KIND_FORM | STEP_KIND_INFO => {
            let fields = parse_fields(obj, "step", &id)?;
            Ok(StepDecl {
                id,
                kind,
                label,
                fields,
                navigation,
            })
        }
        other if LIFTABLE_FIELD_TYPES.contains(&other) => {
            // Step declared as a bare field: capture it as a one-field form.
            let field = FieldDecl {
                id: id.clone(),
                label: label.clone(),
                field_type: other.to_string(),
                options: parse_options(obj, &id)?,
                condition: None,
                fields: Vec::new(),
            };
            Ok(StepDecl {
                id,
                kind: STEP_KIND_FORM.to_string(),
                label,
                fields: vec![field],
                navigation,
            })
        }
        other => Err(InterchangeError::DeclarationError {
            kind: "step".to_string(),
            id,
            message: format!("unknown step type '{}'", other),
        }),
    }
}

fn parse_fields(
    obj: &serde_json::Value,
    owner_kind: &str,
    owner_id: &str,
) -> Result<Vec<FieldDecl>, InterchangeError> {
    match obj.get("fields") {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::Array(arr)) => arr.iter().map(parse_field).collect(),
        Some(_) => Err(InterchangeError::DeclarationError {
            kind: owner_kind.to_string(),
            id: owner_id.to_string(),
            message: "'fields' must be an array".to_string(),
        }),
    }
}

fn parse_field(obj: &serde_json::Value) -> Result<FieldDecl, InterchangeError> {
    let id = declaration_id(obj, "field")?;
    let label = optional_str(obj, "label").unwrap_or_default();
    let field_type = required_str(obj, "type", "field", &id)?;
    let options = parse_options(obj, &id)?;
    let condition = match obj.get("condition") {
        None | Some(serde_json::Value::Null) => None,
        Some(c) => Some(parse_condition(c, &id)?),
    };
    let fields = parse_fields(obj, "field", &id)?;

    Ok(FieldDecl {
        id,
        label,
        field_type,
        options,
        condition,
        fields,
    })
}

fn parse_options(obj: &serde_json::Value, owner_id: &str) -> Result<Vec<OptionDecl>, InterchangeError> {
    let arr = match obj.get("options") {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(arr)) => arr,
        Some(_) => {
            return Err(InterchangeError::DeclarationError {
                kind: "field".to_string(),
                id: owner_id.to_string(),
                message: "'options' must be an array".to_string(),
            })
        }
    };

    arr.iter()
        .map(|opt| match opt {
            serde_json::Value::String(s) => Ok(OptionDecl {
                label: s.clone(),
                value: serde_json::Value::String(s.clone()),
                exclusive: false,
            }),
            serde_json::Value::Object(_) => {
                let value = opt.get("value").cloned().ok_or_else(|| {
                    InterchangeError::DeclarationError {
                        kind: "field".to_string(),
                        id: owner_id.to_string(),
                        message: "option object without a 'value'".to_string(),
                    }
                })?;
                let label = optional_str(opt, "label")
                    .or_else(|| scalar_to_string(&value))
                    .unwrap_or_default();
                let exclusive = opt
                    .get("exclusive")
                    .and_then(|e| e.as_bool())
                    .unwrap_or(false);
                Ok(OptionDecl {
                    label,
                    value,
                    exclusive,
                })
            }
            _ => Err(InterchangeError::DeclarationError {
                kind: "field".to_string(),
                id: owner_id.to_string(),
                message: "option must be a string or an object".to_string(),
            }),
        })
        .collect()
}

fn parse_condition(c: &serde_json::Value, field_id: &str) -> Result<ConditionDecl, InterchangeError> {
    let field = required_str(c, "field", "field condition", field_id)?;
    let value = match c.get("value") {
        Some(serde_json::Value::Array(values)) => ConditionValueDecl::AnyOf(values.clone()),
        Some(v) => ConditionValueDecl::Single(v.clone()),
        None => {
            return Err(InterchangeError::DeclarationError {
                kind: "field condition".to_string(),
                id: field_id.to_string(),
                message: "missing 'value' field".to_string(),
            })
        }
    };
    Ok(ConditionDecl { field, value })
}

fn parse_navigation(
    obj: &serde_json::Value,
    step_id: &str,
) -> Result<Vec<NavigationDecl>, InterchangeError> {
    let arr = match obj.get("navigation") {
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(serde_json::Value::Array(arr)) => arr,
        Some(_) => {
            return Err(InterchangeError::DeclarationError {
                kind: "step".to_string(),
                id: step_id.to_string(),
                message: "'navigation' must be an array".to_string(),
            })
        }
    };

    arr.iter()
        .map(|nav| {
            let go_to = required_str(nav, "goTo", "step navigation", step_id)?;
            let field = optional_str(nav, "field");
            let on_value = nav.get("onValue").filter(|v| !v.is_null()).cloned();
            if field.is_some() != on_value.is_some() {
                return Err(InterchangeError::DeclarationError {
                    kind: "step navigation".to_string(),
                    id: step_id.to_string(),
                    message: format!(
                        "rule to '{}' must declare both 'field' and 'onValue' or neither",
                        go_to
                    ),
                });
            }
            Ok(NavigationDecl {
                go_to,
                field,
                on_value,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_stored_definition_with_structure_json() {
        let doc = json!({
            "id": 7,
            "title": "Protocolo de Dor Torácica",
            "description": "Dor torácica aguda",
            "structureJson": {
                "initialStep": "s1",
                "steps": [
                    {
                        "id": "s1",
                        "type": "form",
                        "label": "Identificação",
                        "fields": [
                            { "id": "sexo", "label": "Sexo", "type": "singleChoice", "options": ["Masculino", "Feminino"] }
                        ],
                        "navigation": [{ "goTo": "s2" }]
                    },
                    { "id": "s2", "type": "info", "label": "Fim", "navigation": [] }
                ]
            }
        });

        let def = from_document(&doc).unwrap();
        assert_eq!(def.id.as_deref(), Some("7"));
        assert_eq!(def.title, "Protocolo de Dor Torácica");
        assert_eq!(def.initial_step, "s1");
        assert_eq!(def.steps.len(), 2);
        let sexo = &def.steps[0].fields[0];
        assert_eq!(sexo.options[1].label, "Feminino");
        assert_eq!(sexo.options[1].value, json!("Feminino"));
        assert!(def.steps[0].navigation[0].is_default());
        assert!(def.steps[1].fields.is_empty());
    }

    #[test]
    fn parses_bare_structure_without_id() {
        let doc = json!({
            "initialStep": "only",
            "steps": [{ "id": "only", "type": "info", "label": "x" }]
        });
        let def = from_document(&doc).unwrap();
        assert_eq!(def.id, None);
        assert!(def.steps[0].navigation.is_empty());
    }

    #[test]
    fn object_options_keep_exclusive_flag() {
        let doc = json!({
            "initialStep": "s",
            "steps": [{
                "id": "s", "type": "form", "label": "Fatores",
                "fields": [{
                    "id": "fatores", "label": "Fatores", "type": "multipleChoice",
                    "options": [
                        { "label": "Nega fatores de risco", "value": "nega_risco", "exclusive": true },
                        { "label": "Diabetes", "value": "diabetes" }
                    ]
                }]
            }]
        });
        let def = from_document(&doc).unwrap();
        let opts = &def.steps[0].fields[0].options;
        assert!(opts[0].exclusive);
        assert!(!opts[1].exclusive);
        assert_eq!(opts[1].value, json!("diabetes"));
    }

    #[test]
    fn condition_array_becomes_any_of() {
        let doc = json!({
            "initialStep": "s",
            "steps": [{
                "id": "s", "type": "form", "label": "",
                "fields": [
                    { "id": "a", "label": "", "type": "singleChoice", "options": ["x", "y", "z"] },
                    { "id": "b", "label": "", "type": "text", "condition": { "field": "a", "value": ["x", "y"] } },
                    { "id": "c", "label": "", "type": "text", "condition": { "field": "a", "value": "z" } }
                ]
            }]
        });
        let def = from_document(&doc).unwrap();
        let fields = &def.steps[0].fields;
        assert_eq!(
            fields[1].condition.as_ref().unwrap().value,
            ConditionValueDecl::AnyOf(vec![json!("x"), json!("y")])
        );
        assert_eq!(
            fields[2].condition.as_ref().unwrap().value,
            ConditionValueDecl::Single(json!("z"))
        );
    }

    #[test]
    fn step_typed_as_field_is_lifted_into_form() {
        let doc = json!({
            "initialStep": "step_22_complicacoes",
            "steps": [{
                "id": "step_22_complicacoes",
                "type": "multipleChoice",
                "label": "Complicações",
                "options": [
                    { "label": "Nenhuma", "value": "nenhuma", "exclusive": true },
                    { "label": "TV/FV", "value": "tv_fv" }
                ],
                "navigation": []
            }]
        });
        let def = from_document(&doc).unwrap();
        let step = &def.steps[0];
        assert_eq!(step.kind, STEP_KIND_FORM);
        assert_eq!(step.fields.len(), 1);
        assert_eq!(step.fields[0].id, "step_22_complicacoes");
        assert_eq!(step.fields[0].field_type, "multipleChoice");
        assert_eq!(step.fields[0].options.len(), 2);
    }

    #[test]
    fn half_declared_navigation_predicate_is_rejected() {
        let doc = json!({
            "initialStep": "s",
            "steps": [{
                "id": "s", "type": "form", "label": "",
                "navigation": [{ "field": "a", "goTo": "t" }]
            }]
        });
        let err = from_document(&doc).unwrap_err();
        assert!(matches!(err, InterchangeError::DeclarationError { .. }));
    }

    #[test]
    fn missing_initial_step_is_reported() {
        let err = from_document(&json!({ "steps": [] })).unwrap_err();
        assert_eq!(
            err,
            InterchangeError::MissingField {
                field: "initialStep".to_string()
            }
        );
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let doc = json!({
            "initialStep": "s",
            "steps": [{ "id": "s", "type": "wizard", "label": "" }]
        });
        let err = from_document(&doc).unwrap_err();
        assert!(err.to_string().contains("unknown step type 'wizard'"));
    }

    #[test]
    fn structure_json_may_be_an_embedded_string() {
        let structure = json!({
            "initialStep": "s1",
            "steps": [{ "id": "s1", "type": "info", "label": "Fim" }]
        });
        let doc = json!({ "id": "p", "structureJson": structure.to_string() });
        let def = from_document(&doc).unwrap();
        assert_eq!(def.initial_step, "s1");

        let broken = json!({ "id": "p", "structureJson": "{not json" });
        let err = from_document(&broken).unwrap_err();
        assert!(err.to_string().contains("structureJson"));
    }
}
