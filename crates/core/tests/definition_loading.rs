//! Loads the chest-pain triage definition shipped under `fixtures/` and
//! checks the graph the loader produces from it.

use pathway_core::{from_json, ConditionMatch, FieldType, GraphError, StepKind};
use serde_json::json;

static DOR_TORACICA: &str = include_str!("../../../fixtures/dor_toracica.json");

fn fixture() -> serde_json::Value {
    serde_json::from_str(DOR_TORACICA).expect("fixture is valid JSON")
}

#[test]
fn chest_pain_protocol_loads() {
    let graph = from_json(&fixture(), None).unwrap();
    assert_eq!(graph.id(), "dor_toracica");
    assert_eq!(graph.initial_step_id(), "step_1_identificacao");
    assert_eq!(graph.steps().len(), 33);
    assert_eq!(graph.steps()[0].id, "step_1_identificacao");
    assert_eq!(graph.step("step_final").unwrap().kind, StepKind::Info);
}

#[test]
fn ecg_step_branches_in_declared_order() {
    let graph = from_json(&fixture(), None).unwrap();
    let step = graph.step_by_id("step_7_ecg_avaliacao").unwrap();
    let targets: Vec<&str> = step.transitions.iter().map(|t| t.target.as_str()).collect();
    assert_eq!(
        targets,
        vec![
            "step_8_rota1_start",
            "step_8_rota1_start",
            "step_11_coleta_troponina"
        ]
    );
    assert!(step.default_transition().is_none());
}

#[test]
fn conditions_keep_scalar_and_set_forms() {
    let graph = from_json(&fixture(), None).unwrap();

    let parede = graph.field("step_7_ecg_avaliacao", "supra_parede").unwrap();
    let cond = parede.condition.as_ref().unwrap();
    assert_eq!(cond.field_id, "ecg_resultado");
    assert_eq!(cond.matches, ConditionMatch::Equals(json!("IAM com SUPRA ST")));

    let momento = graph
        .field("step_10_antiagregante", "momento_administracao")
        .unwrap();
    match &momento.condition.as_ref().unwrap().matches {
        ConditionMatch::AnyOf(values) => assert_eq!(values.len(), 3),
        other => panic!("expected AnyOf, got {:?}", other),
    }
}

#[test]
fn troponin_samples_are_groups() {
    let graph = from_json(&fixture(), None).unwrap();
    let sample = graph
        .field("step_11_coleta_troponina", "troponina_1")
        .unwrap();
    assert_eq!(sample.field_type, FieldType::Group);
    assert_eq!(sample.subfields.len(), 5);
    assert_eq!(
        sample.subfield("troponina_1_valor").unwrap().field_type,
        FieldType::Number
    );
}

#[test]
fn complications_step_is_lifted_into_a_form() {
    let graph = from_json(&fixture(), None).unwrap();
    let step = graph.step_by_id("step_22_complicacoes").unwrap();
    assert_eq!(step.kind, StepKind::Form);
    let field = step.field("step_22_complicacoes").unwrap();
    assert_eq!(field.field_type, FieldType::MultipleChoice);
    assert!(field.option(&json!("nenhuma")).unwrap().exclusive);
}

#[test]
fn breaking_a_target_prevents_loading() {
    let mut doc = fixture();
    doc["structureJson"]["steps"][0]["navigation"][0]["goTo"] = json!("step_99_inexistente");
    match from_json(&doc, None) {
        Err(GraphError::GraphIntegrity { violations, .. }) => {
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].step_id.as_deref(), Some("step_1_identificacao"));
        }
        other => panic!("expected GraphIntegrity, got ok={}", other.is_ok()),
    }
}
