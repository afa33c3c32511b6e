//! End-to-end behaviour of the interpreter on the chest-pain protocol.

mod common;

use std::sync::Arc;

use common::{harness, Harness};
use pathway_eval::{
    evaluate_step, next_step, reconstruct, resume, NoValues, ProtocolSession, SessionError,
    StepValues,
};
use serde_json::{json, Value};
use time::Duration;

fn values(v: Value) -> StepValues {
    v.as_object().cloned().unwrap_or_default()
}

async fn new_instance(h: &Harness) -> pathway_storage::InstanceRecord {
    h.lifecycle
        .create(h.graph.id(), "ATD-2025-0042")
        .await
        .unwrap()
}

// ── Pure evaluators on the real definition ──────────────────────────────────

#[test]
fn ecg_result_routes_to_treatment_or_troponin() {
    let h = harness();
    let step = h.graph.step("step_7_ecg_avaliacao").unwrap();
    assert_eq!(
        next_step(step, &values(json!({"ecg_resultado": "Outro"}))),
        Some("step_11_coleta_troponina")
    );
    assert_eq!(
        next_step(step, &values(json!({"ecg_resultado": "IAM com SUPRA ST"}))),
        Some("step_8_rota1_start")
    );
    assert_eq!(
        next_step(step, &values(json!({"ecg_resultado": "BRE Novo"}))),
        Some("step_8_rota1_start")
    );
    // No default rule on this step.
    assert_eq!(next_step(step, &NoValues), None);
}

#[test]
fn echo_details_follow_eco_realizado() {
    let h = harness();
    let step = h.graph.step("step_19_ecocardiograma").unwrap();
    let details = ["fracao_ejecao", "metodo_fracao_ejecao", "nova_alteracao_segmentar"];

    let hidden = evaluate_step(step, &values(json!({})), &NoValues);
    assert_eq!(hidden.field_ids(), vec!["eco_realizado"]);

    let not_done = evaluate_step(
        step,
        &values(json!({"eco_realizado": "Não realizado", "fracao_ejecao": 55})),
        &NoValues,
    );
    assert_eq!(not_done.field_ids(), vec!["eco_realizado"]);
    assert!(!not_done.values.contains_key("fracao_ejecao"));

    let done = evaluate_step(step, &values(json!({"eco_realizado": "Sim"})), &NoValues);
    let ids = done.field_ids();
    for d in details {
        assert!(ids.iter().any(|id| id == d), "{d} should be visible");
    }
}

#[test]
fn value_set_condition_on_antiplatelet_timing() {
    let h = harness();
    let step = h.graph.step("step_10_antiagregante").unwrap();
    let shown = evaluate_step(step, &values(json!({"antiagregante": "Ticagrelor 180mg"})), &NoValues);
    assert!(shown.field_ids().contains(&"momento_administracao".to_string()));
    let hidden = evaluate_step(step, &values(json!({"antiagregante": "Não administrado"})), &NoValues);
    assert!(!hidden.field_ids().contains(&"momento_administracao".to_string()));
}

// ── Session log ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_instance_resumes_at_initial_step() {
    let h = harness();
    let instance = new_instance(&h).await;
    let point = resume(&h.log, &h.graph, &instance.id).await.unwrap();
    assert_eq!(point.current_step_id, h.graph.initial_step_id());
    assert!(point.values_by_step.is_empty());
}

#[tokio::test]
async fn later_author_wins_but_both_entries_kept() {
    let h = harness();
    let instance = new_instance(&h).await;

    h.log
        .append(&instance.id, "step_A", "author1", json!({"x": 1}))
        .await
        .unwrap();
    h.clock.advance(Duration::seconds(30));
    h.log
        .append(&instance.id, "step_A", "author2", json!({"x": 2}))
        .await
        .unwrap();

    let latest = h.log.latest_per_step(&instance.id).await.unwrap();
    assert_eq!(latest["step_A"], json!({"x": 2}));

    let entries = h.log.entries_for(&instance.id).await.unwrap();
    let authors: Vec<&str> = entries.iter().map(|e| e.author_id.as_str()).collect();
    assert_eq!(authors, vec!["author1", "author2"]);
    assert_eq!(entries[0].value, json!({"x": 1}));
}

#[tokio::test]
async fn appending_same_snapshot_twice_changes_nothing() {
    let h = harness();
    let instance = new_instance(&h).await;
    let snapshot = json!({"hora_admissao": "13:45"});

    h.log
        .append(&instance.id, "step_2_hora_zero", "u", snapshot.clone())
        .await
        .unwrap();
    let once = h.log.latest_per_step(&instance.id).await.unwrap();
    h.clock.advance(Duration::seconds(1));
    h.log
        .append(&instance.id, "step_2_hora_zero", "u", snapshot)
        .await
        .unwrap();
    let twice = h.log.latest_per_step(&instance.id).await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(h.log.entries_for(&instance.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn append_to_unknown_instance_fails() {
    let h = harness();
    let err = h
        .log
        .append("no-such-instance", "step_1_identificacao", "u", json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownInstance { instance_id } if instance_id == "no-such-instance"));
}

#[tokio::test]
async fn concurrent_appends_to_one_step_are_all_kept() {
    let h = harness();
    let instance = new_instance(&h).await;
    let log = Arc::new(h.log.clone());

    let mut handles = Vec::new();
    for i in 0..8 {
        let log = log.clone();
        let id = instance.id.clone();
        handles.push(tokio::spawn(async move {
            log.append(&id, "step_9_aas", &format!("nurse-{i}"), json!({"aas_200mg": "Sim"}))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let entries = h.log.entries_for(&instance.id).await.unwrap();
    assert_eq!(entries.len(), 8);
    let latest = h.log.latest_per_step(&instance.id).await.unwrap();
    assert_eq!(latest["step_9_aas"], json!({"aas_200mg": "Sim"}));
}

// ── Reconstruction ──────────────────────────────────────────────────────────

#[tokio::test]
async fn resume_matches_fold_and_live_advance() {
    let h = harness();
    let instance = new_instance(&h).await;

    let script = [
        ("step_1_identificacao", json!({"numero_atendimento": "42", "sexo": "Feminino"})),
        ("step_5_avaliacao_dor", json!({"tipo_dor": "A"})),
        ("step_7_ecg_avaliacao", json!({"ecg_resultado": "IAM com SUPRA ST"})),
        ("step_5_avaliacao_dor", json!({"tipo_dor": "B"})),
        ("step_7_ecg_avaliacao", json!({"ecg_resultado": "Outro"})),
    ];

    for (step, value) in script {
        h.clock.advance(Duration::seconds(10));
        h.log.append(&instance.id, step, "u", value).await.unwrap();

        let point = resume(&h.log, &h.graph, &instance.id).await.unwrap();
        let latest = h.log.latest_per_step(&instance.id).await.unwrap();
        assert_eq!(point.values_by_step, latest);

        let last = h.graph.step(step).unwrap();
        let expected = next_step(last, &latest[step]).unwrap_or(step);
        assert_eq!(point.current_step_id, expected);
    }

    let point = resume(&h.log, &h.graph, &instance.id).await.unwrap();
    assert_eq!(point.current_step_id, "step_11_coleta_troponina");
}

#[tokio::test]
async fn backdated_entry_does_not_become_last_touched() {
    let h = harness();
    let instance = new_instance(&h).await;

    h.clock.advance(Duration::minutes(10));
    h.log
        .append(&instance.id, "step_5_avaliacao_dor", "u", json!({"tipo_dor": "D"}))
        .await
        .unwrap();
    // A device with a lagging clock submits afterwards.
    h.clock.advance(Duration::minutes(-5));
    h.log
        .append(&instance.id, "step_2_hora_zero", "u", json!({"hora_admissao": "08:00"}))
        .await
        .unwrap();

    let entries = h.log.entries_for(&instance.id).await.unwrap();
    assert_eq!(entries.last().unwrap().step_id, "step_5_avaliacao_dor");
    let point = reconstruct(&h.graph, &entries);
    assert_eq!(point.current_step_id, "step_end_investigacao_especifica");
}

// ── Interactive sessions ────────────────────────────────────────────────────

#[tokio::test]
async fn walk_branch_go_back_and_resume_elsewhere() {
    let h = harness();
    let instance = new_instance(&h).await;
    let mut session =
        ProtocolSession::start(h.graph.clone(), h.log.clone(), &instance, "dr-ana").unwrap();

    assert_eq!(session.current_step_id(), "step_1_identificacao");
    session
        .edit_field("numero_atendimento", json!("ATD-42"))
        .await
        .unwrap();
    session.edit_field("sexo", json!("Masculino")).await.unwrap();
    for expected in [
        "step_2_hora_zero",
        "step_3_fatores_risco",
        "step_4_comorbidades",
        "step_5_avaliacao_dor",
    ] {
        assert_eq!(session.advance().unwrap().as_deref(), Some(expected));
    }

    session.edit_field("tipo_dor", json!("D")).await.unwrap();
    let view = session.view().unwrap();
    assert_eq!(view.next_step_id.as_deref(), Some("step_end_investigacao_especifica"));
    assert_eq!(view.previous_step_id.as_deref(), Some("step_4_comorbidades"));
    assert_eq!(view.values, values(json!({"tipo_dor": "D"})));

    assert_eq!(
        session.advance().unwrap().as_deref(),
        Some("step_end_investigacao_especifica")
    );
    assert_eq!(session.back().as_deref(), Some("step_5_avaliacao_dor"));
    assert_eq!(session.advance().unwrap().as_deref(), Some("step_end_investigacao_especifica"));
    assert_eq!(session.advance().unwrap().as_deref(), Some("step_final"));
    assert_eq!(session.advance().unwrap(), None);
    assert!(session.view().unwrap().terminal);

    // Another collaborator opens the same instance from the log alone.
    let other = ProtocolSession::resume(h.graph.clone(), h.log.clone(), &instance, "enf-bruno")
        .await
        .unwrap();
    assert_eq!(other.current_step_id(), "step_end_investigacao_especifica");
    assert_eq!(
        other.history(),
        [
            "step_1_identificacao",
            "step_2_hora_zero",
            "step_3_fatores_risco",
            "step_4_comorbidades",
            "step_5_avaliacao_dor",
        ]
    );
    assert_eq!(
        other.values_by_step()["step_1_identificacao"],
        json!({"numero_atendimento": "ATD-42", "sexo": "Masculino"})
    );
}

#[tokio::test]
async fn unanswered_branch_step_holds_position_without_being_terminal() {
    let h = harness();
    let instance = new_instance(&h).await;
    h.log
        .append(&instance.id, "step_6_ecg_hora", "dr-ana", json!({"hora_ecg": "14:10"}))
        .await
        .unwrap();

    let mut session =
        ProtocolSession::resume(h.graph.clone(), h.log.clone(), &instance, "dr-ana")
            .await
            .unwrap();
    assert_eq!(session.current_step_id(), "step_7_ecg_avaliacao");

    // step_7 has no default rule: nothing applies until ecg_resultado is set.
    let view = session.view().unwrap();
    assert_eq!(view.next_step_id, None);
    assert!(!view.terminal);
    assert_eq!(session.advance().unwrap(), None);
    assert_eq!(session.current_step_id(), "step_7_ecg_avaliacao");

    session
        .edit_field("ecg_resultado", json!("Outro"))
        .await
        .unwrap();
    assert_eq!(
        session.view().unwrap().next_step_id.as_deref(),
        Some("step_11_coleta_troponina")
    );
    assert_eq!(
        session.advance().unwrap().as_deref(),
        Some("step_11_coleta_troponina")
    );
}

#[tokio::test]
async fn each_edit_appends_full_step_snapshot() {
    let h = harness();
    let instance = new_instance(&h).await;
    let mut session =
        ProtocolSession::start(h.graph.clone(), h.log.clone(), &instance, "dr-ana").unwrap();

    session.edit_field("peso", json!(80)).await.unwrap();
    session.edit_field("altura", json!(1.75)).await.unwrap();

    let entries = h.log.entries_for(&instance.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].value, json!({"peso": 80}));
    assert_eq!(entries[1].value, json!({"peso": 80, "altura": 1.75}));
    assert_eq!(entries[1].author_id, "dr-ana");
}

#[tokio::test]
async fn refresh_picks_up_other_collaborators() {
    let h = harness();
    let instance = new_instance(&h).await;
    let mut mine = ProtocolSession::start(h.graph.clone(), h.log.clone(), &instance, "a").unwrap();
    let mut theirs =
        ProtocolSession::start(h.graph.clone(), h.log.clone(), &instance, "b").unwrap();

    theirs.edit_field("sexo", json!("Feminino")).await.unwrap();
    assert!(mine.values_by_step().is_empty());

    mine.refresh().await.unwrap();
    assert_eq!(mine.current_step_id(), "step_2_hora_zero");
    assert_eq!(
        mine.values_by_step()["step_1_identificacao"],
        json!({"sexo": "Feminino"})
    );
}

#[tokio::test]
async fn exclusive_complication_option() {
    let h = harness();
    let instance = new_instance(&h).await;
    h.log
        .append(
            &instance.id,
            "step_21_procedimento_invasivo",
            "u",
            json!({"cateterismo_realizado": "Não"}),
        )
        .await
        .unwrap();

    let mut session = ProtocolSession::resume(h.graph.clone(), h.log.clone(), &instance, "u")
        .await
        .unwrap();
    assert_eq!(session.current_step_id(), "step_22_complicacoes");

    let field = "step_22_complicacoes";
    session.edit_field(field, json!(["fa", "civ"])).await.unwrap();
    session
        .edit_field(field, json!(["fa", "civ", "nenhuma"]))
        .await
        .unwrap();
    assert_eq!(session.current_values()[field], json!(["nenhuma"]));

    session
        .edit_field(field, json!(["nenhuma", "sangramento"]))
        .await
        .unwrap();
    assert_eq!(session.current_values()[field], json!(["sangramento"]));

    let err = session.edit_field(field, json!("fa")).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));
}

#[tokio::test]
async fn troponin_group_values_pass_through_view() {
    let h = harness();
    let instance = new_instance(&h).await;
    h.log
        .append(
            &instance.id,
            "step_7_ecg_avaliacao",
            "u",
            json!({"ecg_resultado": "Outro"}),
        )
        .await
        .unwrap();
    let mut session = ProtocolSession::resume(h.graph.clone(), h.log.clone(), &instance, "u")
        .await
        .unwrap();
    assert_eq!(session.current_step_id(), "step_11_coleta_troponina");

    let sample = json!({"troponina_1_valor": 0.04, "troponina_1_unidade": "ng/mL"});
    session.edit_field("troponina_1", sample.clone()).await.unwrap();
    let view = session.view().unwrap();
    assert_eq!(view.values["troponina_1"], sample);
    assert_eq!(view.visible_fields.len(), 3);
    assert_eq!(view.next_step_id.as_deref(), Some("step_12_aas_rota2"));
}

#[tokio::test]
async fn editing_unknown_field_or_info_step_is_invalid_input() {
    let h = harness();
    let instance = new_instance(&h).await;
    let mut session = ProtocolSession::start(h.graph.clone(), h.log.clone(), &instance, "u").unwrap();

    let err = session.edit_field("hora_admissao", json!("10:00")).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));

    h.log
        .append(&instance.id, "step_5_avaliacao_dor", "u", json!({"tipo_dor": "D"}))
        .await
        .unwrap();
    session.refresh().await.unwrap();
    assert_eq!(session.current_step_id(), "step_end_investigacao_especifica");
    let err = session.edit_field("anything", json!(1)).await.unwrap_err();
    assert!(matches!(err, SessionError::InvalidInput(_)));

    // Rejected edits never reach the log.
    assert_eq!(h.log.entries_for(&instance.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn session_rejects_instance_of_another_protocol() {
    let h = harness();
    let other = h.lifecycle.create("sepse", "P-9").await.unwrap();
    let result = ProtocolSession::start(h.graph.clone(), h.log.clone(), &other, "u");
    assert!(matches!(result, Err(SessionError::InvalidInput(_))));
}

#[tokio::test]
async fn resume_on_retired_step_surfaces_unknown_step() {
    let h = harness();
    let instance = new_instance(&h).await;
    h.log
        .append(&instance.id, "step_removed_in_v2", "u", json!({}))
        .await
        .unwrap();

    let point = resume(&h.log, &h.graph, &instance.id).await.unwrap();
    assert_eq!(point.current_step_id, "step_removed_in_v2");

    let session = ProtocolSession::resume(h.graph.clone(), h.log.clone(), &instance, "u")
        .await
        .unwrap();
    assert!(matches!(
        session.view(),
        Err(SessionError::Graph(pathway_core::GraphError::UnknownStep { .. }))
    ));
}

// ── Store outages ───────────────────────────────────────────────────────────

#[tokio::test]
async fn store_outage_propagates_unchanged() {
    let h = harness();
    let instance = new_instance(&h).await;
    h.store.set_offline(true);

    assert!(matches!(
        h.log.append(&instance.id, "step_1_identificacao", "u", json!({})).await,
        Err(SessionError::StorageUnavailable(_))
    ));
    assert!(matches!(
        resume(&h.log, &h.graph, &instance.id).await,
        Err(SessionError::StorageUnavailable(_))
    ));
    assert!(matches!(
        h.lifecycle.pause(&instance.id, "u").await,
        Err(SessionError::StorageUnavailable(_))
    ));

    h.store.set_offline(false);
    assert!(h.log.entries_for(&instance.id).await.unwrap().is_empty());
}
