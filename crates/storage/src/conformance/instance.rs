use std::future::Future;

use super::{at, make_instance, make_instance_at, TestResult, T0};
use crate::{InstanceFilter, InstanceStatus, SessionStore, StorageError};

pub(super) async fn run_instance_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "instance",
            "create_starts_in_progress",
            create_starts_in_progress(factory).await,
        ),
        TestResult::from_result(
            "instance",
            "created_instance_readable",
            created_instance_readable(factory).await,
        ),
        TestResult::from_result(
            "instance",
            "duplicate_id_rejected",
            duplicate_id_rejected(factory).await,
        ),
        TestResult::from_result(
            "instance",
            "list_orders_newest_first",
            list_orders_newest_first(factory).await,
        ),
        TestResult::from_result(
            "instance",
            "list_filters_by_status_and_protocol",
            list_filters_by_status_and_protocol(factory).await,
        ),
    ]
}

async fn create_starts_in_progress<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let rec = store
        .create_instance(make_instance("i1"))
        .await
        .map_err(|e| format!("create: {e}"))?;
    if rec.status != InstanceStatus::InProgress {
        return Err(format!("expected IN_PROGRESS, got {}", rec.status));
    }
    if rec.outcome.is_some() || !rec.collaborators.is_empty() {
        return Err(format!("expected no outcome and no collaborators, got {rec:?}"));
    }
    if rec.updated_at != rec.created_at {
        return Err("updated_at should equal created_at on creation".to_string());
    }
    Ok(())
}

async fn created_instance_readable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let created = store
        .create_instance(make_instance("i1"))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let read = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if read != created {
        return Err(format!("read {read:?} differs from created {created:?}"));
    }
    Ok(())
}

async fn duplicate_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_instance(make_instance("i1"))
        .await
        .map_err(|e| format!("create: {e}"))?;
    match store.create_instance(make_instance("i1")).await {
        Err(StorageError::InstanceAlreadyExists { instance_id }) if instance_id == "i1" => Ok(()),
        other => Err(format!("expected InstanceAlreadyExists, got {other:?}")),
    }
}

async fn list_orders_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for (id, minute) in [("old", 0), ("new", 20), ("mid", 10)] {
        store
            .create_instance(make_instance_at(id, "p", at(minute)))
            .await
            .map_err(|e| format!("create {id}: {e}"))?;
    }
    let ids: Vec<String> = store
        .list_instances(&InstanceFilter::default())
        .await
        .map_err(|e| format!("list: {e}"))?
        .into_iter()
        .map(|r| r.id)
        .collect();
    if ids != ["new", "mid", "old"] {
        return Err(format!("expected [new, mid, old], got {ids:?}"));
    }
    Ok(())
}

async fn list_filters_by_status_and_protocol<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    store
        .create_instance(make_instance_at("a", "chest", T0))
        .await
        .map_err(|e| format!("create a: {e}"))?;
    store
        .create_instance(make_instance_at("b", "chest", T0))
        .await
        .map_err(|e| format!("create b: {e}"))?;
    store
        .create_instance(make_instance_at("c", "sepsis", T0))
        .await
        .map_err(|e| format!("create c: {e}"))?;
    store
        .update_status("b", None, InstanceStatus::Completed, None, at(5))
        .await
        .map_err(|e| format!("complete b: {e}"))?;

    let open = store
        .list_instances(&InstanceFilter::open())
        .await
        .map_err(|e| format!("list open: {e}"))?;
    if open.iter().any(|r| r.id == "b") || open.len() != 2 {
        return Err(format!("open listing wrong: {open:?}"));
    }

    let chest = store
        .list_instances(&InstanceFilter {
            protocol_graph_id: Some("chest".to_string()),
            statuses: vec![],
        })
        .await
        .map_err(|e| format!("list chest: {e}"))?;
    let mut ids: Vec<&str> = chest.iter().map(|r| r.id.as_str()).collect();
    ids.sort();
    if ids != ["a", "b"] {
        return Err(format!("expected chest instances [a, b], got {ids:?}"));
    }
    Ok(())
}
