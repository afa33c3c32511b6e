use std::future::Future;

use super::{at, make_entry, TestResult};
use crate::{InstanceStatus, SessionStore, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "unknown_instance_reported_by_every_method",
            unknown_instance_reported_by_every_method(factory).await,
        ),
        TestResult::from_result(
            "error",
            "failed_append_writes_nothing",
            failed_append_writes_nothing(factory).await,
        ),
    ]
}

fn expect_not_found<T: std::fmt::Debug>(
    op: &str,
    result: Result<T, StorageError>,
) -> Result<(), String> {
    match result {
        Err(StorageError::InstanceNotFound { instance_id }) if instance_id == "ghost" => Ok(()),
        other => Err(format!("{op}: expected InstanceNotFound(ghost), got {other:?}")),
    }
}

async fn unknown_instance_reported_by_every_method<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    expect_not_found("get_instance", store.get_instance("ghost").await)?;
    expect_not_found(
        "update_status",
        store
            .update_status("ghost", None, InstanceStatus::Paused, None, at(1))
            .await,
    )?;
    expect_not_found(
        "add_collaborator",
        store.add_collaborator("ghost", "ana").await,
    )?;
    expect_not_found(
        "append_entry",
        store.append_entry(make_entry("ghost", "s", at(1))).await,
    )?;
    expect_not_found("entries_for", store.entries_for("ghost").await)?;
    Ok(())
}

async fn failed_append_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    let _ = store.append_entry(make_entry("ghost", "s", at(1))).await;
    store
        .create_instance(super::make_instance("ghost"))
        .await
        .map_err(|e| format!("create: {e}"))?;
    let entries = store
        .entries_for("ghost")
        .await
        .map_err(|e| format!("entries: {e}"))?;
    if !entries.is_empty() {
        return Err("append to a missing instance left an orphan entry".to_string());
    }
    Ok(())
}
