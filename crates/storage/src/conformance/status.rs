use std::future::Future;

use super::{at, make_instance, TestResult};
use crate::{InstanceStatus, SessionStore, StorageError};

pub(super) async fn run_status_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "status",
            "update_sets_status_outcome_and_timestamp",
            update_sets_status_outcome_and_timestamp(factory).await,
        ),
        TestResult::from_result(
            "status",
            "expected_status_mismatch_conflicts",
            expected_status_mismatch_conflicts(factory).await,
        ),
    ]
}

async fn update_sets_status_outcome_and_timestamp<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let rec = store
        .update_status(
            "i1",
            Some(InstanceStatus::InProgress),
            InstanceStatus::Completed,
            Some("alta".to_string()),
            at(90),
        )
        .await
        .map_err(|e| format!("update: {e}"))?;
    if rec.status != InstanceStatus::Completed || rec.outcome.as_deref() != Some("alta") {
        return Err(format!("status/outcome not written: {rec:?}"));
    }
    if rec.updated_at != at(90) {
        return Err(format!("updated_at not bumped: {}", rec.updated_at));
    }
    let read = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if read != rec {
        return Err("returned record differs from stored record".to_string());
    }
    Ok(())
}

async fn expected_status_mismatch_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let result = store
        .update_status(
            "i1",
            Some(InstanceStatus::Paused),
            InstanceStatus::InProgress,
            None,
            at(1),
        )
        .await;
    match result {
        Err(StorageError::StatusConflict {
            expected: InstanceStatus::Paused,
            actual: InstanceStatus::InProgress,
            ..
        }) => {}
        other => return Err(format!("expected StatusConflict, got {other:?}")),
    }
    let read = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if read.updated_at != read.created_at {
        return Err("refused update must not touch the record".to_string());
    }
    Ok(())
}
