use std::future::Future;

use super::{make_instance, TestResult};
use crate::{SessionStore, StorageError};

pub(super) async fn run_collaborator_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "collaborator",
            "collaborators_kept_in_assignment_order",
            collaborators_kept_in_assignment_order(factory).await,
        ),
        TestResult::from_result(
            "collaborator",
            "duplicate_collaborator_rejected",
            duplicate_collaborator_rejected(factory).await,
        ),
    ]
}

async fn collaborators_kept_in_assignment_order<S, F, Fut>(factory: &F) -> Result<(), String>
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
    for author in ["zoe", "ana", "bruno"] {
        store
            .add_collaborator("i1", author)
            .await
            .map_err(|e| format!("add {author}: {e}"))?;
    }
    let rec = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.collaborators != ["zoe", "ana", "bruno"] {
        return Err(format!("unexpected collaborators {:?}", rec.collaborators));
    }
    Ok(())
}

async fn duplicate_collaborator_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
    store
        .add_collaborator("i1", "ana")
        .await
        .map_err(|e| format!("add: {e}"))?;
    match store.add_collaborator("i1", "ana").await {
        Err(StorageError::DuplicateCollaborator {
            instance_id,
            author_id,
        }) if instance_id == "i1" && author_id == "ana" => {}
        other => return Err(format!("expected DuplicateCollaborator, got {other:?}")),
    }
    let rec = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.collaborators.len() != 1 {
        return Err(format!("rejected add changed the list: {:?}", rec.collaborators));
    }
    Ok(())
}
