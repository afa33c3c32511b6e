use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use super::{at, make_entry, make_instance, TestResult};
use crate::{InstanceStatus, SessionStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "concurrent",
            "concurrent_appends_all_land",
            concurrent_appends_all_land(factory).await,
        ),
        TestResult::from_result(
            "concurrent",
            "concurrent_status_cas_exactly_one_wins",
            concurrent_status_cas_exactly_one_wins(factory).await,
        ),
    ]
}

// ── Concurrent appends: nothing lost ────────────────────────────────────────

/// N tasks append to the same instance at the same timestamp. Every entry
/// must be stored with a distinct seq and the log must come back sorted.
async fn concurrent_appends_all_land<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_instance(make_instance("i1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            s.append_entry(make_entry("i1", &format!("step-{i}"), at(1)))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let entries = store
        .entries_for("i1")
        .await
        .map_err(|e| format!("entries: {e}"))?;
    if entries.len() != N {
        return Err(format!("expected {N} entries, got {}", entries.len()));
    }
    let seqs: HashSet<u64> = entries.iter().map(|e| e.seq).collect();
    if seqs.len() != N {
        return Err("seq values must be unique".to_string());
    }
    if !entries.windows(2).all(|w| w[0].order_key() < w[1].order_key()) {
        return Err("entries not in (created_at, seq) order".to_string());
    }
    Ok(())
}

// ── Concurrent status compare-and-set: exactly one wins ─────────────────────

/// N tasks try to complete the same in-progress instance, each expecting
/// IN_PROGRESS. Exactly one write succeeds; the rest see StatusConflict.
async fn concurrent_status_cas_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = Arc::new(factory().await);
    store
        .create_instance(make_instance("i1"))
        .await
        .map_err(|e| format!("create: {e}"))?;

    let mut handles = Vec::new();
    for i in 0..N {
        let s = store.clone();
        handles.push(tokio::spawn(async move {
            let result = s
                .update_status(
                    "i1",
                    Some(InstanceStatus::InProgress),
                    InstanceStatus::Completed,
                    Some(format!("outcome-{i}")),
                    at(10),
                )
                .await;
            match result {
                Ok(_) => Ok(true),
                Err(StorageError::StatusConflict { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    let rec = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.status != InstanceStatus::Completed {
        return Err(format!("final status {}", rec.status));
    }
    Ok(())
}
