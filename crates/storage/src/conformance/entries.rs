use std::future::Future;

use super::{at, make_entry, make_instance, TestResult};
use crate::{InstanceFilter, SessionStore};

pub(super) async fn run_entry_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "entries",
            "new_instance_has_no_entries",
            new_instance_has_no_entries(factory).await,
        ),
        TestResult::from_result(
            "entries",
            "appended_entry_round_trips",
            appended_entry_round_trips(factory).await,
        ),
        TestResult::from_result(
            "entries",
            "entries_ordered_by_created_at",
            entries_ordered_by_created_at(factory).await,
        ),
        TestResult::from_result(
            "entries",
            "equal_timestamps_keep_insertion_order",
            equal_timestamps_keep_insertion_order(factory).await,
        ),
        TestResult::from_result(
            "entries",
            "append_bumps_updated_at",
            append_bumps_updated_at(factory).await,
        ),
        TestResult::from_result(
            "entries",
            "instances_have_independent_logs",
            instances_have_independent_logs(factory).await,
        ),
        TestResult::from_result(
            "entries",
            "summaries_carry_latest_entry",
            summaries_carry_latest_entry(factory).await,
        ),
    ]
}

async fn new_instance_has_no_entries<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let entries = store
        .entries_for("i1")
        .await
        .map_err(|e| format!("entries: {e}"))?;
    if !entries.is_empty() {
        return Err(format!("expected no entries, got {}", entries.len()));
    }
    Ok(())
}

async fn appended_entry_round_trips<S, F, Fut>(factory: &F) -> Result<(), String>
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
    let mut entry = make_entry("i1", "step_1", at(1));
    entry.author_id = "dr-ana".to_string();
    entry.value = serde_json::json!({ "nome": "Maria", "idade": 54 });
    let written = store
        .append_entry(entry.clone())
        .await
        .map_err(|e| format!("append: {e}"))?;
    let entries = store
        .entries_for("i1")
        .await
        .map_err(|e| format!("entries: {e}"))?;
    let [read] = entries.as_slice() else {
        return Err(format!("expected one entry, got {}", entries.len()));
    };
    if read != &written {
        return Err(format!("read {read:?} differs from written {written:?}"));
    }
    if read.author_id != "dr-ana" || read.value != entry.value || read.step_id != "step_1" {
        return Err(format!("entry fields not preserved: {read:?}"));
    }
    Ok(())
}

async fn entries_ordered_by_created_at<S, F, Fut>(factory: &F) -> Result<(), String>
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
    for (step, minute) in [("c", 30), ("a", 10), ("b", 20)] {
        store
            .append_entry(make_entry("i1", step, at(minute)))
            .await
            .map_err(|e| format!("append {step}: {e}"))?;
    }
    let steps: Vec<String> = store
        .entries_for("i1")
        .await
        .map_err(|e| format!("entries: {e}"))?
        .into_iter()
        .map(|e| e.step_id)
        .collect();
    if steps != ["a", "b", "c"] {
        return Err(format!("expected [a, b, c], got {steps:?}"));
    }
    Ok(())
}

async fn equal_timestamps_keep_insertion_order<S, F, Fut>(factory: &F) -> Result<(), String>
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
    for step in ["first", "second", "third"] {
        store
            .append_entry(make_entry("i1", step, at(5)))
            .await
            .map_err(|e| format!("append {step}: {e}"))?;
    }
    let entries = store
        .entries_for("i1")
        .await
        .map_err(|e| format!("entries: {e}"))?;
    let steps: Vec<&str> = entries.iter().map(|e| e.step_id.as_str()).collect();
    if steps != ["first", "second", "third"] {
        return Err(format!("expected insertion order, got {steps:?}"));
    }
    if !entries.windows(2).all(|w| w[0].seq < w[1].seq) {
        return Err("seq must increase with insertion".to_string());
    }
    Ok(())
}

async fn append_bumps_updated_at<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .append_entry(make_entry("i1", "s", at(42)))
        .await
        .map_err(|e| format!("append: {e}"))?;
    let rec = store
        .get_instance("i1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if rec.updated_at != at(42) {
        return Err(format!("expected updated_at {}, got {}", at(42), rec.updated_at));
    }
    Ok(())
}

async fn instances_have_independent_logs<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for id in ["i1", "i2"] {
        store
            .create_instance(make_instance(id))
            .await
            .map_err(|e| format!("create {id}: {e}"))?;
    }
    store
        .append_entry(make_entry("i1", "s", at(1)))
        .await
        .map_err(|e| format!("append: {e}"))?;
    let other = store
        .entries_for("i2")
        .await
        .map_err(|e| format!("entries: {e}"))?;
    if !other.is_empty() {
        return Err("entry leaked into another instance".to_string());
    }
    Ok(())
}

async fn summaries_carry_latest_entry<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: SessionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let store = factory().await;
    for id in ["busy", "idle"] {
        store
            .create_instance(make_instance(id))
            .await
            .map_err(|e| format!("create {id}: {e}"))?;
    }
    store
        .append_entry(make_entry("busy", "step_a", at(5)))
        .await
        .map_err(|e| format!("append step_a: {e}"))?;
    // Backdated: appended last but not the latest entry.
    store
        .append_entry(make_entry("busy", "step_b", at(2)))
        .await
        .map_err(|e| format!("append step_b: {e}"))?;

    let summaries = store
        .list_summaries(&InstanceFilter::default())
        .await
        .map_err(|e| format!("list summaries: {e}"))?;
    let ids: Vec<&str> = summaries.iter().map(|s| s.instance.id.as_str()).collect();
    if ids != ["busy", "idle"] {
        return Err(format!("expected [busy, idle], got {ids:?}"));
    }
    match &summaries[0].last_entry {
        Some(entry) if entry.step_id == "step_a" && entry.created_at == at(5) => {}
        other => return Err(format!("expected step_a at +5min as last entry, got {other:?}")),
    }
    if summaries[1].last_entry.is_some() {
        return Err("instance without entries should have no last entry".to_string());
    }
    Ok(())
}
