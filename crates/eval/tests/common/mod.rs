#![allow(dead_code)]

use std::sync::Arc;

use pathway_core::ProtocolGraph;
use pathway_eval::{LifecycleManager, ManualClock, SessionLog, StatusPolicy};
use pathway_storage::{MemoryStore, SessionStore};
use time::macros::datetime;

pub const FIXTURE: &str = include_str!("../../../../fixtures/dor_toracica.json");

pub fn chest_pain() -> Arc<ProtocolGraph> {
    let doc: serde_json::Value = serde_json::from_str(FIXTURE).unwrap();
    Arc::new(pathway_core::from_json(&doc, None).unwrap())
}

/// One store, one manual clock, and the services built on them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub log: SessionLog,
    pub lifecycle: LifecycleManager,
    pub graph: Arc<ProtocolGraph>,
}

pub fn harness() -> Harness {
    harness_with(StatusPolicy::Strict)
}

pub fn harness_with(policy: StatusPolicy) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(datetime!(2025-05-10 14:00 UTC)));
    let dyn_store: Arc<dyn SessionStore> = store.clone();
    Harness {
        log: SessionLog::new(dyn_store.clone(), clock.clone()),
        lifecycle: LifecycleManager::new(dyn_store, clock.clone(), policy),
        store,
        clock,
        graph: chest_pain(),
    }
}
