//! Session Log: the append-only record of step submissions.
//!
//! Knows nothing about graphs. Every value is a full snapshot of a step's
//! fields at submission time; the latest snapshot per step is a fold over
//! the ordered entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use pathway_storage::{DataEntryRecord, NewDataEntry, SessionStore};
use serde_json::Value;
use tracing::debug;

use crate::clock::Clock;
use crate::error::SessionError;

#[derive(Clone)]
pub struct SessionLog {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionLog {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record a snapshot for `step_id`, timestamped by the log's clock.
    ///
    /// Fails with `UnknownInstance` if the instance does not exist.
    pub async fn append(
        &self,
        instance_id: &str,
        step_id: &str,
        author_id: &str,
        value: Value,
    ) -> Result<DataEntryRecord, SessionError> {
        let entry = self
            .store
            .append_entry(NewDataEntry {
                instance_id: instance_id.to_string(),
                step_id: step_id.to_string(),
                author_id: author_id.to_string(),
                value,
                created_at: self.clock.now(),
            })
            .await?;
        debug!(
            instance = %entry.instance_id,
            step = %entry.step_id,
            author = %entry.author_id,
            seq = entry.seq,
            "data entry appended"
        );
        Ok(entry)
    }

    /// Entries of an instance, oldest first.
    pub async fn entries_for(&self, instance_id: &str) -> Result<Vec<DataEntryRecord>, SessionError> {
        Ok(self.store.entries_for(instance_id).await?)
    }

    /// Latest snapshot per step.
    pub async fn latest_per_step(
        &self,
        instance_id: &str,
    ) -> Result<BTreeMap<String, Value>, SessionError> {
        let entries = self.entries_for(instance_id).await?;
        Ok(fold_latest(&entries))
    }
}

/// Fold entries in the given order, last write per step wins.
pub fn fold_latest(entries: &[DataEntryRecord]) -> BTreeMap<String, Value> {
    let mut latest = BTreeMap::new();
    for entry in entries {
        latest.insert(entry.step_id.clone(), entry.value.clone());
    }
    latest
}
