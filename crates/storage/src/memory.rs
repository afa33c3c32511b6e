//! In-memory `SessionStore`.
//!
//! Backs tests, the CLI and embedders that do not need durability. All
//! state sits behind one `tokio::sync::RwLock`, so every trait method is
//! atomic with respect to the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageError;
use crate::record::{
    DataEntryRecord, InstanceFilter, InstanceRecord, InstanceStatus, InstanceSummary, NewDataEntry,
    NewInstance,
};
use crate::traits::SessionStore;

#[derive(Debug, Default)]
struct State {
    instances: HashMap<String, InstanceRecord>,
    /// Per instance, kept sorted by `(created_at, seq)`.
    entries: HashMap<String, Vec<DataEntryRecord>>,
    next_seq: u64,
}

impl State {
    /// Instances matching `filter`, newest first. Id breaks ties so the
    /// listing is deterministic.
    fn matching(&self, filter: &InstanceFilter) -> Vec<&InstanceRecord> {
        let mut matching: Vec<&InstanceRecord> = self
            .instances
            .values()
            .filter(|r| filter.matches(r))
            .collect();
        matching.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        matching
    }
}

/// Volatile store. Cheap to create; one per test.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with `StorageError::Unavailable`.
    /// Used to exercise outage handling in callers.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

fn not_found(instance_id: &str) -> StorageError {
    StorageError::InstanceNotFound {
        instance_id: instance_id.to_string(),
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_instance(&self, new: NewInstance) -> Result<InstanceRecord, StorageError> {
        self.check_online()?;
        let mut state = self.state.write().await;
        if state.instances.contains_key(&new.id) {
            return Err(StorageError::InstanceAlreadyExists {
                instance_id: new.id,
            });
        }
        let record = InstanceRecord {
            id: new.id.clone(),
            protocol_graph_id: new.protocol_graph_id,
            patient_identifier: new.patient_identifier,
            status: InstanceStatus::InProgress,
            outcome: None,
            created_at: new.created_at,
            updated_at: new.created_at,
            collaborators: Vec::new(),
        };
        state.instances.insert(new.id.clone(), record.clone());
        state.entries.insert(new.id, Vec::new());
        debug!(
            instance = %record.id,
            protocol = %record.protocol_graph_id,
            "instance created"
        );
        Ok(record)
    }

    async fn get_instance(&self, instance_id: &str) -> Result<InstanceRecord, StorageError> {
        self.check_online()?;
        let state = self.state.read().await;
        state
            .instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| not_found(instance_id))
    }

    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, StorageError> {
        self.check_online()?;
        let state = self.state.read().await;
        Ok(state.matching(filter).into_iter().cloned().collect())
    }

    async fn list_summaries(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceSummary>, StorageError> {
        self.check_online()?;
        let state = self.state.read().await;
        Ok(state
            .matching(filter)
            .into_iter()
            .map(|instance| InstanceSummary {
                instance: instance.clone(),
                last_entry: state
                    .entries
                    .get(&instance.id)
                    .and_then(|log| log.last())
                    .cloned(),
            })
            .collect())
    }

    async fn update_status(
        &self,
        instance_id: &str,
        expected: Option<InstanceStatus>,
        status: InstanceStatus,
        outcome: Option<String>,
        updated_at: OffsetDateTime,
    ) -> Result<InstanceRecord, StorageError> {
        self.check_online()?;
        let mut state = self.state.write().await;
        let record = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        if let Some(expected) = expected {
            if record.status != expected {
                return Err(StorageError::StatusConflict {
                    instance_id: instance_id.to_string(),
                    expected,
                    actual: record.status,
                });
            }
        }
        record.status = status;
        record.outcome = outcome;
        record.updated_at = record.updated_at.max(updated_at);
        Ok(record.clone())
    }

    async fn add_collaborator(
        &self,
        instance_id: &str,
        author_id: &str,
    ) -> Result<InstanceRecord, StorageError> {
        self.check_online()?;
        let mut state = self.state.write().await;
        let record = state
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| not_found(instance_id))?;
        if record.has_collaborator(author_id) {
            return Err(StorageError::DuplicateCollaborator {
                instance_id: instance_id.to_string(),
                author_id: author_id.to_string(),
            });
        }
        record.collaborators.push(author_id.to_string());
        Ok(record.clone())
    }

    async fn append_entry(&self, entry: NewDataEntry) -> Result<DataEntryRecord, StorageError> {
        self.check_online()?;
        let mut state = self.state.write().await;
        let State {
            instances,
            entries,
            next_seq,
        } = &mut *state;

        let instance = instances
            .get_mut(&entry.instance_id)
            .ok_or_else(|| not_found(&entry.instance_id))?;

        *next_seq += 1;
        let record = DataEntryRecord {
            seq: *next_seq,
            instance_id: entry.instance_id,
            step_id: entry.step_id,
            author_id: entry.author_id,
            value: entry.value,
            created_at: entry.created_at,
        };

        instance.updated_at = instance.updated_at.max(record.created_at);

        let log = entries.entry(record.instance_id.clone()).or_default();
        let key = record.order_key();
        let at = log.partition_point(|e| e.order_key() <= key);
        log.insert(at, record.clone());
        debug!(
            instance = %record.instance_id,
            step = %record.step_id,
            seq = record.seq,
            "entry appended"
        );

        Ok(record)
    }

    async fn entries_for(&self, instance_id: &str) -> Result<Vec<DataEntryRecord>, StorageError> {
        self.check_online()?;
        let state = self.state.read().await;
        if !state.instances.contains_key(instance_id) {
            return Err(not_found(instance_id));
        }
        Ok(state.entries.get(instance_id).cloned().unwrap_or_default())
    }
}
