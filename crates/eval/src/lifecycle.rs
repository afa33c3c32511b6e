//! Instance Lifecycle Manager: status and collaborators.
//!
//! ```text
//!   IN_PROGRESS --pause--> PAUSED
//!   PAUSED --resume--> IN_PROGRESS
//!   IN_PROGRESS --complete--> COMPLETED
//! ```
//!
//! Which jumps `set_status` accepts is decided by [`StatusPolicy`]. The
//! named operations always require their own source state. Every status
//! change is made by an author who must already be a collaborator.

use std::sync::Arc;

use pathway_storage::{
    InstanceFilter, InstanceRecord, InstanceStatus, InstanceSummary, NewInstance, SessionStore,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::SessionError;

/// Which status changes `set_status` accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Only the three lifecycle edges, plus same-status updates (e.g. to
    /// record an outcome). COMPLETED is terminal.
    #[default]
    Strict,
    /// Any status to any status.
    Permissive,
}

impl StatusPolicy {
    pub fn permits(&self, from: InstanceStatus, to: InstanceStatus) -> bool {
        use InstanceStatus::*;
        match self {
            StatusPolicy::Permissive => true,
            StatusPolicy::Strict => {
                from == to
                    || matches!(
                        (from, to),
                        (InProgress, Paused) | (Paused, InProgress) | (InProgress, Completed)
                    )
            }
        }
    }
}

pub struct LifecycleManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    policy: StatusPolicy,
}

impl LifecycleManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>, policy: StatusPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> StatusPolicy {
        self.policy
    }

    /// Create an instance for a patient. The identifier must not be blank.
    pub async fn create(
        &self,
        protocol_graph_id: &str,
        patient_identifier: &str,
    ) -> Result<InstanceRecord, SessionError> {
        let patient_identifier = patient_identifier.trim();
        if patient_identifier.is_empty() {
            return Err(SessionError::InvalidInput(
                "patient identifier must not be blank".to_string(),
            ));
        }
        let record = self
            .store
            .create_instance(NewInstance {
                id: Uuid::new_v4().to_string(),
                protocol_graph_id: protocol_graph_id.to_string(),
                patient_identifier: patient_identifier.to_string(),
                created_at: self.clock.now(),
            })
            .await?;
        info!(
            instance = %record.id,
            protocol = %record.protocol_graph_id,
            "protocol instance created"
        );
        Ok(record)
    }

    pub async fn get(&self, instance_id: &str) -> Result<InstanceRecord, SessionError> {
        Ok(self.store.get_instance(instance_id).await?)
    }

    pub async fn pause(
        &self,
        instance_id: &str,
        author_id: &str,
    ) -> Result<InstanceRecord, SessionError> {
        self.transition(
            instance_id,
            author_id,
            InstanceStatus::InProgress,
            InstanceStatus::Paused,
            None,
        )
        .await
    }

    pub async fn resume(
        &self,
        instance_id: &str,
        author_id: &str,
    ) -> Result<InstanceRecord, SessionError> {
        self.transition(
            instance_id,
            author_id,
            InstanceStatus::Paused,
            InstanceStatus::InProgress,
            None,
        )
        .await
    }

    pub async fn complete(
        &self,
        instance_id: &str,
        author_id: &str,
        outcome: Option<String>,
    ) -> Result<InstanceRecord, SessionError> {
        self.transition(
            instance_id,
            author_id,
            InstanceStatus::InProgress,
            InstanceStatus::Completed,
            outcome,
        )
        .await
    }

    /// Set status (and optionally outcome) subject to the policy. Always
    /// bumps `updated_at`. A `None` outcome keeps the current one.
    ///
    /// Like the named operations, only a collaborator of the instance may
    /// change its status.
    pub async fn set_status(
        &self,
        instance_id: &str,
        author_id: &str,
        status: InstanceStatus,
        outcome: Option<String>,
    ) -> Result<InstanceRecord, SessionError> {
        let current = self.store.get_instance(instance_id).await?;
        check_collaborator(&current, author_id)?;
        if !self.policy.permits(current.status, status) {
            warn!(
                instance = %instance_id,
                from = %current.status,
                to = %status,
                "status change rejected"
            );
            return Err(SessionError::InvalidTransition {
                instance_id: instance_id.to_string(),
                from: current.status,
                to: status,
            });
        }
        let expected = match self.policy {
            StatusPolicy::Strict => Some(current.status),
            StatusPolicy::Permissive => None,
        };
        self.write_status(current, expected, status, outcome).await
    }

    async fn transition(
        &self,
        instance_id: &str,
        author_id: &str,
        from: InstanceStatus,
        to: InstanceStatus,
        outcome: Option<String>,
    ) -> Result<InstanceRecord, SessionError> {
        let current = self.store.get_instance(instance_id).await?;
        check_collaborator(&current, author_id)?;
        if current.status != from {
            return Err(SessionError::InvalidTransition {
                instance_id: instance_id.to_string(),
                from: current.status,
                to,
            });
        }
        self.write_status(current, Some(from), to, outcome).await
    }

    async fn write_status(
        &self,
        current: InstanceRecord,
        expected: Option<InstanceStatus>,
        status: InstanceStatus,
        outcome: Option<String>,
    ) -> Result<InstanceRecord, SessionError> {
        let outcome = outcome.or(current.outcome);
        let record = self
            .store
            .update_status(&current.id, expected, status, outcome, self.clock.now())
            .await?;
        info!(
            instance = %record.id,
            from = %current.status,
            to = %record.status,
            "instance status changed"
        );
        Ok(record)
    }

    /// Add a collaborator. Fails with `DuplicateCollaborator` if present.
    pub async fn assign_collaborator(
        &self,
        instance_id: &str,
        author_id: &str,
    ) -> Result<InstanceRecord, SessionError> {
        let record = self.store.add_collaborator(instance_id, author_id).await?;
        info!(instance = %instance_id, author = %author_id, "collaborator assigned");
        Ok(record)
    }

    /// Add a collaborator unless already present.
    pub async fn ensure_collaborator(
        &self,
        instance_id: &str,
        author_id: &str,
    ) -> Result<InstanceRecord, SessionError> {
        let current = self.store.get_instance(instance_id).await?;
        if current.has_collaborator(author_id) {
            return Ok(current);
        }
        match self.assign_collaborator(instance_id, author_id).await {
            Err(SessionError::DuplicateCollaborator { .. }) => self.get(instance_id).await,
            other => other,
        }
    }

    /// In-progress and paused instances, most recently updated first, each
    /// with its latest data entry.
    pub async fn list_open(&self) -> Result<Vec<InstanceSummary>, SessionError> {
        self.list_summaries(&InstanceFilter::open()).await
    }

    pub async fn list_summaries(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceSummary>, SessionError> {
        Ok(self.store.list_summaries(filter).await?)
    }

    pub async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, SessionError> {
        Ok(self.store.list_instances(filter).await?)
    }
}

fn check_collaborator(instance: &InstanceRecord, author_id: &str) -> Result<(), SessionError> {
    if instance.has_collaborator(author_id) {
        return Ok(());
    }
    warn!(
        instance = %instance.id,
        author = %author_id,
        "status change by non-collaborator rejected"
    );
    Err(SessionError::NotACollaborator {
        instance_id: instance.id.clone(),
        author_id: author_id.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use InstanceStatus::*;

    #[test]
    fn strict_policy_edges() {
        let p = StatusPolicy::Strict;
        assert!(p.permits(InProgress, Paused));
        assert!(p.permits(Paused, InProgress));
        assert!(p.permits(InProgress, Completed));
        assert!(p.permits(Completed, Completed));
        assert!(!p.permits(Completed, InProgress));
        assert!(!p.permits(Paused, Completed));
        assert!(!p.permits(Completed, Paused));
    }

    #[test]
    fn permissive_policy_allows_everything() {
        let p = StatusPolicy::Permissive;
        for from in [InProgress, Paused, Completed] {
            for to in [InProgress, Paused, Completed] {
                assert!(p.permits(from, to));
            }
        }
    }
}
