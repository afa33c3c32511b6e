use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{
    DataEntryRecord, InstanceFilter, InstanceRecord, InstanceStatus, InstanceSummary, NewDataEntry,
    NewInstance,
};

/// Persistence backend for protocol instances and their data entries.
///
/// Data entries are append-only: no method edits or removes one. The only
/// mutable instance state is `status`, `outcome`, `updated_at` and the
/// collaborator list.
///
/// ## Entry ordering
///
/// `append_entry` assigns each entry a store-wide increasing `seq`.
/// `entries_for` returns entries ordered by `(created_at, seq)`, so two
/// entries sharing a timestamp come back in insertion order.
///
/// ## Status compare-and-set
///
/// `update_status` takes the status the caller last observed. When it is
/// `Some` and differs from the stored status, the write is refused with
/// `StorageError::StatusConflict` and nothing changes.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so a single store can be
/// shared across async tasks behind an `Arc`.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    // ── Instances ────────────────────────────────────────────────────────────

    /// Create an instance in status `IN_PROGRESS` with no outcome, no
    /// collaborators and `updated_at == created_at`.
    ///
    /// Returns `Err(StorageError::InstanceAlreadyExists)` if the id is taken.
    async fn create_instance(&self, new: NewInstance) -> Result<InstanceRecord, StorageError>;

    /// Returns `Err(StorageError::InstanceNotFound)` if absent.
    async fn get_instance(&self, instance_id: &str) -> Result<InstanceRecord, StorageError>;

    /// Instances matching `filter`, most recently updated first.
    async fn list_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceRecord>, StorageError>;

    /// Like `list_instances`, with each instance's latest entry attached.
    /// Same filter and ordering.
    async fn list_summaries(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<InstanceSummary>, StorageError>;

    /// Set status and outcome, and bump `updated_at`.
    async fn update_status(
        &self,
        instance_id: &str,
        expected: Option<InstanceStatus>,
        status: InstanceStatus,
        outcome: Option<String>,
        updated_at: OffsetDateTime,
    ) -> Result<InstanceRecord, StorageError>;

    /// Append an author to the collaborator list.
    ///
    /// Returns `Err(StorageError::DuplicateCollaborator)` if already present.
    async fn add_collaborator(
        &self,
        instance_id: &str,
        author_id: &str,
    ) -> Result<InstanceRecord, StorageError>;

    // ── Data entries ─────────────────────────────────────────────────────────

    /// Append an entry and move the instance's `updated_at` forward to the
    /// entry's `created_at` (never backwards).
    ///
    /// Returns `Err(StorageError::InstanceNotFound)` if the instance is absent;
    /// nothing is written in that case.
    async fn append_entry(&self, entry: NewDataEntry) -> Result<DataEntryRecord, StorageError>;

    /// All entries of an instance in `(created_at, seq)` order.
    ///
    /// Returns `Err(StorageError::InstanceNotFound)` if the instance is absent.
    async fn entries_for(&self, instance_id: &str) -> Result<Vec<DataEntryRecord>, StorageError>;
}
