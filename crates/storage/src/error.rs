use crate::record::InstanceStatus;

/// All errors that can be returned by a SessionStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// No instance with the given id.
    #[error("instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// An instance with this id already exists.
    #[error("instance already exists: {instance_id}")]
    InstanceAlreadyExists { instance_id: String },

    /// The author is already a collaborator on the instance.
    #[error("author {author_id} is already a collaborator on instance {instance_id}")]
    DuplicateCollaborator {
        instance_id: String,
        author_id: String,
    },

    /// Compare-and-set on the instance status failed: another writer
    /// changed it between read and write.
    #[error("status conflict on instance {instance_id}: expected {expected}, found {actual}")]
    StatusConflict {
        instance_id: String,
        expected: InstanceStatus,
        actual: InstanceStatus,
    },

    /// The backing store could not be reached or failed mid-operation.
    /// Never retried by the store itself.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}
