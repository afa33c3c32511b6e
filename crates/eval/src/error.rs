use pathway_core::GraphError;
use pathway_storage::{InstanceStatus, StorageError};

/// Errors surfaced by the interpreter's stateful operations.
///
/// Pure evaluators never fail; everything here comes from graph lookups,
/// caller input, status policy or the backing store.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Graph failed validation or a step id is not declared.
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("unknown protocol: {graph_id}")]
    UnknownProtocol { graph_id: String },

    #[error("unknown instance: {instance_id}")]
    UnknownInstance { instance_id: String },

    #[error("author {author_id} is already a collaborator on instance {instance_id}")]
    DuplicateCollaborator {
        instance_id: String,
        author_id: String,
    },

    /// Status changes are reserved to the instance's collaborators.
    #[error("author {author_id} is not a collaborator on instance {instance_id}")]
    NotACollaborator {
        instance_id: String,
        author_id: String,
    },

    /// Status change rejected by the status policy.
    #[error("invalid status transition on instance {instance_id}: {from} -> {to}")]
    InvalidTransition {
        instance_id: String,
        from: InstanceStatus,
        to: InstanceStatus,
    },

    /// Another writer changed the status between read and write.
    #[error("status of instance {instance_id} changed concurrently (expected {expected}, found {actual})")]
    ConcurrentStatusChange {
        instance_id: String,
        expected: InstanceStatus,
        actual: InstanceStatus,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Propagated unchanged from the store; never retried here.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InstanceNotFound { instance_id } => {
                SessionError::UnknownInstance { instance_id }
            }
            StorageError::DuplicateCollaborator {
                instance_id,
                author_id,
            } => SessionError::DuplicateCollaborator {
                instance_id,
                author_id,
            },
            StorageError::StatusConflict {
                instance_id,
                expected,
                actual,
            } => SessionError::ConcurrentStatusChange {
                instance_id,
                expected,
                actual,
            },
            StorageError::InstanceAlreadyExists { instance_id } => {
                SessionError::InvalidInput(format!("instance id '{}' is already taken", instance_id))
            }
            StorageError::Unavailable(msg) => SessionError::StorageUnavailable(msg),
        }
    }
}
