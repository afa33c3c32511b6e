use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lifecycle status of a protocol instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    InProgress,
    Paused,
    Completed,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::InProgress => "IN_PROGRESS",
            InstanceStatus::Paused => "PAUSED",
            InstanceStatus::Completed => "COMPLETED",
        }
    }

    /// In progress or paused: still listed among open instances.
    pub fn is_open(&self) -> bool {
        !matches!(self, InstanceStatus::Completed)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" | "in_progress" | "in-progress" => Ok(InstanceStatus::InProgress),
            "PAUSED" | "paused" => Ok(InstanceStatus::Paused),
            "COMPLETED" | "completed" => Ok(InstanceStatus::Completed),
            other => Err(format!("unknown instance status '{}'", other)),
        }
    }
}

/// Fields supplied when creating an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInstance {
    pub id: String,
    pub protocol_graph_id: String,
    pub patient_identifier: String,
    pub created_at: OffsetDateTime,
}

/// A protocol instance as stored in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub id: String,
    pub protocol_graph_id: String,
    pub patient_identifier: String,
    pub status: InstanceStatus,
    pub outcome: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    /// Author ids in assignment order. Append-only, no duplicates.
    pub collaborators: Vec<String>,
}

impl InstanceRecord {
    pub fn has_collaborator(&self, author_id: &str) -> bool {
        self.collaborators.iter().any(|c| c == author_id)
    }
}

/// Fields supplied when appending a data entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDataEntry {
    pub instance_id: String,
    pub step_id: String,
    pub author_id: String,
    /// Full snapshot of the step's field values at submission time.
    pub value: serde_json::Value,
    pub created_at: OffsetDateTime,
}

/// One immutable, author-attributed submission of a step's values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntryRecord {
    /// Store-assigned insertion sequence; breaks `created_at` ties.
    pub seq: u64,
    pub instance_id: String,
    pub step_id: String,
    pub author_id: String,
    pub value: serde_json::Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl DataEntryRecord {
    /// Total order of entries within one instance.
    pub fn order_key(&self) -> (OffsetDateTime, u64) {
        (self.created_at, self.seq)
    }
}

/// An instance with its most recent data entry, for activity listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub instance: InstanceRecord,
    /// Last entry in `(created_at, seq)` order; `None` before any data.
    pub last_entry: Option<DataEntryRecord>,
}

/// Filter for instance listings. Empty `statuses` means any status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFilter {
    pub protocol_graph_id: Option<String>,
    pub statuses: Vec<InstanceStatus>,
}

impl InstanceFilter {
    /// In-progress and paused instances of any protocol.
    pub fn open() -> Self {
        InstanceFilter {
            protocol_graph_id: None,
            statuses: vec![InstanceStatus::InProgress, InstanceStatus::Paused],
        }
    }

    pub fn matches(&self, record: &InstanceRecord) -> bool {
        let protocol_ok = self
            .protocol_graph_id
            .as_deref()
            .map_or(true, |p| p == record.protocol_graph_id);
        let status_ok = self.statuses.is_empty() || self.statuses.contains(&record.status);
        protocol_ok && status_ok
    }
}
