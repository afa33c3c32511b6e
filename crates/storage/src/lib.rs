pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStore;
pub use record::{
    DataEntryRecord, InstanceFilter, InstanceRecord, InstanceStatus, InstanceSummary, NewDataEntry,
    NewInstance,
};
pub use traits::SessionStore;
