//! pathway-eval: the protocol step-graph interpreter.
//!
//! Pure evaluators decide which step follows a step ([`next_step`]) and
//! which fields are visible ([`is_visible`], [`evaluate_step`]). Around
//! them sit the stateful parts: the append-only [`SessionLog`], the
//! [`reconstruct`]/[`resume`] pair that derives a resumable position from
//! the log alone, the [`LifecycleManager`] for instance status and
//! collaborators, a [`GraphRegistry`] of loaded protocols and the
//! interactive [`ProtocolSession`].

pub mod choice;
pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod log;
pub mod reconstruct;
pub mod registry;
pub mod session;
pub mod transition;
pub mod visibility;

pub use choice::normalize_selection;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SessionError;
pub use lifecycle::{LifecycleManager, StatusPolicy};
pub use log::{fold_latest, SessionLog};
pub use reconstruct::{reconstruct, resume, ResumePoint};
pub use registry::GraphRegistry;
pub use session::{ProtocolSession, StepView};
pub use transition::{next_step, next_step_id};
pub use visibility::{
    effective_values, evaluate_step, is_visible, visible_fields, FieldLookup, NoValues,
    SessionScope, StepValues, StepVisibility,
};
