//! pathway-core: the protocol step-graph model.
//!
//! A protocol is a directed graph of steps. Each step captures a set of
//! fields (some conditionally visible) and declares ordered, possibly
//! conditional transitions to other steps. This crate owns the immutable
//! [`ProtocolGraph`] and the load-time validation that guarantees every
//! graph handed out is well-formed: transition targets exist, conditions
//! reference earlier fields, and each step has at most one trailing
//! default transition.

pub mod error;
pub mod graph;
pub mod load;
mod validate;

pub use error::{GraphError, Violation};
pub use graph::{
    ChoiceOption, Condition, ConditionMatch, FieldSpec, FieldType, ProtocolGraph, Step, StepKind,
    Transition, TransitionPredicate,
};
pub use load::{from_definition, from_json};
