//! pathway-interchange: protocol definition documents and their deserialization.
//!
//! Provides typed structs for the authoring JSON a protocol definition
//! is stored in (steps, fields, navigation rules) and a single
//! `from_document()` entry point that deserializes a `serde_json::Value`
//! into a [`DefinitionDocument`].
//!
//! Nothing here validates graph structure. Consumers (pathway-core)
//! convert the declarations into their own model and reject documents
//! that do not form a well-formed step graph.

pub mod deserialize;
pub mod types;

pub use deserialize::{from_document, InterchangeError};
pub use types::*;
