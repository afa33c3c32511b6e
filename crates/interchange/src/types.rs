//! Typed structs representing a protocol definition document.
//!
//! These mirror the authoring format one-to-one. Kinds are kept as the
//! strings found in the document (`"form"`, `"singleChoice"`, ...) so that
//! the graph model decides which of them it accepts. Values that are
//! compared at runtime (option values, navigation and condition values)
//! stay `serde_json::Value` so no coercion happens while loading.

use serde::{Deserialize, Serialize};

/// Step kind string for data-capture steps.
pub const STEP_KIND_FORM: &str = "form";
/// Step kind string for informational steps.
pub const STEP_KIND_INFO: &str = "info";

/// Top-level definition document.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionDocument {
    /// Protocol identifier. Definitions stored as bare `structureJson`
    /// carry none; the caller supplies one before building a graph.
    pub id: Option<String>,
    pub title: String,
    pub description: String,
    /// Declared entry step.
    pub initial_step: String,
    /// Steps in declaration order.
    pub steps: Vec<StepDecl>,
}

/// A single step declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StepDecl {
    pub id: String,
    /// `"form"` or `"info"` after lifting (see `deserialize`).
    pub kind: String,
    pub label: String,
    pub fields: Vec<FieldDecl>,
    /// Navigation rules in declaration order.
    pub navigation: Vec<NavigationDecl>,
}

/// A field declaration. Group fields carry their sub-fields in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub id: String,
    pub label: String,
    pub field_type: String,
    pub options: Vec<OptionDecl>,
    pub condition: Option<ConditionDecl>,
    pub fields: Vec<FieldDecl>,
}

/// A choice option. Plain-string options in the document become an
/// option whose label and value are the same string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDecl {
    pub label: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub exclusive: bool,
}

/// Visibility condition attached to a field.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionDecl {
    /// Field whose captured value governs visibility.
    pub field: String,
    pub value: ConditionValueDecl,
}

/// `value` of a condition: a scalar, or an array of acceptable values.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionValueDecl {
    Single(serde_json::Value),
    AnyOf(Vec<serde_json::Value>),
}

/// A navigation rule. `field` and `on_value` are either both present
/// (conditional rule) or both absent (default rule).
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationDecl {
    pub go_to: String,
    pub field: Option<String>,
    pub on_value: Option<serde_json::Value>,
}

impl NavigationDecl {
    /// True when the rule carries no predicate.
    pub fn is_default(&self) -> bool {
        self.field.is_none() && self.on_value.is_none()
    }
}
