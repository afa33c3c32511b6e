//! Interactive navigation over one protocol instance.
//!
//! A [`ProtocolSession`] holds an in-memory view of an instance: the step
//! being filled, the latest snapshot per step and a back-stack. Each field
//! edit is appended to the Session Log immediately as a full snapshot of
//! the step; advancing evaluates the current step's in-memory snapshot.
//!
//! Other collaborators may append concurrently. The session does not see
//! their entries until [`ProtocolSession::refresh`]; edits made on a stale
//! view overwrite theirs for that step (last write wins).

use std::collections::BTreeMap;
use std::sync::Arc;

use pathway_core::{FieldType, ProtocolGraph, StepKind};
use pathway_storage::{DataEntryRecord, InstanceRecord};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::choice::normalize_selection;
use crate::error::SessionError;
use crate::log::SessionLog;
use crate::reconstruct::{resume, ResumePoint};
use crate::transition::next_step;
use crate::visibility::{evaluate_step, SessionScope, StepValues};

/// What a presentation layer needs to render the current step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepView {
    pub step_id: String,
    pub kind: StepKind,
    pub label: String,
    /// Visible field ids in display order.
    pub visible_fields: Vec<String>,
    /// Captured values of visible fields.
    pub values: StepValues,
    /// Where `advance` would go now; `None` when no transition applies yet
    /// or the step is terminal.
    pub next_step_id: Option<String>,
    /// Where `back` would go.
    pub previous_step_id: Option<String>,
    /// The step declares no transitions at all.
    pub terminal: bool,
}

pub struct ProtocolSession {
    graph: Arc<ProtocolGraph>,
    log: SessionLog,
    instance_id: String,
    author_id: String,
    current_step_id: String,
    values_by_step: BTreeMap<String, Value>,
    history: Vec<String>,
}

impl ProtocolSession {
    /// Open a fresh instance at the graph's initial step without reading
    /// the log.
    pub fn start(
        graph: Arc<ProtocolGraph>,
        log: SessionLog,
        instance: &InstanceRecord,
        author_id: &str,
    ) -> Result<Self, SessionError> {
        check_protocol(&graph, instance)?;
        let initial = graph.initial_step()?.id.clone();
        Ok(Self {
            graph,
            log,
            instance_id: instance.id.clone(),
            author_id: author_id.to_string(),
            current_step_id: initial,
            values_by_step: BTreeMap::new(),
            history: Vec::new(),
        })
    }

    /// Open an instance where its log says it left off.
    pub async fn resume(
        graph: Arc<ProtocolGraph>,
        log: SessionLog,
        instance: &InstanceRecord,
        author_id: &str,
    ) -> Result<Self, SessionError> {
        check_protocol(&graph, instance)?;
        let point = resume(&log, &graph, &instance.id).await?;
        info!(
            instance = %instance.id,
            author = %author_id,
            step = %point.current_step_id,
            "session resumed"
        );
        let mut session = Self {
            graph,
            log,
            instance_id: instance.id.clone(),
            author_id: author_id.to_string(),
            current_step_id: String::new(),
            values_by_step: BTreeMap::new(),
            history: Vec::new(),
        };
        session.apply(point);
        Ok(session)
    }

    /// Re-read the log, picking up other collaborators' entries. Position
    /// and history are recomputed from the log.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let point = resume(&self.log, &self.graph, &self.instance_id).await?;
        self.apply(point);
        Ok(())
    }

    fn apply(&mut self, point: ResumePoint) {
        self.current_step_id = point.current_step_id;
        self.values_by_step = point.values_by_step;
        self.history = point.history;
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Author every entry of this session is attributed to.
    pub fn author_id(&self) -> &str {
        &self.author_id
    }

    pub fn graph(&self) -> &ProtocolGraph {
        &self.graph
    }

    pub fn current_step_id(&self) -> &str {
        &self.current_step_id
    }

    pub fn values_by_step(&self) -> &BTreeMap<String, Value> {
        &self.values_by_step
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Raw snapshot of the current step.
    pub fn current_values(&self) -> StepValues {
        self.values_by_step
            .get(&self.current_step_id)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    /// Set one field of the current step and append the step's full
    /// snapshot to the log. Multiple-choice selections are normalised
    /// against exclusive options first.
    pub async fn edit_field(
        &mut self,
        field_id: &str,
        value: Value,
    ) -> Result<DataEntryRecord, SessionError> {
        let step = self.graph.step_by_id(&self.current_step_id)?;
        let field = step.field(field_id).ok_or_else(|| {
            SessionError::InvalidInput(format!(
                "step '{}' has no field '{}'",
                step.id, field_id
            ))
        })?;

        let mut snapshot = self.current_values();
        let value = if field.field_type == FieldType::MultipleChoice {
            let next = value.as_array().ok_or_else(|| {
                SessionError::InvalidInput(format!(
                    "field '{}' takes a list of selected values",
                    field_id
                ))
            })?;
            let previous = snapshot
                .get(field_id)
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Value::Array(normalize_selection(field, &previous, next))
        } else {
            value
        };
        snapshot.insert(field_id.to_string(), value);

        let snapshot = Value::Object(snapshot);
        let entry = self
            .log
            .append(
                &self.instance_id,
                &self.current_step_id,
                &self.author_id,
                snapshot.clone(),
            )
            .await?;
        self.values_by_step
            .insert(self.current_step_id.clone(), snapshot);
        Ok(entry)
    }

    /// Move to the next step. Returns the new step id, or `None` (and stays)
    /// when no transition applies yet or the step is terminal.
    pub fn advance(&mut self) -> Result<Option<String>, SessionError> {
        let step = self.graph.step_by_id(&self.current_step_id)?;
        let values = self.current_values();
        let Some(next) = next_step(step, &values) else {
            return Ok(None);
        };
        let next = next.to_string();
        debug!(
            instance = %self.instance_id,
            from = %self.current_step_id,
            to = %next,
            "advance"
        );
        let from = std::mem::replace(&mut self.current_step_id, next.clone());
        self.history.push(from);
        Ok(Some(next))
    }

    /// Return to the previous step, if any.
    pub fn back(&mut self) -> Option<String> {
        let previous = self.history.pop()?;
        self.current_step_id = previous.clone();
        Some(previous)
    }

    /// Render-ready state of the current step.
    pub fn view(&self) -> Result<StepView, SessionError> {
        let step = self.graph.step_by_id(&self.current_step_id)?;
        let raw = self.current_values();
        let scope = SessionScope::new(&self.graph, &self.values_by_step);
        let visibility = evaluate_step(step, &raw, &scope);

        Ok(StepView {
            step_id: step.id.clone(),
            kind: step.kind,
            label: step.label.clone(),
            visible_fields: visibility.field_ids(),
            values: visibility.values,
            next_step_id: next_step(step, &raw).map(str::to_string),
            previous_step_id: self.history.last().cloned(),
            terminal: step.is_terminal(),
        })
    }
}

fn check_protocol(graph: &ProtocolGraph, instance: &InstanceRecord) -> Result<(), SessionError> {
    if instance.protocol_graph_id != graph.id() {
        return Err(SessionError::InvalidInput(format!(
            "instance {} runs protocol '{}', not '{}'",
            instance.id,
            instance.protocol_graph_id,
            graph.id()
        )));
    }
    Ok(())
}
