//! `simulate`: drive a scripted session against an in-memory store.
//!
//! A script names the patient and the opening author, then lists actions:
//!
//! ```json
//! {
//!   "patient": "PAC-0001",
//!   "author": "dr.silva",
//!   "actions": [
//!     { "edit": { "field": "nome_paciente", "value": "Maria" } },
//!     "advance",
//!     { "wait": { "seconds": 600 } },
//!     { "as": { "author": "enf.costa" } },
//!     "back",
//!     { "complete": { "outcome": "alta" } }
//!   ]
//! }
//! ```
//!
//! The clock is manual and moves one second per action, so a script
//! replays identically every run.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::macros::datetime;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};

use pathway_core::ProtocolGraph;
use pathway_eval::{
    LifecycleManager, ManualClock, ProtocolSession, SessionError, SessionLog, StatusPolicy,
    StepView,
};
use pathway_storage::{InstanceRecord, InstanceStatus, MemoryStore};

use super::{load_graph_or_exit, or_exit, read_json};
use crate::{print_json, OutputFormat};

const SCRIPT_EPOCH: OffsetDateTime = datetime!(2025-01-01 08:00 UTC);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Script {
    patient: String,
    author: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    start_at: Option<OffsetDateTime>,
    #[serde(default)]
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Action {
    Edit {
        field: String,
        value: serde_json::Value,
    },
    Advance,
    Back,
    Pause,
    Resume,
    Complete {
        #[serde(default)]
        outcome: Option<String>,
    },
    SetStatus {
        status: InstanceStatus,
        #[serde(default)]
        outcome: Option<String>,
    },
    Wait {
        seconds: i64,
    },
    /// Hand the instance to another collaborator, who resumes from the log.
    As {
        author: String,
    },
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::Edit { .. } => "edit",
            Action::Advance => "advance",
            Action::Back => "back",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Complete { .. } => "complete",
            Action::SetStatus { .. } => "set_status",
            Action::Wait { .. } => "wait",
            Action::As { .. } => "as",
        }
    }
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    instance: InstanceRecord,
    view: StepView,
    history: Vec<String>,
    /// Every step the session stood on, in order, repeats included.
    visited: Vec<String>,
    entries: usize,
}

pub(crate) fn cmd_simulate(
    definition: &Path,
    script_path: &Path,
    policy: StatusPolicy,
    output: OutputFormat,
    quiet: bool,
) {
    let graph = load_graph_or_exit(definition, output, quiet);
    let script = or_exit(read_script(script_path), output, quiet);

    let runtime = or_exit(
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("error starting runtime: {}", e)),
        output,
        quiet,
    );
    let report = or_exit(
        runtime.block_on(run_script(Arc::new(graph), script, policy)),
        output,
        quiet,
    );

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => print_report(&report),
    }
}

fn read_script(path: &Path) -> Result<Script, String> {
    let doc = read_json(path)?;
    serde_json::from_value(doc)
        .map_err(|e| format!("invalid script '{}': {}", path.display(), e))
}

async fn run_script(
    graph: Arc<ProtocolGraph>,
    script: Script,
    policy: StatusPolicy,
) -> Result<SimulationReport, String> {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(script.start_at.unwrap_or(SCRIPT_EPOCH)));
    let log = SessionLog::new(store.clone(), clock.clone());
    let lifecycle = LifecycleManager::new(store, clock.clone(), policy);

    let instance = lifecycle
        .create(graph.id(), &script.patient)
        .await
        .map_err(|e| format!("error creating instance: {}", e))?;
    lifecycle
        .ensure_collaborator(&instance.id, &script.author)
        .await
        .map_err(|e| e.to_string())?;

    let mut session = ProtocolSession::start(graph.clone(), log.clone(), &instance, &script.author)
        .map_err(|e| e.to_string())?;
    let mut visited = vec![session.current_step_id().to_string()];

    for (i, action) in script.actions.iter().enumerate() {
        clock.advance(Duration::seconds(1));
        debug!(index = i, action = action.name(), step = %session.current_step_id(), "script action");

        let step_before = session.current_step_id().to_string();
        apply(&mut session, action, &lifecycle, &log, &graph, &clock)
            .await
            .map_err(|e| format!("action {} ({}): {}", i, action.name(), e))?;
        if session.current_step_id() != step_before {
            visited.push(session.current_step_id().to_string());
        }
    }

    let instance = lifecycle
        .get(session.instance_id())
        .await
        .map_err(|e| e.to_string())?;
    let entries = log
        .entries_for(&instance.id)
        .await
        .map_err(|e| e.to_string())?
        .len();
    let view = session.view().map_err(|e| e.to_string())?;
    info!(
        instance = %instance.id,
        status = %instance.status,
        entries,
        "simulation finished"
    );

    Ok(SimulationReport {
        instance,
        view,
        history: session.history().to_vec(),
        visited,
        entries,
    })
}

async fn apply(
    session: &mut ProtocolSession,
    action: &Action,
    lifecycle: &LifecycleManager,
    log: &SessionLog,
    graph: &Arc<ProtocolGraph>,
    clock: &ManualClock,
) -> Result<(), SessionError> {
    let instance_id = session.instance_id().to_string();
    let author_id = session.author_id().to_string();
    match action {
        Action::Edit { field, value } => {
            session.edit_field(field, value.clone()).await?;
        }
        Action::Advance => {
            session.advance()?;
        }
        Action::Back => {
            session.back();
        }
        Action::Pause => {
            lifecycle.pause(&instance_id, &author_id).await?;
        }
        Action::Resume => {
            lifecycle.resume(&instance_id, &author_id).await?;
        }
        Action::Complete { outcome } => {
            lifecycle
                .complete(&instance_id, &author_id, outcome.clone())
                .await?;
        }
        Action::SetStatus { status, outcome } => {
            lifecycle
                .set_status(&instance_id, &author_id, *status, outcome.clone())
                .await?;
        }
        Action::Wait { seconds } => {
            clock.advance(Duration::seconds(*seconds));
        }
        Action::As { author } => {
            let instance = lifecycle.ensure_collaborator(&instance_id, author).await?;
            *session =
                ProtocolSession::resume(graph.clone(), log.clone(), &instance, author).await?;
        }
    }
    Ok(())
}

fn print_report(report: &SimulationReport) {
    let instance = &report.instance;
    println!("instance:  {} ({})", instance.id, instance.status);
    println!("patient:   {}", instance.patient_identifier);
    if let Some(outcome) = &instance.outcome {
        println!("outcome:   {}", outcome);
    }
    println!("authors:   {}", instance.collaborators.join(", "));
    println!("entries:   {}", report.entries);
    println!("visited:   {}", report.visited.join(" -> "));

    let view = &report.view;
    let position = if view.terminal { " (terminal)" } else { "" };
    println!("current:   {}{}", view.step_id, position);
    if !view.visible_fields.is_empty() {
        println!("fields:    {}", view.visible_fields.join(", "));
    }
    if let Some(next) = &view.next_step_id {
        println!("next:      {}", next);
    }
}
