//! `replay`: derive the resumable position of an instance from an
//! exported entry log.
//!
//! The log is newline-delimited JSON, one entry per line. A line without a
//! timestamp takes the time of the line before it, so it stays right after
//! that line once the log is ordered; leading untimed lines sit at the epoch.

use std::path::Path;

use serde::Deserialize;
use time::OffsetDateTime;

use pathway_eval::{reconstruct, ResumePoint};
use pathway_storage::DataEntryRecord;

use super::{load_graph_or_exit, or_exit};
use crate::{print_json, OutputFormat};

#[derive(Debug, Deserialize)]
struct LogLine {
    #[serde(alias = "stepId")]
    step_id: String,
    #[serde(default, alias = "authorId")]
    author_id: String,
    value: serde_json::Value,
    #[serde(default, alias = "createdAt", with = "time::serde::rfc3339::option")]
    created_at: Option<OffsetDateTime>,
}

pub(crate) fn cmd_replay(definition: &Path, log: &Path, output: OutputFormat, quiet: bool) {
    let graph = load_graph_or_exit(definition, output, quiet);
    let mut entries = or_exit(read_log(log, graph.id()), output, quiet);
    entries.sort_by_key(|e| e.order_key());
    tracing::debug!(entries = entries.len(), log = %log.display(), "replaying entry log");

    let point = reconstruct(&graph, &entries);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&point),
        OutputFormat::Text => print_point(&point, entries.len()),
    }
}

fn read_log(path: &Path, instance_id: &str) -> Result<Vec<DataEntryRecord>, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("error reading log '{}': {}", path.display(), e))?;

    let mut entries = Vec::new();
    let mut last_seen = OffsetDateTime::UNIX_EPOCH;
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let parsed: LogLine = serde_json::from_str(line)
            .map_err(|e| format!("{}:{}: invalid entry: {}", path.display(), i + 1, e))?;
        let created_at = parsed.created_at.unwrap_or(last_seen);
        last_seen = created_at;
        entries.push(DataEntryRecord {
            seq: i as u64,
            instance_id: instance_id.to_string(),
            step_id: parsed.step_id,
            author_id: parsed.author_id,
            value: parsed.value,
            created_at,
        });
    }
    Ok(entries)
}

fn print_point(point: &ResumePoint, entry_count: usize) {
    println!("current step: {}", point.current_step_id);
    match &point.last_step_id {
        Some(last) => println!("last entry:   {} ({} entries)", last, entry_count),
        None => println!("last entry:   none"),
    }
    if !point.history.is_empty() {
        println!("history:      {}", point.history.join(" -> "));
    }
    let captured: Vec<&str> = point.values_by_step.keys().map(String::as_str).collect();
    if !captured.is_empty() {
        println!("captured:     {}", captured.join(", "));
    }
}
