use std::path::Path;
use std::process;

use pathway_core::GraphError;

use super::{load_graph, GraphLoadError};
use crate::{print_json, report_error, OutputFormat};

pub(crate) fn cmd_validate(definition: &Path, output: OutputFormat, quiet: bool) {
    match load_graph(definition) {
        Ok(graph) => {
            if quiet {
                return;
            }
            match output {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "valid": true,
                    "id": graph.id(),
                    "title": graph.title(),
                    "initial_step": graph.initial_step_id(),
                    "steps": graph.steps().len(),
                    "fields": graph.field_count(),
                })),
                OutputFormat::Text => {
                    println!(
                        "valid: {} ({} steps, {} fields)",
                        graph.id(),
                        graph.steps().len(),
                        graph.field_count()
                    );
                }
            }
        }
        Err(GraphLoadError::Graph(GraphError::GraphIntegrity {
            graph_id,
            violations,
        })) => {
            if !quiet {
                match output {
                    OutputFormat::Json => print_json(&serde_json::json!({
                        "valid": false,
                        "id": graph_id,
                        "violations": violations,
                    })),
                    OutputFormat::Text => {
                        println!(
                            "invalid: {} ({} violation{})",
                            definition.display(),
                            violations.len(),
                            if violations.len() == 1 { "" } else { "s" }
                        );
                        for v in &violations {
                            println!("  {}", v);
                        }
                    }
                }
            }
            process::exit(1);
        }
        Err(e) => {
            report_error(&e.to_string(), output, quiet);
            process::exit(1);
        }
    }
}
