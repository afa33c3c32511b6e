//! `next` and `visible`: the pure evaluators on one step.

use std::path::Path;

use pathway_eval::{evaluate_step, next_step, NoValues};

use super::{load_graph_or_exit, or_exit, parse_values};
use crate::{print_json, OutputFormat};

pub(crate) fn cmd_next(
    definition: &Path,
    step_id: &str,
    values: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let graph = load_graph_or_exit(definition, output, quiet);
    let values = or_exit(parse_values(values), output, quiet);
    let step = or_exit(
        graph.step_by_id(step_id).map_err(|e| e.to_string()),
        output,
        quiet,
    );

    let next = next_step(step, &values);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "step": step.id,
            "next": next,
            "terminal": next.is_none(),
        })),
        OutputFormat::Text => match next {
            Some(target) => println!("{}", target),
            None => println!("(terminal)"),
        },
    }
}

pub(crate) fn cmd_visible(
    definition: &Path,
    step_id: &str,
    values: &str,
    output: OutputFormat,
    quiet: bool,
) {
    let graph = load_graph_or_exit(definition, output, quiet);
    let values = or_exit(parse_values(values), output, quiet);
    let step = or_exit(
        graph.step_by_id(step_id).map_err(|e| e.to_string()),
        output,
        quiet,
    );

    let visibility = evaluate_step(step, &values, &NoValues);
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => print_json(&serde_json::json!({
            "step": step.id,
            "visible": visibility.field_ids(),
            "values": visibility.values,
        })),
        OutputFormat::Text => {
            for field in &visibility.fields {
                println!("{}\t{}\t{}", field.id, field.field_type.as_str(), field.label);
            }
        }
    }
}
