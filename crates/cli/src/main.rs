mod commands;
mod config;
mod logging;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Clinical protocol step-graph interpreter.
#[derive(Parser)]
#[command(
    name = "pathway",
    version,
    about = "Clinical protocol step-graph interpreter"
)]
struct Cli {
    /// Output format (text or json). Overrides `[output] format` in the config file
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Path to pathway.toml (default: ./pathway.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a protocol definition and check that it forms a valid step graph
    Validate {
        /// Path to the protocol definition JSON
        definition: PathBuf,
    },

    /// Evaluate which step follows a step given its captured values
    Next {
        /// Path to the protocol definition JSON
        definition: PathBuf,
        /// Step to evaluate
        #[arg(long)]
        step: String,
        /// Captured values of the step as a JSON object
        #[arg(long, default_value = "{}")]
        values: String,
    },

    /// List the visible fields of a step given its captured values
    Visible {
        /// Path to the protocol definition JSON
        definition: PathBuf,
        /// Step to evaluate
        #[arg(long)]
        step: String,
        /// Captured values of the step as a JSON object
        #[arg(long, default_value = "{}")]
        values: String,
    },

    /// Reconstruct the resumable state of an instance from its entry log
    Replay {
        /// Path to the protocol definition JSON
        definition: PathBuf,
        /// Entry log, one JSON entry per line
        #[arg(long)]
        log: PathBuf,
    },

    /// Run a scripted session against an in-memory store
    Simulate {
        /// Path to the protocol definition JSON
        definition: PathBuf,
        /// Path to the session script JSON
        #[arg(long)]
        script: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let settings = match config::read_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(msg) => {
            report_error(&msg, cli.output.unwrap_or(OutputFormat::Text), cli.quiet);
            process::exit(1);
        }
    };
    logging::init(&settings.log.level, cli.quiet);

    let output = cli.output.unwrap_or(settings.output.format);
    let quiet = cli.quiet;

    match cli.command {
        Commands::Validate { definition } => {
            commands::validate::cmd_validate(&definition, output, quiet);
        }
        Commands::Next {
            definition,
            step,
            values,
        } => {
            commands::evaluate::cmd_next(&definition, &step, &values, output, quiet);
        }
        Commands::Visible {
            definition,
            step,
            values,
        } => {
            commands::evaluate::cmd_visible(&definition, &step, &values, output, quiet);
        }
        Commands::Replay { definition, log } => {
            commands::replay::cmd_replay(&definition, &log, output, quiet);
        }
        Commands::Simulate { definition, script } => {
            commands::simulate::cmd_simulate(
                &definition,
                &script,
                settings.lifecycle.policy,
                output,
                quiet,
            );
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

/// Print a JSON document to stdout.
pub(crate) fn print_json(value: &impl Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value)
            .unwrap_or_else(|e| format!("serialization error: {}", e))
    );
}
