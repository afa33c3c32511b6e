//! `pathway.toml` settings.
//!
//! # Example
//!
//! ```toml
//! [log]
//! level = "info"
//!
//! [lifecycle]
//! policy = "permissive"
//!
//! [output]
//! format = "json"
//! ```
//!
//! Every section and key is optional. `RUST_LOG` takes precedence over
//! `[log] level`, and `--output` over `[output] format`.

use std::path::Path;

use pathway_eval::StatusPolicy;
use serde::{Deserialize, Serialize};

use crate::OutputFormat;

const DEFAULT_CONFIG_FILE: &str = "pathway.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PathwayConfig {
    pub log: LogSettings,
    pub lifecycle: LifecycleSettings,
    pub output: OutputSettings,
}

/// `[log]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LogSettings {
    /// Filter directive, e.g. `"warn"` or `"pathway_eval=debug"`.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// `[lifecycle]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct LifecycleSettings {
    pub policy: StatusPolicy,
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct OutputSettings {
    pub format: OutputFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
        }
    }
}

/// Read settings from `path`, or from `./pathway.toml` when no path is
/// given. A missing default file yields defaults; a missing explicit file
/// is an error.
pub(crate) fn read_config(path: Option<&Path>) -> Result<PathwayConfig, String> {
    let path = match path {
        Some(p) => p,
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(PathwayConfig::default());
            }
            default
        }
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("could not read '{}': {}", path.display(), e))?;
    parse_config(&content).map_err(|e| format!("could not parse '{}': {}", path.display(), e))
}

fn parse_config(content: &str) -> Result<PathwayConfig, toml::de::Error> {
    toml::from_str(content)
}
