//! # Cadenza Config
//!
//! Loading of declarative command packs and plan files.
//!
//! Definitions live in JSON documents. A malformed file or record is
//! skipped with a diagnostic; startup never fails because of one bad
//! definition. A document-level `namespace` prefixes every format and plan
//! name in the document with `ns:`.

mod commands;
mod plans;

use thiserror::Error;

pub use commands::{
    command_filename, load_command_packs, parse_command_pack, save_command_record,
    COMMANDS_FILE_EXTENSION,
};
pub use plans::{load_plans, parse_plan_pack, save_plans};

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid definition: {0}")]
    Invalid(String),
}

fn namespaced(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(namespace) if !namespace.is_empty() => format!("{namespace}:{name}"),
        _ => name.to_string(),
    }
}
