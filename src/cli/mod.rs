pub mod commands;
pub mod init;
pub mod project;
pub mod queue;
pub mod serve;
pub mod sync;
pub mod task;

pub use commands::*;

use std::path::Path;

use serde_json::Value;

use crate::config::Config;
use crate::error::TrackerError;
use crate::output;

/// Per-invocation settings shared by every subcommand.
pub struct Context {
    pub json_output: bool,
    pub config: Config,
}

impl Context {
    pub fn load(json_output: bool, data_dir: Option<&Path>) -> Result<Self, TrackerError> {
        Ok(Self {
            json_output,
            config: Config::load(data_dir)?,
        })
    }
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Error: failed to render JSON: {e}"),
    }
}

/// Maps a command result to an exit code, printing the error the way the
/// caller asked for.
pub fn finish(result: Result<i32, TrackerError>, json_output: bool) -> i32 {
    match result {
        Ok(code) => code,
        Err(e) => {
            if json_output {
                print_json(&output::json::error(&e));
            } else {
                eprintln!("Error: {}", e.message);
            }
            1
        }
    }
}

/// Resolves a full ID or a unique ID prefix against `ids`.
pub fn resolve_id<'a>(
    ids: impl IntoIterator<Item = &'a str>,
    reference: &str,
    not_found: impl FnOnce(&str) -> TrackerError,
) -> Result<String, TrackerError> {
    let mut candidates = Vec::new();
    for id in ids {
        if id == reference {
            return Ok(id.to_string());
        }
        if id.starts_with(reference) {
            candidates.push(id.to_string());
        }
    }
    match candidates.len() {
        0 => Err(not_found(reference)),
        1 => Ok(candidates.remove(0)),
        _ => Err(TrackerError::ambiguous_ref(reference, &candidates)),
    }
}
