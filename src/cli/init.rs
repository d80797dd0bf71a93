use std::fs;

use serde_json::json;

use crate::cli::{print_json, Context};
use crate::client::storage::SqliteStore;
use crate::db::connection;
use crate::error::TrackerError;
use crate::output;

/// Safe to re-run: existing databases are migrated in place and an existing
/// `config.json` is left alone.
pub fn run(ctx: &Context) -> Result<i32, TrackerError> {
    let config = &ctx.config;
    fs::create_dir_all(&config.data_dir).map_err(|e| {
        TrackerError::storage(format!("Failed to create {}: {e}", config.data_dir.display()))
    })?;

    connection::init_db(&config.server_db_path())?;
    SqliteStore::open(&config.client_db_path())?;
    let wrote_config = !config.config_path().exists();
    if wrote_config {
        config.save()?;
    }
    tracing::info!(dir = %config.data_dir.display(), "initialized data directory");

    if ctx.json_output {
        print_json(&output::json::success(json!({
            "path": config.data_dir.to_string_lossy(),
            "configCreated": wrote_config
        })));
    } else {
        println!("Initialized tasktrack at {}", config.data_dir.display());
    }
    Ok(0)
}
