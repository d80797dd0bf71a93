use serde_json::json;

use crate::cli::{print_json, Context};
use crate::client;
use crate::error::TrackerError;
use crate::output;

pub fn run(refresh: bool, wait: bool, ctx: &Context) -> Result<i32, TrackerError> {
    let mirror = client::open(&ctx.config)?;
    if refresh {
        mirror.refresh_tasks()?;
        mirror.refresh_projects()?;
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TrackerError::config(format!("Failed to start runtime: {e}")))?;
    let mut driver = client::http_driver(&ctx.config, mirror.queue().clone())?;
    let report = runtime.block_on(driver.drain(wait))?;
    tracing::info!(
        delivered = report.delivered,
        failed = report.failed,
        pending = report.pending,
        "sync finished"
    );

    if ctx.json_output {
        print_json(&output::json::success(json!({
            "report": output::json::report_json(&report)
        })));
    } else {
        output::text::print_report(&report);
    }
    // Pending requests stay queued for the next sync.
    Ok(0)
}
