use serde_json::json;

use crate::cli::{print_json, Context};
use crate::client;
use crate::error::TrackerError;
use crate::output;

pub fn run(ctx: &Context) -> Result<i32, TrackerError> {
    let mirror = client::open(&ctx.config)?;
    let entries = mirror.queue().pending();
    if ctx.json_output {
        print_json(&output::json::success(json!({
            "queue": output::json::queue_json(&entries)
        })));
    } else {
        output::text::print_queue(&entries);
    }
    Ok(0)
}
