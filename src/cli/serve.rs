use std::net::SocketAddr;

use anyhow::Context as _;

use crate::cli::Context;
use crate::db::connection;
use crate::error::TrackerError;
use crate::server::{self, AppState};

pub fn run(addr: Option<String>, ctx: &Context) -> Result<i32, TrackerError> {
    serve(addr, ctx).map_err(|e| match e.downcast::<TrackerError>() {
        Ok(err) => err,
        Err(other) => TrackerError::config(format!("{other:#}")),
    })?;
    Ok(0)
}

fn serve(addr: Option<String>, ctx: &Context) -> anyhow::Result<()> {
    let conn = connection::open_db(&ctx.config.server_db_path())?;
    let addr = match addr {
        Some(raw) => raw
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen address '{raw}'"))?,
        None => ctx.config.listen_addr()?,
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(server::serve(addr, AppState::new(conn)))?;
    Ok(())
}
