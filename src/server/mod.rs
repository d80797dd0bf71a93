//! HTTP surface over the server store. GET-only; every parameter is JSON
//! text in the query string.

pub mod handlers;
pub mod params;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use rusqlite::Connection;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::error::TrackerError;

#[derive(Clone)]
pub struct AppState {
    pub conn: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(api::GET_TASKS, get(handlers::get_tasks))
        .route(api::ADD_TASK, get(handlers::add_task))
        .route(api::UPDATE_TASK, get(handlers::update_task))
        .route(api::DELETE_TASK, get(handlers::delete_task))
        .route(api::GET_PROJECTS, get(handlers::get_projects))
        .route(api::ADD_PROJECT, get(handlers::add_project))
        .route(api::UPDATE_PROJECT, get(handlers::update_project))
        .route(api::DELETE_PROJECT, get(handlers::delete_project))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves until Ctrl-C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<(), TrackerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| TrackerError::config(format!("Failed to bind {addr}: {e}")))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TrackerError::config(format!("Server error: {e}")))?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
