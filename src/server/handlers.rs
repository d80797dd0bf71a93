//! `/api/*` handlers. Each one decodes its query parameters, runs the store
//! operation under the connection lock and answers with JSON or an empty 200.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::{project_repo, task_repo};
use crate::error::{ErrorCode, TrackerError};
use crate::models::{NewProject, NewTask, Project, ProjectPatch, Task, TaskPatch};
use crate::server::params::{required_id, required_json, QueryParams};
use crate::server::AppState;

/// Error response: status derived from the error code, JSON body
/// `{"code": ..., "message": ...}`.
#[derive(Debug)]
pub struct ApiError(pub TrackerError);

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.code {
            ErrorCode::ValidationError | ErrorCode::MissingParameter | ErrorCode::InvalidRequest => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::TaskNotFound | ErrorCode::ProjectNotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(code = self.0.code.as_str(), error = %self.0, "request failed");
        } else {
            tracing::debug!(code = self.0.code.as_str(), error = %self.0, "request rejected");
        }
        let body = json!({ "code": self.0.code.as_str(), "message": self.0.message });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn get_tasks(State(state): State<AppState>) -> ApiResult<Json<Vec<Task>>> {
    let conn = state.conn.lock().await;
    Ok(Json(task_repo::list_tasks(&conn)?))
}

pub async fn add_task(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let new_task = NewTask::from_value(&required_json(&params, "newTask")?)?;
    let conn = state.conn.lock().await;
    let task = task_repo::create_task(&conn, new_task)?;
    tracing::info!(id = %task.id, position = task.position, "task added");
    Ok(StatusCode::OK)
}

pub async fn update_task(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let id = required_id(&params, "taskId")?;
    let patch = TaskPatch::from_properties(&required_json(&params, "properties")?)?;
    let conn = state.conn.lock().await;
    let task = task_repo::update_task(&conn, &id, &patch)?;
    tracing::info!(id = %task.id, position = task.position, "task updated");
    Ok(StatusCode::OK)
}

pub async fn delete_task(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let id = required_id(&params, "taskId")?;
    let conn = state.conn.lock().await;
    task_repo::delete_task(&conn, &id)?;
    tracing::info!(id = %id, "task deleted");
    Ok(StatusCode::OK)
}

pub async fn get_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    let conn = state.conn.lock().await;
    Ok(Json(project_repo::list_projects(&conn)?))
}

pub async fn add_project(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let new_project = NewProject::from_value(&required_json(&params, "newProject")?)?;
    let conn = state.conn.lock().await;
    let project = project_repo::create_project(&conn, new_project)?;
    tracing::info!(id = %project.id, "project added");
    Ok(StatusCode::OK)
}

pub async fn update_project(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let id = required_id(&params, "projectId")?;
    let patch = ProjectPatch::from_properties(&required_json(&params, "properties")?)?;
    let conn = state.conn.lock().await;
    project_repo::update_project(&conn, &id, &patch)?;
    tracing::info!(id = %id, "project updated");
    Ok(StatusCode::OK)
}

pub async fn delete_project(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let id = required_id(&params, "projectId")?;
    let conn = state.conn.lock().await;
    project_repo::delete_project(&conn, &id)?;
    tracing::info!(id = %id, "project deleted");
    Ok(StatusCode::OK)
}

pub async fn not_found() -> Response {
    let body = json!({ "code": "NOT_FOUND", "message": "Not Found" });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
