use serde_json::{json, Value};

use crate::client::driver::DrainReport;
use crate::error::TrackerError;
use crate::models::{project_for_description, Project, QueuedRequest, Task};

pub fn success(data: Value) -> Value {
    json!({
        "success": true,
        "data": data
    })
}

pub fn error(err: &TrackerError) -> Value {
    json!({
        "success": false,
        "error": {
            "code": err.code.as_str(),
            "message": err.message
        }
    })
}

/// Task with the id of the project its description matches, if any.
pub fn task_json(t: &Task, projects: &[Project]) -> Value {
    let mut v = json!({
        "id": t.id,
        "description": t.description,
        "position": t.position,
        "progress": t.progress,
        "progressDoneOn": t.progress_done_on,
        "projectId": t.project_id,
    });
    if let Some(p) = project_for_description(projects, &t.description) {
        v["matchedProject"] = json!({ "id": p.id, "color": p.color });
    }
    v
}

pub fn tasks_json(tasks: &[Task], projects: &[Project]) -> Value {
    Value::Array(tasks.iter().map(|t| task_json(t, projects)).collect())
}

pub fn project_json(p: &Project) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "tags": p.tags,
        "color": p.color
    })
}

pub fn projects_json(projects: &[Project]) -> Value {
    Value::Array(projects.iter().map(project_json).collect())
}

pub fn queue_json(entries: &[QueuedRequest]) -> Value {
    Value::Array(
        entries
            .iter()
            .map(|e| json!({ "id": e.id, "url": e.url, "tail": e.tail }))
            .collect(),
    )
}

pub fn report_json(r: &DrainReport) -> Value {
    let mut v = json!({
        "delivered": r.delivered,
        "failed": r.failed,
        "pending": r.pending
    });
    if let Some(ref e) = r.stalled_on {
        v["stalled_on"] = json!({ "code": e.code.as_str(), "message": e.message });
    }
    v
}
