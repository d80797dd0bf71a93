use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TrackerError;
use crate::models::coerce;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub description: String,
    pub position: i64,
    pub progress: f64,
    pub progress_done_on: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.progress >= 1.0
    }

    /// Stamps `progress_done_on` on the transition to done and clears it
    /// whenever the task is not done.
    pub fn set_progress(&mut self, progress: f64, now: DateTime<Utc>) {
        let was_done = self.is_done() && self.progress_done_on.is_some();
        self.progress = progress;
        if !self.is_done() {
            self.progress_done_on = None;
        } else if !was_done {
            self.progress_done_on = Some(now);
        }
    }

    /// Applies every non-position field of `patch`. Position changes go
    /// through [`crate::position`] so the ordering stays dense.
    pub fn apply_patch(&mut self, patch: &TaskPatch, now: DateTime<Utc>) {
        if let Some(ref description) = patch.description {
            self.description = description.clone();
        }
        if let Some(progress) = patch.progress {
            self.set_progress(progress, now);
        }
        if let Some(ref project_id) = patch.project_id {
            self.project_id = project_id.clone();
        }
    }
}

/// Fields a client may change through `updateTask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskField {
    Description,
    Position,
    Progress,
    ProjectId,
}

impl TaskField {
    pub const ALL: [TaskField; 4] = [
        Self::Description,
        Self::Position,
        Self::Progress,
        Self::ProjectId,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Description => "description",
            Self::Position => "position",
            Self::Progress => "progress",
            Self::ProjectId => "projectId",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// A task as submitted for creation, before it has a definite position.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub id: Option<String>,
    pub description: String,
    pub position: Option<i64>,
    pub progress: f64,
    pub project_id: Option<String>,
}

impl NewTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            id: None,
            description: description.into(),
            position: None,
            progress: 0.0,
            project_id: None,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, TrackerError> {
        let obj = value
            .as_object()
            .ok_or_else(|| TrackerError::validation("newTask must be an object"))?;
        let progress = match obj.get("progress") {
            None | Some(Value::Null) => 0.0,
            Some(v) => coerce::progress(v)?,
        };
        let position = match obj.get("position") {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce::position(v)?),
        };
        Ok(Self {
            id: coerce::optional_text("id", obj.get("id"))?,
            description: coerce::required_text("description", obj.get("description"))?,
            position,
            progress,
            project_id: coerce::optional_text("projectId", obj.get("projectId"))?,
        })
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.description.trim().is_empty() {
            return Err(TrackerError::validation("description must not be empty"));
        }
        if !(0.0..=1.0).contains(&self.progress) {
            return Err(TrackerError::validation("progress must be between 0 and 1"));
        }
        Ok(())
    }

    pub fn into_task(self, id: String, position: i64, now: DateTime<Utc>) -> Task {
        let mut task = Task {
            id,
            description: self.description,
            position,
            progress: 0.0,
            progress_done_on: None,
            project_id: self.project_id,
        };
        task.set_progress(self.progress, now);
        task
    }
}

/// A validated partial update of a task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub description: Option<String>,
    pub position: Option<i64>,
    pub progress: Option<f64>,
    /// `Some(None)` detaches the task from its project.
    pub project_id: Option<Option<String>>,
}

impl TaskPatch {
    pub fn from_properties(value: &Value) -> Result<Self, TrackerError> {
        let obj = value
            .as_object()
            .ok_or_else(|| TrackerError::validation("properties must be an object"))?;
        if obj.is_empty() {
            return Err(TrackerError::validation("No properties to update"));
        }

        let mut patch = Self::default();
        for (key, v) in obj {
            let field = TaskField::from_str(key).ok_or_else(|| {
                TrackerError::validation(format!("Unknown task property to update: {key}"))
            })?;
            match field {
                TaskField::Description => {
                    patch.description = Some(coerce::required_text("description", Some(v))?);
                }
                TaskField::Position => patch.position = Some(coerce::position(v)?),
                TaskField::Progress => patch.progress = Some(coerce::progress(v)?),
                TaskField::ProjectId => {
                    patch.project_id = Some(coerce::optional_text("projectId", Some(v))?);
                }
            }
        }
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.position.is_none()
            && self.progress.is_none()
            && self.project_id.is_none()
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.is_empty() {
            return Err(TrackerError::validation("No properties to update"));
        }
        // Round-tripping through the wire form applies the same checks the
        // server will.
        Self::from_properties(&self.to_properties()).map(|_| ())
    }

    pub fn to_properties(&self) -> Value {
        let mut obj = Map::new();
        if let Some(ref description) = self.description {
            obj.insert(TaskField::Description.as_str().into(), description.clone().into());
        }
        if let Some(position) = self.position {
            obj.insert(TaskField::Position.as_str().into(), position.into());
        }
        if let Some(progress) = self.progress {
            obj.insert(TaskField::Progress.as_str().into(), progress.into());
        }
        if let Some(ref project_id) = self.project_id {
            obj.insert(
                TaskField::ProjectId.as_str().into(),
                project_id.clone().map_or(Value::Null, Value::from),
            );
        }
        Value::Object(obj)
    }
}
