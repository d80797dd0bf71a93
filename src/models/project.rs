use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TrackerError;
use crate::models::coerce;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub color: String,
}

impl Project {
    /// Case-insensitive substring match of any tag against a task description.
    pub fn matches(&self, description: &str) -> bool {
        let haystack = description.to_lowercase();
        self.tags
            .iter()
            .any(|tag| haystack.contains(&tag.to_lowercase()))
    }

    pub fn apply_patch(&mut self, patch: &ProjectPatch) {
        if let Some(ref name) = patch.name {
            self.name = name.clone();
        }
        if let Some(ref tags) = patch.tags {
            self.tags = tags.clone();
        }
        if let Some(ref color) = patch.color {
            self.color = color.clone();
        }
    }
}

/// First project whose tags match `description`, used to auto-colour tasks.
pub fn project_for_description<'a>(projects: &'a [Project], description: &str) -> Option<&'a Project> {
    projects.iter().find(|p| p.matches(description))
}

/// Fields a client may change through `updateProject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectField {
    Name,
    Tags,
    Color,
}

impl ProjectField {
    pub const ALL: [ProjectField; 3] = [Self::Name, Self::Tags, Self::Color];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Tags => "tags",
            Self::Color => "color",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub id: Option<String>,
    pub name: String,
    pub tags: Vec<String>,
    pub color: String,
}

impl NewProject {
    pub fn from_value(value: &Value) -> Result<Self, TrackerError> {
        let obj = value
            .as_object()
            .ok_or_else(|| TrackerError::validation("newProject must be an object"))?;
        Ok(Self {
            id: coerce::optional_text("id", obj.get("id"))?,
            name: coerce::required_text("name", obj.get("name"))?,
            tags: coerce::tags(obj.get("tags"))?,
            color: coerce::required_text("color", obj.get("color"))?,
        })
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        let v = serde_json::json!({
            "name": self.name,
            "tags": self.tags,
            "color": self.color,
        });
        Self::from_value(&v).map(|_| ())
    }

    pub fn into_project(self, id: String) -> Project {
        Project {
            id,
            name: self.name,
            tags: self.tags,
            color: self.color,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub color: Option<String>,
}

impl ProjectPatch {
    pub fn from_properties(value: &Value) -> Result<Self, TrackerError> {
        let obj = value
            .as_object()
            .ok_or_else(|| TrackerError::validation("properties must be an object"))?;
        if obj.is_empty() {
            return Err(TrackerError::validation("No properties to update"));
        }

        let mut patch = Self::default();
        for (key, v) in obj {
            let field = ProjectField::from_str(key).ok_or_else(|| {
                TrackerError::validation(format!("Unknown project property to update: {key}"))
            })?;
            match field {
                ProjectField::Name => patch.name = Some(coerce::required_text("name", Some(v))?),
                ProjectField::Tags => patch.tags = Some(coerce::tags(Some(v))?),
                ProjectField::Color => patch.color = Some(coerce::required_text("color", Some(v))?),
            }
        }
        Ok(patch)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        Self::from_properties(&self.to_properties()).map(|_| ())
    }

    pub fn to_properties(&self) -> Value {
        let mut obj = Map::new();
        if let Some(ref name) = self.name {
            obj.insert(ProjectField::Name.as_str().into(), name.clone().into());
        }
        if let Some(ref tags) = self.tags {
            obj.insert(ProjectField::Tags.as_str().into(), tags.clone().into());
        }
        if let Some(ref color) = self.color {
            obj.insert(ProjectField::Color.as_str().into(), color.clone().into());
        }
        Value::Object(obj)
    }
}
