use rusqlite::{params, Connection};

use crate::error::TrackerError;
use crate::models::{NewProject, Project, ProjectPatch};

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>, TrackerError> {
    let mut stmt = conn.prepare("SELECT id, name, tags, color FROM projects ORDER BY rowid ASC")?;
    let rows = stmt
        .query_map([], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(decode).collect()
}

pub fn get_project_by_id(conn: &Connection, id: &str) -> Result<Project, TrackerError> {
    let row = conn
        .query_row(
            "SELECT id, name, tags, color FROM projects WHERE id = ?1",
            params![id],
            row_to_project,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => TrackerError::project_not_found(id),
            _ => TrackerError::from(e),
        })?;
    decode(row)
}

pub fn create_project(conn: &Connection, new_project: NewProject) -> Result<Project, TrackerError> {
    new_project.validate()?;
    let id = new_project
        .id
        .clone()
        .unwrap_or_else(|| ulid::Ulid::new().to_string());
    let project = new_project.into_project(id);
    conn.execute(
        "INSERT INTO projects (id, name, tags, color) VALUES (?1, ?2, ?3, ?4)",
        params![
            project.id,
            project.name,
            serde_json::to_string(&project.tags)?,
            project.color
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(ref f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            TrackerError::validation(format!("Project id already exists: {}", project.id))
        }
        _ => TrackerError::from(e),
    })?;
    Ok(project)
}

pub fn update_project(
    conn: &Connection,
    id: &str,
    patch: &ProjectPatch,
) -> Result<Project, TrackerError> {
    patch.validate()?;
    let mut project = get_project_by_id(conn, id)?;
    project.apply_patch(patch);
    conn.execute(
        "UPDATE projects SET name = ?2, tags = ?3, color = ?4 WHERE id = ?1",
        params![
            project.id,
            project.name,
            serde_json::to_string(&project.tags)?,
            project.color
        ],
    )?;
    Ok(project)
}

/// Tasks referencing the project are left as they are.
pub fn delete_project(conn: &Connection, id: &str) -> Result<(), TrackerError> {
    let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(TrackerError::project_not_found(id));
    }
    Ok(())
}

type ProjectRow = (String, String, String, String);

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<ProjectRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode((id, name, tags, color): ProjectRow) -> Result<Project, TrackerError> {
    let tags = serde_json::from_str(&tags)
        .map_err(|e| TrackerError::database(format!("Corrupt tags for project {id}: {e}")))?;
    Ok(Project { id, name, tags, color })
}
