use serde_json::json;

use crate::cli::commands::ProjectCommands;
use crate::cli::{print_json, resolve_id, Context};
use crate::client::{self, mirror::LocalMirror};
use crate::error::TrackerError;
use crate::models::{NewProject, ProjectPatch};
use crate::output;

pub fn run(cmd: ProjectCommands, ctx: &Context) -> Result<i32, TrackerError> {
    let mirror = client::open(&ctx.config)?;
    match cmd {
        ProjectCommands::Add { name, color, tags } => {
            let id = ulid::Ulid::new().to_string();
            let new_project = NewProject { id: Some(id.clone()), name, tags, color };
            let projects = mirror.add_project(new_project)?;
            report(&mirror, projects.iter().find(|p| p.id == id), &id, "Added", ctx)
        }
        ProjectCommands::List => {
            let projects = mirror.projects();
            if ctx.json_output {
                print_json(&output::json::success(json!({
                    "projects": output::json::projects_json(&projects)
                })));
            } else {
                output::text::print_project_list(&projects);
            }
            Ok(0)
        }
        ProjectCommands::Update { id, name, color, tags } => {
            let id = resolve_project_id(&mirror, &id)?;
            let patch = ProjectPatch {
                name,
                color,
                tags: (!tags.is_empty()).then_some(tags),
            };
            let projects = mirror.update_project(&id, patch)?;
            report(&mirror, projects.iter().find(|p| p.id == id), &id, "Updated", ctx)
        }
        ProjectCommands::Delete { id } => {
            let id = resolve_project_id(&mirror, &id)?;
            mirror.delete_project(&id)?;
            if ctx.json_output {
                print_json(&output::json::success(json!({
                    "deleted": id,
                    "queued": mirror.queue().len()
                })));
            } else {
                println!("Deleted project {id}");
            }
            Ok(0)
        }
    }
}

fn resolve_project_id(mirror: &LocalMirror, reference: &str) -> Result<String, TrackerError> {
    let projects = mirror.projects();
    resolve_id(
        projects.iter().map(|p| p.id.as_str()),
        reference,
        TrackerError::project_not_found,
    )
}

fn report(
    mirror: &LocalMirror,
    project: Option<&crate::models::Project>,
    id: &str,
    verb: &str,
    ctx: &Context,
) -> Result<i32, TrackerError> {
    let project = project.ok_or_else(|| TrackerError::project_not_found(id))?;
    if ctx.json_output {
        print_json(&output::json::success(json!({
            "project": output::json::project_json(project),
            "queued": mirror.queue().len()
        })));
    } else {
        println!("{verb} project: {} ({})", project.name, project.id);
    }
    Ok(0)
}
