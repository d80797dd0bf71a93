use serde_json::json;

use crate::cli::commands::TaskCommands;
use crate::cli::{print_json, resolve_id, Context};
use crate::client::{self, mirror::LocalMirror};
use crate::error::TrackerError;
use crate::models::{NewTask, Task, TaskPatch};
use crate::output;

pub fn run(cmd: TaskCommands, ctx: &Context) -> Result<i32, TrackerError> {
    let mirror = client::open(&ctx.config)?;
    match cmd {
        TaskCommands::Add { description, position, progress, project } => {
            let new_task = NewTask {
                id: Some(ulid::Ulid::new().to_string()),
                description,
                position,
                progress,
                project_id: project,
            };
            run_add(&mirror, new_task, ctx)
        }
        TaskCommands::List => run_list(&mirror, ctx),
        TaskCommands::Update { id, description, position, progress, project, no_project } => {
            let project_id = if no_project { Some(None) } else { project.map(Some) };
            let patch = TaskPatch { description, position, progress, project_id };
            run_update(&mirror, &id, patch, ctx)
        }
        TaskCommands::Delete { id } => run_delete(&mirror, &id, ctx),
    }
}

fn resolve_task_id(mirror: &LocalMirror, reference: &str) -> Result<String, TrackerError> {
    let tasks = mirror.tasks();
    resolve_id(tasks.iter().map(|t| t.id.as_str()), reference, TrackerError::task_not_found)
}

fn print_task(verb: &str, task: &Task, mirror: &LocalMirror, ctx: &Context) {
    if ctx.json_output {
        print_json(&output::json::success(json!({
            "task": output::json::task_json(task, &mirror.projects()),
            "queued": mirror.queue().len()
        })));
    } else {
        println!("{verb} task: {} ({}) at position {}", task.description, task.id, task.position);
    }
}

fn run_add(mirror: &LocalMirror, new_task: NewTask, ctx: &Context) -> Result<i32, TrackerError> {
    let id = new_task.id.clone().unwrap_or_default();
    let tasks = mirror.add_task(new_task)?;
    let task = tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| TrackerError::task_not_found(&id))?;
    print_task("Added", task, mirror, ctx);
    Ok(0)
}

fn run_list(mirror: &LocalMirror, ctx: &Context) -> Result<i32, TrackerError> {
    let tasks = mirror.tasks();
    let projects = mirror.projects();
    if ctx.json_output {
        print_json(&output::json::success(json!({
            "tasks": output::json::tasks_json(&tasks, &projects)
        })));
    } else {
        output::text::print_task_list(&tasks, &projects);
    }
    Ok(0)
}

fn run_update(
    mirror: &LocalMirror,
    reference: &str,
    patch: TaskPatch,
    ctx: &Context,
) -> Result<i32, TrackerError> {
    let id = resolve_task_id(mirror, reference)?;
    let tasks = mirror.update_task(&id, patch)?;
    let task = tasks
        .iter()
        .find(|t| t.id == id)
        .ok_or_else(|| TrackerError::task_not_found(&id))?;
    print_task("Updated", task, mirror, ctx);
    Ok(0)
}

fn run_delete(mirror: &LocalMirror, reference: &str, ctx: &Context) -> Result<i32, TrackerError> {
    let id = resolve_task_id(mirror, reference)?;
    let tasks = mirror.delete_task(&id)?;
    if ctx.json_output {
        print_json(&output::json::success(json!({
            "deleted": id,
            "remaining": tasks.len(),
            "queued": mirror.queue().len()
        })));
    } else {
        println!("Deleted task {id}");
    }
    Ok(0)
}
