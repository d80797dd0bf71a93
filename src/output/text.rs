use crate::client::driver::DrainReport;
use crate::models::{project_for_description, Project, QueuedRequest, Task};

fn short(id: &str) -> &str {
    &id[..std::cmp::min(8, id.len())]
}

pub fn print_task_list(tasks: &[Task], projects: &[Project]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    for t in tasks {
        let done = if t.is_done() { "x" } else { " " };
        let tag = project_for_description(projects, &t.description)
            .map(|p| format!(" <{}:{}>", p.name, p.color))
            .unwrap_or_default();
        println!(
            "  {:>3}. [{done}] {} ({}) {:.0}%{tag}",
            t.position,
            t.description,
            short(&t.id),
            t.progress * 100.0
        );
    }
}

pub fn print_project_list(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    for p in projects {
        println!(
            "  {} ({}) [{}] tags: {}",
            p.name,
            short(&p.id),
            p.color,
            p.tags.join(", ")
        );
    }
}

pub fn print_queue(entries: &[QueuedRequest]) {
    if entries.is_empty() {
        println!("Queue is empty.");
        return;
    }
    for (i, e) in entries.iter().enumerate() {
        let tail = if e.tail { " (tail)" } else { "" };
        println!("  {}. {}{tail}", i + 1, e.url);
    }
}

pub fn print_report(r: &DrainReport) {
    println!(
        "Delivered {}, failed {}, pending {}",
        r.delivered, r.failed, r.pending
    );
    if let Some(ref e) = r.stalled_on {
        println!("Stopped: {} ({})", e.message, e.code.as_str());
    }
}
