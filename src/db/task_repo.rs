use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::connection::in_transaction;
use crate::error::TrackerError;
use crate::models::{NewTask, Task, TaskPatch};
use crate::position::{self, Shift};

const TASK_COLUMNS: &str = "id, description, position, progress, progress_done_on, project_id";

pub fn list_tasks(conn: &Connection) -> Result<Vec<Task>, TrackerError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks ORDER BY position ASC, rowid ASC"
    ))?;
    let tasks = stmt
        .query_map([], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

pub fn get_task_by_id(conn: &Connection, id: &str) -> Result<Task, TrackerError> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => TrackerError::task_not_found(id),
        _ => TrackerError::from(e),
    })
}

pub fn count_tasks(conn: &Connection) -> Result<usize, TrackerError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM tasks", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// SQL form of [`position::shift_positions`].
pub fn shift_positions(conn: &Connection, shift: Shift) -> Result<usize, TrackerError> {
    let changed = conn.execute(
        "UPDATE tasks SET position = position + ?3
         WHERE position >= ?1 AND (?2 IS NULL OR position <= ?2)",
        params![shift.start, shift.end, shift.delta],
    )?;
    Ok(changed)
}

/// Inserts a task at its requested position (append when absent), making
/// room for it first.
pub fn create_task(conn: &Connection, new_task: NewTask) -> Result<Task, TrackerError> {
    new_task.validate()?;
    let id = new_task
        .id
        .clone()
        .unwrap_or_else(|| ulid::Ulid::new().to_string());

    in_transaction(conn, |conn| {
        let exists = conn
            .query_row("SELECT 1 FROM tasks WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            return Err(TrackerError::validation(format!("Task id already exists: {id}")));
        }

        let at = position::clamp_insert(new_task.position, count_tasks(conn)?);
        shift_positions(conn, position::insert_shift(at))?;
        let task = new_task.into_task(id.clone(), at, Utc::now());
        conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                task.id,
                task.description,
                task.position,
                task.progress,
                task.progress_done_on,
                task.project_id
            ],
        )?;
        Ok(task)
    })
}

/// Applies `patch`; a position change moves the task and shifts the block
/// between its old and new slot.
pub fn update_task(conn: &Connection, id: &str, patch: &TaskPatch) -> Result<Task, TrackerError> {
    patch.validate()?;

    in_transaction(conn, |conn| {
        let mut task = get_task_by_id(conn, id)?;

        if let Some(requested) = patch.position {
            let to = position::clamp_move(requested, count_tasks(conn)?);
            if let Some(shift) = position::move_shift(task.position, to) {
                shift_positions(conn, shift)?;
            }
            task.position = to;
        }
        task.apply_patch(patch, Utc::now());

        conn.execute(
            "UPDATE tasks SET description = ?2, position = ?3, progress = ?4,
                    progress_done_on = ?5, project_id = ?6
             WHERE id = ?1",
            params![
                task.id,
                task.description,
                task.position,
                task.progress,
                task.progress_done_on,
                task.project_id
            ],
        )?;
        Ok(task)
    })
}

pub fn delete_task(conn: &Connection, id: &str) -> Result<(), TrackerError> {
    in_transaction(conn, |conn| {
        let task = get_task_by_id(conn, id)?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
        shift_positions(conn, position::delete_shift(task.position))?;
        Ok(())
    })
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        description: row.get(1)?,
        position: row.get(2)?,
        progress: row.get(3)?,
        progress_done_on: row.get(4)?,
        project_id: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::open_in_memory;
    use crate::error::ErrorCode;
    use proptest::prelude::*;

    fn seed(conn: &Connection, ids: &[&str]) {
        for id in ids {
            let mut t = NewTask::new(format!("task {id}"));
            t.id = Some(id.to_string());
            create_task(conn, t).unwrap();
        }
    }

    fn layout(conn: &Connection) -> Vec<(String, i64)> {
        list_tasks(conn)
            .unwrap()
            .into_iter()
            .map(|t| (t.id, t.position))
            .collect()
    }

    fn pairs(expected: &[(&str, i64)]) -> Vec<(String, i64)> {
        expected.iter().map(|(id, p)| (id.to_string(), *p)).collect()
    }

    #[test]
    fn insert_in_the_middle() {
        let conn = open_in_memory().unwrap();
        seed(&conn, &["a", "b"]);
        let mut c = NewTask::new("task c");
        c.id = Some("c".into());
        c.position = Some(1);
        create_task(&conn, c).unwrap();
        assert_eq!(layout(&conn), pairs(&[("a", 0), ("c", 1), ("b", 2)]));
    }

    #[test]
    fn move_forward_and_back() {
        let conn = open_in_memory().unwrap();
        seed(&conn, &["a", "b", "c", "d"]);
        let patch = TaskPatch { position: Some(2), ..TaskPatch::default() };
        update_task(&conn, "a", &patch).unwrap();
        assert_eq!(layout(&conn), pairs(&[("b", 0), ("c", 1), ("a", 2), ("d", 3)]));

        let patch = TaskPatch { position: Some(0), ..TaskPatch::default() };
        update_task(&conn, "d", &patch).unwrap();
        assert_eq!(layout(&conn), pairs(&[("d", 0), ("b", 1), ("c", 2), ("a", 3)]));
    }

    #[test]
    fn delete_closes_gap() {
        let conn = open_in_memory().unwrap();
        seed(&conn, &["a", "b", "c"]);
        delete_task(&conn, "b").unwrap();
        assert_eq!(layout(&conn), pairs(&[("a", 0), ("c", 1)]));
    }

    #[test]
    fn missing_task_is_not_found() {
        let conn = open_in_memory().unwrap();
        assert_eq!(delete_task(&conn, "x").unwrap_err().code, ErrorCode::TaskNotFound);
        let patch = TaskPatch { description: Some("y".into()), ..TaskPatch::default() };
        assert_eq!(update_task(&conn, "x", &patch).unwrap_err().code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn duplicate_id_leaves_positions_untouched() {
        let conn = open_in_memory().unwrap();
        seed(&conn, &["a", "b"]);
        let mut dup = NewTask::new("again");
        dup.id = Some("a".into());
        dup.position = Some(0);
        assert!(create_task(&conn, dup).is_err());
        assert_eq!(layout(&conn), pairs(&[("a", 0), ("b", 1)]));
    }

    #[test]
    fn progress_done_on_round_trips() {
        let conn = open_in_memory().unwrap();
        seed(&conn, &["a"]);
        let patch = TaskPatch { progress: Some(1.0), ..TaskPatch::default() };
        let updated = update_task(&conn, "a", &patch).unwrap();
        let stored = get_task_by_id(&conn, "a").unwrap();
        assert!(stored.progress_done_on.is_some());
        assert_eq!(stored.progress_done_on, updated.progress_done_on);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert(Option<i64>),
        Delete(usize),
        Move(usize, i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::option::of(-2i64..12).prop_map(Op::Insert),
            (0usize..12).prop_map(Op::Delete),
            (0usize..12, 0i64..12).prop_map(|(i, p)| Op::Move(i, p)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn stored_positions_stay_dense(ops in prop::collection::vec(op(), 1..40)) {
            let conn = open_in_memory().unwrap();
            for (n, op) in ops.into_iter().enumerate() {
                let ids: Vec<String> = list_tasks(&conn).unwrap().into_iter().map(|t| t.id).collect();
                match op {
                    Op::Insert(at) => {
                        let mut t = NewTask::new(format!("task {n}"));
                        t.id = Some(format!("t{n}"));
                        t.position = at;
                        create_task(&conn, t).unwrap();
                    }
                    Op::Delete(i) if !ids.is_empty() => {
                        delete_task(&conn, &ids[i % ids.len()]).unwrap();
                    }
                    Op::Move(i, p) if !ids.is_empty() => {
                        let patch = TaskPatch { position: Some(p), ..TaskPatch::default() };
                        update_task(&conn, &ids[i % ids.len()], &patch).unwrap();
                    }
                    _ => {}
                }
                let tasks = list_tasks(&conn).unwrap();
                prop_assert!(position::is_dense(&tasks), "not dense after step {}: {:?}", n,
                    tasks.iter().map(|t| (&t.id, t.position)).collect::<Vec<_>>());
            }
        }
    }
}
