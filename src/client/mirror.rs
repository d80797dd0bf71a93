//! Local mirror of the server's tasks and projects.
//!
//! Mutations land here first, synchronously, and are then queued for the
//! server. A refresh is queued as a tail request and overwrites the local
//! list with whatever the server returns.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::api;
use crate::client::queue::{RequestQueue, RequestSpec};
use crate::client::storage::{self, LocalStore, PROJECTS_KEY, TASKS_KEY};
use crate::error::TrackerError;
use crate::models::{NewProject, NewTask, Project, ProjectPatch, Task, TaskPatch};
use crate::position;

#[derive(Debug, Default)]
struct Snapshot {
    tasks: Vec<Task>,
    projects: Vec<Project>,
}

#[derive(Clone)]
pub struct LocalMirror {
    store: Arc<dyn LocalStore>,
    queue: RequestQueue,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl LocalMirror {
    pub fn open(store: Arc<dyn LocalStore>, queue: RequestQueue) -> Result<Self, TrackerError> {
        let mut tasks: Vec<Task> = storage::load_list(store.as_ref(), TASKS_KEY)?;
        position::sort(&mut tasks);
        let projects = storage::load_list(store.as_ref(), PROJECTS_KEY)?;
        let mirror = Self {
            store,
            queue,
            snapshot: Arc::new(Mutex::new(Snapshot { tasks, projects })),
        };
        mirror.reattach_refreshes();
        Ok(mirror)
    }

    /// Refreshes left in the queue by an earlier session lost their
    /// callbacks; give them back so their responses still land locally.
    fn reattach_refreshes(&self) {
        for entry in self.queue.pending() {
            let key = match entry.url.split('?').next() {
                Some(api::GET_TASKS) => TASKS_KEY,
                Some(api::GET_PROJECTS) => PROJECTS_KEY,
                _ => continue,
            };
            self.queue
                .attach(&entry.id, Box::new(self.refresh_handler(key)));
        }
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Tasks sorted by position.
    pub fn tasks(&self) -> Vec<Task> {
        self.snapshot.lock().tasks.clone()
    }

    pub fn projects(&self) -> Vec<Project> {
        self.snapshot.lock().projects.clone()
    }

    pub fn add_task(&self, new_task: NewTask) -> Result<Vec<Task>, TrackerError> {
        new_task.validate()?;
        let mut snapshot = self.snapshot.lock();
        let id = match new_task.id.clone() {
            Some(id) if snapshot.tasks.iter().any(|t| t.id == id) => {
                return Err(TrackerError::validation(format!("Task id already exists: {id}")));
            }
            Some(id) => id,
            None => ulid::Ulid::new().to_string(),
        };
        let previous = snapshot.tasks.clone();
        let requested = new_task.position;
        let task = new_task.into_task(id.clone(), 0, Utc::now());
        position::insert(&mut snapshot.tasks, task, requested);
        let placed = find(&snapshot.tasks, &id).and_then(|task| Ok(serde_json::to_value(task)?));
        let request = match placed {
            Ok(task) => RequestSpec::new(api::ADD_TASK).param("newTask", task),
            Err(e) => {
                snapshot.tasks = previous;
                return Err(e);
            }
        };
        self.commit(TASKS_KEY, &mut snapshot.tasks, previous, request)?;
        Ok(snapshot.tasks.clone())
    }

    pub fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Vec<Task>, TrackerError> {
        patch.validate()?;
        let mut sent = patch.clone();
        let mut snapshot = self.snapshot.lock();
        let index = index_of(&snapshot.tasks, id)?;
        let previous = snapshot.tasks.clone();
        if let Some(requested) = patch.position {
            sent.position = Some(position::move_to(&mut snapshot.tasks, index, requested));
        }
        let index = index_of(&snapshot.tasks, id)?;
        snapshot.tasks[index].apply_patch(&patch, Utc::now());

        let request = RequestSpec::new(api::UPDATE_TASK)
            .param("taskId", id)
            .param("properties", sent.to_properties());
        self.commit(TASKS_KEY, &mut snapshot.tasks, previous, request)?;
        Ok(snapshot.tasks.clone())
    }

    pub fn delete_task(&self, id: &str) -> Result<Vec<Task>, TrackerError> {
        let mut snapshot = self.snapshot.lock();
        let index = index_of(&snapshot.tasks, id)?;
        let previous = snapshot.tasks.clone();
        position::remove(&mut snapshot.tasks, index);

        let request = RequestSpec::new(api::DELETE_TASK).param("taskId", id);
        self.commit(TASKS_KEY, &mut snapshot.tasks, previous, request)?;
        Ok(snapshot.tasks.clone())
    }

    pub fn add_project(&self, new_project: NewProject) -> Result<Vec<Project>, TrackerError> {
        new_project.validate()?;
        let mut snapshot = self.snapshot.lock();
        let id = match new_project.id.clone() {
            Some(id) if snapshot.projects.iter().any(|p| p.id == id) => {
                return Err(TrackerError::validation(format!("Project id already exists: {id}")));
            }
            Some(id) => id,
            None => ulid::Ulid::new().to_string(),
        };
        let previous = snapshot.projects.clone();
        let project = new_project.into_project(id);
        let request = RequestSpec::new(api::ADD_PROJECT)
            .param("newProject", serde_json::to_value(&project)?);
        snapshot.projects.push(project);

        self.commit(PROJECTS_KEY, &mut snapshot.projects, previous, request)?;
        Ok(snapshot.projects.clone())
    }

    pub fn update_project(&self, id: &str, patch: ProjectPatch) -> Result<Vec<Project>, TrackerError> {
        patch.validate()?;
        let mut snapshot = self.snapshot.lock();
        let previous = snapshot.projects.clone();
        snapshot
            .projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| TrackerError::project_not_found(id))?
            .apply_patch(&patch);

        let request = RequestSpec::new(api::UPDATE_PROJECT)
            .param("projectId", id)
            .param("properties", patch.to_properties());
        self.commit(PROJECTS_KEY, &mut snapshot.projects, previous, request)?;
        Ok(snapshot.projects.clone())
    }

    /// Tasks pointing at the project keep their (now dangling) `projectId`.
    pub fn delete_project(&self, id: &str) -> Result<Vec<Project>, TrackerError> {
        let mut snapshot = self.snapshot.lock();
        let previous = snapshot.projects.clone();
        snapshot.projects.retain(|p| p.id != id);
        if snapshot.projects.len() == previous.len() {
            return Err(TrackerError::project_not_found(id));
        }

        let request = RequestSpec::new(api::DELETE_PROJECT).param("projectId", id);
        self.commit(PROJECTS_KEY, &mut snapshot.projects, previous, request)?;
        Ok(snapshot.projects.clone())
    }

    /// Persists the already-changed `list` and queues its server request.
    /// When either step fails `list` is put back to `previous`, in memory
    /// and on disk, so no local change survives without its request.
    ///
    /// Called with the snapshot lock held; the queue lock is always taken
    /// after it.
    fn commit<T: Serialize>(
        &self,
        key: &str,
        list: &mut Vec<T>,
        previous: Vec<T>,
        request: RequestSpec,
    ) -> Result<(), TrackerError> {
        if let Err(e) = storage::save_list(self.store.as_ref(), key, list) {
            *list = previous;
            return Err(e);
        }
        if let Err(e) = self.queue.enqueue(request) {
            *list = previous;
            if let Err(restore) = storage::save_list(self.store.as_ref(), key, list) {
                tracing::error!(key, error = %restore, "failed to restore local state after enqueue failure");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Queues a tail fetch of all tasks; on success the local list is
    /// replaced by the server's.
    pub fn refresh_tasks(&self) -> Result<String, TrackerError> {
        self.queue
            .enqueue(RequestSpec::new(api::GET_TASKS).tail().on_complete(self.refresh_handler(TASKS_KEY)))
    }

    /// Queues a tail fetch of all projects.
    pub fn refresh_projects(&self) -> Result<String, TrackerError> {
        self.queue.enqueue(
            RequestSpec::new(api::GET_PROJECTS)
                .tail()
                .on_complete(self.refresh_handler(PROJECTS_KEY)),
        )
    }

    /// The handler lives in the queue, so it holds the snapshot weakly; a
    /// mirror dropped before the response arrives is not kept alive by it.
    fn refresh_handler(
        &self,
        key: &'static str,
    ) -> impl FnOnce(Result<Option<Value>, TrackerError>) + Send + 'static {
        let snapshot = Arc::downgrade(&self.snapshot);
        let store = self.store.clone();
        move |result| match snapshot.upgrade() {
            Some(snapshot) => replace_from(&snapshot, store.as_ref(), result, key),
            None => tracing::debug!(key, "mirror closed, refresh result discarded"),
        }
    }
}

fn replace_from(
    snapshot: &Mutex<Snapshot>,
    store: &dyn LocalStore,
    result: Result<Option<Value>, TrackerError>,
    key: &str,
) {
    let outcome = result.and_then(|body| {
        let body = body.unwrap_or(Value::Array(Vec::new()));
        let mut snapshot = snapshot.lock();
        if key == TASKS_KEY {
            let mut tasks: Vec<Task> = serde_json::from_value(body)?;
            position::sort(&mut tasks);
            storage::save_list(store, TASKS_KEY, &tasks)?;
            snapshot.tasks = tasks;
        } else {
            let projects: Vec<Project> = serde_json::from_value(body)?;
            storage::save_list(store, PROJECTS_KEY, &projects)?;
            snapshot.projects = projects;
        }
        Ok(())
    });
    match outcome {
        Ok(()) => tracing::debug!(key, "local mirror refreshed from server"),
        Err(error) => tracing::warn!(key, error = %error, "refresh failed, keeping local state"),
    }
}

fn index_of(tasks: &[Task], id: &str) -> Result<usize, TrackerError> {
    tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| TrackerError::task_not_found(id))
}

fn find<'a>(tasks: &'a [Task], id: &str) -> Result<&'a Task, TrackerError> {
    index_of(tasks, id).map(|i| &tasks[i])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{MemoryStore, QUEUE_KEY};
    use crate::error::ErrorCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose queue writes can be switched off.
    #[derive(Default)]
    struct QueueFailingStore {
        inner: MemoryStore,
        fail_queue: AtomicBool,
    }

    impl LocalStore for QueueFailingStore {
        fn load(&self, key: &str) -> Result<Option<String>, TrackerError> {
            self.inner.load(key)
        }

        fn save(&self, key: &str, value: &str) -> Result<(), TrackerError> {
            if key == QUEUE_KEY && self.fail_queue.load(Ordering::SeqCst) {
                return Err(TrackerError::storage("disk full"));
            }
            self.inner.save(key, value)
        }
    }

    fn mirror() -> (Arc<MemoryStore>, LocalMirror) {
        let store = Arc::new(MemoryStore::new());
        let queue = RequestQueue::open(store.clone()).unwrap();
        let mirror = LocalMirror::open(store.clone(), queue).unwrap();
        (store, mirror)
    }

    fn add(mirror: &LocalMirror, id: &str) {
        let mut t = NewTask::new(format!("task {id}"));
        t.id = Some(id.into());
        mirror.add_task(t).unwrap();
    }

    fn order(tasks: &[Task]) -> Vec<(&str, i64)> {
        tasks.iter().map(|t| (t.id.as_str(), t.position)).collect()
    }

    fn complete_all(queue: &RequestQueue, body: Option<Value>) {
        while let Some(entry) = queue.next_entry().unwrap() {
            queue.complete(&entry.id, Ok(body.clone())).unwrap();
        }
    }

    #[test]
    fn mutations_apply_locally_and_queue_requests() {
        let (_, mirror) = mirror();
        add(&mirror, "a");
        add(&mirror, "b");
        let mut c = NewTask::new("task c");
        c.id = Some("c".into());
        c.position = Some(1);
        let tasks = mirror.add_task(c).unwrap();
        assert_eq!(order(&tasks), vec![("a", 0), ("c", 1), ("b", 2)]);

        let urls: Vec<String> = mirror.queue().pending().into_iter().map(|e| e.url).collect();
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| u.starts_with(api::ADD_TASK)));
    }

    #[test]
    fn move_and_delete_keep_positions_dense() {
        let (_, mirror) = mirror();
        for id in ["a", "b", "c", "d"] {
            add(&mirror, id);
        }
        let patch = TaskPatch { position: Some(2), ..TaskPatch::default() };
        let tasks = mirror.update_task("a", patch).unwrap();
        assert_eq!(order(&tasks), vec![("b", 0), ("c", 1), ("a", 2), ("d", 3)]);

        let tasks = mirror.delete_task("c").unwrap();
        assert_eq!(order(&tasks), vec![("b", 0), ("a", 1), ("d", 2)]);
    }

    #[test]
    fn update_sends_clamped_position() {
        let (_, mirror) = mirror();
        add(&mirror, "a");
        add(&mirror, "b");
        let patch = TaskPatch { position: Some(10), ..TaskPatch::default() };
        mirror.update_task("a", patch).unwrap();
        let last = mirror.queue().pending().pop().unwrap();
        assert!(last.url.contains("%22position%22%3A1"), "{}", last.url);
    }

    #[test]
    fn unknown_id_fails_without_queueing() {
        let (_, mirror) = mirror();
        let patch = TaskPatch { progress: Some(1.0), ..TaskPatch::default() };
        let err = mirror.update_task("missing", patch).unwrap_err();
        assert_eq!(err.code, ErrorCode::TaskNotFound);
        assert_eq!(mirror.delete_task("missing").unwrap_err().code, ErrorCode::TaskNotFound);
        assert_eq!(
            mirror.delete_project("missing").unwrap_err().code,
            ErrorCode::ProjectNotFound
        );
        assert!(mirror.queue().is_empty());
    }

    #[test]
    fn validation_happens_before_anything_is_queued() {
        let (_, mirror) = mirror();
        assert!(mirror.add_task(NewTask::new("  ")).is_err());
        add(&mirror, "a");
        let err = mirror.update_task("a", TaskPatch::default()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(mirror.queue().len(), 1);
    }

    #[test]
    fn progress_to_done_stamps_locally() {
        let (_, mirror) = mirror();
        add(&mirror, "a");
        let patch = TaskPatch { progress: Some(1.0), ..TaskPatch::default() };
        let tasks = mirror.update_task("a", patch).unwrap();
        assert!(tasks[0].progress_done_on.is_some());
    }

    #[test]
    fn refresh_overwrites_local_state() {
        let (store, mirror) = mirror();
        add(&mirror, "local-only");
        complete_all(mirror.queue(), None);

        mirror.refresh_tasks().unwrap();
        let server_tasks = json!([
            { "id": "s2", "description": "two", "position": 1, "progress": 0.0,
              "progressDoneOn": null, "projectId": null },
            { "id": "s1", "description": "one", "position": 0, "progress": 0.0,
              "progressDoneOn": null, "projectId": null }
        ]);
        complete_all(mirror.queue(), Some(server_tasks));

        let ids: Vec<String> = mirror.tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["s1", "s2"]);

        let reopened = LocalMirror::open(store.clone(), RequestQueue::open(store).unwrap()).unwrap();
        assert_eq!(reopened.tasks().len(), 2);
    }

    #[test]
    fn refresh_survives_reopen() {
        let (store, mirror) = mirror();
        mirror.refresh_projects().unwrap();
        drop(mirror);

        let queue = RequestQueue::open(store.clone()).unwrap();
        let reopened = LocalMirror::open(store, queue).unwrap();
        let server_projects = json!([
            { "id": "p1", "name": "Home", "tags": ["home"], "color": "green" }
        ]);
        complete_all(reopened.queue(), Some(server_projects));
        assert_eq!(reopened.projects().len(), 1);
    }

    #[test]
    fn refresh_is_queued_behind_writes() {
        let (_, mirror) = mirror();
        mirror.refresh_projects().unwrap();
        mirror
            .add_project(NewProject {
                id: Some("p1".into()),
                name: "Home".into(),
                tags: vec!["home".into()],
                color: "green".into(),
            })
            .unwrap();
        let head = mirror.queue().next_entry().unwrap().unwrap();
        assert!(head.url.starts_with(api::ADD_PROJECT));
    }

    #[test]
    fn project_lifecycle() {
        let (_, mirror) = mirror();
        mirror
            .add_project(NewProject {
                id: Some("p1".into()),
                name: "Home".into(),
                tags: vec!["home".into()],
                color: "green".into(),
            })
            .unwrap();
        let patch = ProjectPatch { color: Some("red".into()), ..ProjectPatch::default() };
        let projects = mirror.update_project("p1", patch).unwrap();
        assert_eq!(projects[0].color, "red");
        assert!(mirror.delete_project("p1").unwrap().is_empty());
        assert_eq!(mirror.queue().len(), 3);
    }

    #[test]
    fn failed_enqueue_leaves_no_local_change_behind() {
        let store = Arc::new(QueueFailingStore::default());
        let queue = RequestQueue::open(store.clone()).unwrap();
        let mirror = LocalMirror::open(store.clone(), queue).unwrap();
        add(&mirror, "a");
        mirror
            .add_project(NewProject {
                id: Some("p1".into()),
                name: "Home".into(),
                tags: vec!["home".into()],
                color: "green".into(),
            })
            .unwrap();
        store.fail_queue.store(true, Ordering::SeqCst);

        let err = mirror.delete_task("a").unwrap_err();
        assert_eq!(err.code, ErrorCode::StorageError);
        let patch = TaskPatch { position: Some(0), description: Some("b".into()), ..TaskPatch::default() };
        assert!(mirror.update_task("a", patch).is_err());
        let mut extra = NewTask::new("task x");
        extra.position = Some(0);
        assert!(mirror.add_task(extra).is_err());
        assert!(mirror.delete_project("p1").is_err());

        assert_eq!(order(&mirror.tasks()), vec![("a", 0)]);
        assert_eq!(mirror.tasks()[0].description, "task a");
        assert_eq!(mirror.projects().len(), 1);

        let reopened =
            LocalMirror::open(store.clone(), RequestQueue::open(store.clone()).unwrap()).unwrap();
        assert_eq!(order(&reopened.tasks()), vec![("a", 0)]);
        assert_eq!(reopened.projects().len(), 1);
        assert_eq!(reopened.queue().len(), 2);
    }

    #[test]
    fn pending_refresh_does_not_keep_mirror_alive() {
        let (_, mirror) = mirror();
        mirror.refresh_tasks().unwrap();
        let queue = mirror.queue().clone();
        let snapshot = Arc::downgrade(&mirror.snapshot);
        drop(mirror);
        assert!(snapshot.upgrade().is_none());

        // Delivering the orphaned refresh is harmless.
        complete_all(&queue, Some(json!([])));
        assert!(queue.is_empty());
    }
}
