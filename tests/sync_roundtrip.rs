//! Client and server wired together in-process: the mirror queues requests,
//! the driver delivers them through the real router.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::Router;
use parking_lot::Mutex;
use serde_json::json;
use tower::ServiceExt;

use tasktrack::api;
use tasktrack::client::driver::{DeliveryDriver, RetryPolicy};
use tasktrack::client::mirror::LocalMirror;
use tasktrack::client::queue::{RequestQueue, RequestSpec};
use tasktrack::client::storage::{LocalStore, SqliteStore};
use tasktrack::client::transport::{Transport, TransportFuture, TransportResponse};
use tasktrack::db::connection;
use tasktrack::error::{ErrorCode, TrackerError};
use tasktrack::models::{NewTask, TaskPatch};
use tasktrack::server::{router, AppState};

struct RouterTransport {
    app: Router,
    offline: Arc<AtomicBool>,
}

impl Transport for RouterTransport {
    fn send(&self, url: &str) -> TransportFuture<'_> {
        let app = self.app.clone();
        let offline = self.offline.load(Ordering::SeqCst);
        let url = url.to_string();
        Box::pin(async move {
            if offline {
                return Err(TrackerError::transient_network("offline"));
            }
            let request = Request::builder().uri(url).body(Body::empty()).unwrap();
            let response = app.oneshot(request).await.unwrap();
            let status = response.status().as_u16();
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            Ok(TransportResponse::new(status, String::from_utf8_lossy(&bytes)))
        })
    }
}

struct Harness {
    mirror: LocalMirror,
    driver: DeliveryDriver<RouterTransport>,
    offline: Arc<AtomicBool>,
}

fn harness() -> Harness {
    let app = router(AppState::new(connection::open_in_memory().unwrap()));
    let store: Arc<dyn LocalStore> = Arc::new(SqliteStore::in_memory().unwrap());
    let queue = RequestQueue::open(store.clone()).unwrap();
    let mirror = LocalMirror::open(store, queue.clone()).unwrap();
    let offline = Arc::new(AtomicBool::new(false));
    let transport = RouterTransport { app, offline: offline.clone() };
    let policy = RetryPolicy {
        connectivity: Duration::from_secs(300),
        corrupted: Duration::from_millis(50),
    };
    Harness {
        mirror,
        driver: DeliveryDriver::new(queue, transport, policy),
        offline,
    }
}

fn add(mirror: &LocalMirror, id: &str, position: Option<i64>) {
    let mut t = NewTask::new(format!("task {id}"));
    t.id = Some(id.into());
    t.position = position;
    mirror.add_task(t).unwrap();
}

fn ids(mirror: &LocalMirror) -> Vec<String> {
    mirror.tasks().into_iter().map(|t| t.id).collect()
}

#[tokio::test]
async fn offline_edits_reach_server_once_connected() {
    let mut h = harness();
    h.offline.store(true, Ordering::SeqCst);
    add(&h.mirror, "a", None);
    add(&h.mirror, "b", None);
    add(&h.mirror, "c", None);

    let report = h.driver.drain(false).await.unwrap();
    assert_eq!(report.delivered, 0);
    assert_eq!(report.pending, 3);
    assert_eq!(report.stalled_on.unwrap().code, ErrorCode::TransientNetwork);

    h.offline.store(false, Ordering::SeqCst);
    h.mirror.refresh_tasks().unwrap();
    add(&h.mirror, "d", Some(0));
    let report = h.driver.drain(false).await.unwrap();
    assert_eq!(report.delivered, 5);
    assert_eq!(report.pending, 0);

    // The refresh ran last, so the mirror now holds the server's view.
    assert_eq!(ids(&h.mirror), vec!["d", "a", "b", "c"]);
    let positions: Vec<i64> = h.mirror.tasks().iter().map(|t| t.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn local_and_server_order_agree_after_moves() {
    let mut h = harness();
    for id in ["a", "b", "c", "d", "e"] {
        add(&h.mirror, id, None);
    }
    let patch = TaskPatch { position: Some(3), ..TaskPatch::default() };
    h.mirror.update_task("a", patch).unwrap();
    let patch = TaskPatch { position: Some(99), ..TaskPatch::default() };
    h.mirror.update_task("c", patch).unwrap();
    h.mirror.delete_task("b").unwrap();
    let local = ids(&h.mirror);

    h.mirror.refresh_tasks().unwrap();
    h.driver.drain(false).await.unwrap();
    assert_eq!(ids(&h.mirror), local);
}

#[tokio::test]
async fn rejected_request_is_dropped_and_reported() {
    let mut h = harness();
    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    h.mirror
        .queue()
        .enqueue(
            RequestSpec::new(api::DELETE_TASK)
                .param("taskId", "ghost")
                .on_complete(move |result| *slot.lock() = Some(result)),
        )
        .unwrap();
    add(&h.mirror, "a", None);

    let report = h.driver.drain(false).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 1);

    let result = seen.lock().take().expect("callback ran");
    let err = result.unwrap_err();
    assert_eq!(err.code, ErrorCode::PermanentServer);
    assert!(err.message.contains("404"), "{}", err.message);
}

#[tokio::test]
async fn projects_refresh_from_server() {
    let mut h = harness();
    h.mirror
        .queue()
        .enqueue(RequestSpec::new(api::ADD_PROJECT).param(
            "newProject",
            json!({ "id": "p9", "name": "Server side", "tags": ["srv"], "color": "blue" }),
        ))
        .unwrap();
    h.mirror.refresh_projects().unwrap();
    h.driver.drain(false).await.unwrap();

    let projects = h.mirror.projects();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].id, "p9");
}
