//! Durable request queue.
//!
//! Every enqueue rewrites the whole persisted queue before returning, so a
//! restarted client picks up exactly the requests that were never confirmed.
//! Entries leave the queue only through [`RequestQueue::complete`], which the
//! delivery driver calls once a request has succeeded or failed for good.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::client::storage::{self, LocalStore, QUEUE_KEY};
use crate::error::TrackerError;
use crate::models::{compose_url, QueuedRequest};

/// Completion handler. Receives the parsed response body (`None` for an
/// empty body) or the permanent failure.
pub type Completion = Box<dyn FnOnce(Result<Option<Value>, TrackerError>) + Send>;

pub struct RequestSpec {
    path: String,
    params: Vec<(String, Value)>,
    tail: bool,
    callback: Option<Completion>,
}

impl RequestSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
            tail: false,
            callback: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Let every non-tail request queued ahead of or behind this one go first.
    pub fn tail(mut self) -> Self {
        self.tail = true;
        self
    }

    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Result<Option<Value>, TrackerError>) + Send + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }
}

#[derive(Default)]
struct QueueState {
    entries: Vec<QueuedRequest>,
    callbacks: HashMap<String, Completion>,
}

#[derive(Clone)]
pub struct RequestQueue {
    store: Arc<dyn LocalStore>,
    state: Arc<Mutex<QueueState>>,
    wake: Arc<Notify>,
}

impl RequestQueue {
    /// Opens the queue over `store`, rehydrating undelivered entries.
    /// Rehydrated entries have no callbacks until [`Self::attach`] gives
    /// them one.
    pub fn open(store: Arc<dyn LocalStore>) -> Result<Self, TrackerError> {
        let entries: Vec<QueuedRequest> = storage::load_list(store.as_ref(), QUEUE_KEY)?;
        if !entries.is_empty() {
            tracing::info!(pending = entries.len(), "resuming persisted request queue");
        }
        let queue = Self {
            store,
            state: Arc::new(Mutex::new(QueueState {
                entries,
                callbacks: HashMap::new(),
            })),
            wake: Arc::new(Notify::new()),
        };
        if !queue.is_empty() {
            queue.wake.notify_one();
        }
        Ok(queue)
    }

    pub fn enqueue(&self, spec: RequestSpec) -> Result<String, TrackerError> {
        let url = compose_url(&spec.path, &spec.params)?;
        let entry = QueuedRequest {
            id: ulid::Ulid::new().to_string(),
            url,
            tail: spec.tail,
        };
        let id = entry.id.clone();

        {
            let mut state = self.state.lock();
            state.entries.push(entry);
            if let Err(e) = storage::save_list(self.store.as_ref(), QUEUE_KEY, &state.entries) {
                state.entries.pop();
                return Err(e);
            }
            if let Some(callback) = spec.callback {
                state.callbacks.insert(id.clone(), callback);
            }
        }

        tracing::debug!(id = %id, tail = spec.tail, "request enqueued");
        self.wake.notify_one();
        Ok(id)
    }

    /// Snapshot of the undelivered entries in their current order.
    pub fn pending(&self) -> Vec<QueuedRequest> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets the completion handler of a pending entry that has none.
    /// Returns whether it was attached.
    pub fn attach(&self, id: &str, callback: Completion) -> bool {
        let mut state = self.state.lock();
        if !state.entries.iter().any(|e| e.id == id) || state.callbacks.contains_key(id) {
            return false;
        }
        state.callbacks.insert(id.to_string(), callback);
        true
    }

    /// Picks the entry to deliver next, rotating tail entries behind pending
    /// non-tail ones. The entry stays queued until [`Self::complete`].
    pub(crate) fn next_entry(&self) -> Result<Option<QueuedRequest>, TrackerError> {
        let mut state = self.state.lock();
        if rotate_tail_entries(&mut state.entries) {
            storage::save_list(self.store.as_ref(), QUEUE_KEY, &state.entries)?;
        }
        Ok(state.entries.first().cloned())
    }

    /// Removes a delivered (or permanently failed) entry and runs its
    /// callback outside the queue lock. If the removal cannot be saved the
    /// entry stays queued and will be delivered again.
    pub(crate) fn complete(
        &self,
        id: &str,
        result: Result<Option<Value>, TrackerError>,
    ) -> Result<(), TrackerError> {
        let callback = {
            let mut state = self.state.lock();
            let before = state.entries.clone();
            state.entries.retain(|e| e.id != id);
            if state.entries.len() != before.len() {
                if let Err(e) = storage::save_list(self.store.as_ref(), QUEUE_KEY, &state.entries) {
                    state.entries = before;
                    return Err(e);
                }
            }
            state.callbacks.remove(id)
        };
        if let Some(callback) = callback {
            callback(result);
        }
        Ok(())
    }

    /// Resolves once something has been enqueued since the last wait.
    pub(crate) async fn wait_for_work(&self) {
        self.wake.notified().await;
    }
}

/// Moves tail entries at the front behind the rest while any non-tail entry
/// is waiting. Returns whether the order changed.
fn rotate_tail_entries(entries: &mut Vec<QueuedRequest>) -> bool {
    let mut rotated = false;
    while entries.first().is_some_and(|head| head.tail) && entries.iter().any(|e| !e.tail) {
        let head = entries.remove(0);
        entries.push(head);
        rotated = true;
    }
    rotated
}
