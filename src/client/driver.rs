//! Delivery driver: sends queued requests one at a time, in order.
//!
//! ```text
//! Idle -> Sending -> Completed        -> Idle (next entry)
//!                 -> PermanentFailure -> Idle (next entry)
//!                 -> RetryScheduled   -> Sending (same entry, after a delay)
//! ```
//!
//! The next entry is only picked once the current one is fully resolved, so a
//! request whose response was lost or mangled is retried before anything
//! queued after it reaches the server.

use std::time::Duration;

use serde_json::Value;

use crate::client::queue::RequestQueue;
use crate::client::transport::{Transport, TransportResponse};
use crate::error::{ErrorCode, TrackerError};
use crate::models::QueuedRequest;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CORRUPTED_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before resending after a connectivity failure or 0/502/503.
    pub connectivity: Duration,
    /// Delay before resending after an unparsable response body.
    pub corrupted: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connectivity: DEFAULT_RETRY_DELAY,
            corrupted: DEFAULT_CORRUPTED_RETRY_DELAY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Sending,
    Completed,
    RetryScheduled,
    PermanentFailure,
}

impl DriverState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::RetryScheduled => "retry_scheduled",
            Self::PermanentFailure => "permanent_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(Option<Value>),
    Retry { error: TrackerError, delay: Duration },
    PermanentFailure(TrackerError),
}

impl Outcome {
    pub fn state(&self) -> DriverState {
        match self {
            Self::Completed(_) => DriverState::Completed,
            Self::Retry { .. } => DriverState::RetryScheduled,
            Self::PermanentFailure(_) => DriverState::PermanentFailure,
        }
    }
}

/// Maps one delivery attempt to the driver's next move.
pub fn classify(result: Result<TransportResponse, TrackerError>, policy: &RetryPolicy) -> Outcome {
    let response = match result {
        Ok(response) => response,
        Err(error) => {
            let error = if error.code.is_retryable() {
                error
            } else {
                TrackerError::transient_network(error.message)
            };
            let delay = if error.code == ErrorCode::CorruptedResponse {
                policy.corrupted
            } else {
                policy.connectivity
            };
            return Outcome::Retry { error, delay };
        }
    };

    match response.status {
        0 | 502 | 503 => Outcome::Retry {
            error: TrackerError::transient_network(format!(
                "Server unavailable (status {})",
                response.status
            )),
            delay: policy.connectivity,
        },
        200..=299 => {
            if response.body.trim().is_empty() {
                return Outcome::Completed(None);
            }
            match serde_json::from_str::<Value>(&response.body) {
                Ok(value) => Outcome::Completed(Some(value)),
                Err(e) => Outcome::Retry {
                    error: TrackerError::corrupted_response(format!("Unparsable response body: {e}")),
                    delay: policy.corrupted,
                },
            }
        }
        status => Outcome::PermanentFailure(TrackerError::permanent_server(
            status,
            error_message(&response.body),
        )),
    }
}

/// Message from a server error body. A `{code, message}` body with a known
/// code keeps the code in front of the message.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };
    let message = value.get("message").and_then(Value::as_str);
    let code = value
        .get("code")
        .and_then(Value::as_str)
        .and_then(ErrorCode::from_str);
    match (code, message) {
        (Some(code), Some(message)) => format!("{}: {message}", code.as_str()),
        (None, Some(message)) => message.to_string(),
        _ => body.trim().to_string(),
    }
}

/// Totals from a [`DeliveryDriver::drain`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub delivered: usize,
    pub failed: usize,
    pub pending: usize,
    /// Set when the run stopped on a retryable failure.
    pub stalled_on: Option<TrackerError>,
}

pub struct DeliveryDriver<T: Transport> {
    queue: RequestQueue,
    transport: T,
    policy: RetryPolicy,
    state: DriverState,
    current: Option<QueuedRequest>,
}

impl<T: Transport> DeliveryDriver<T> {
    pub fn new(queue: RequestQueue, transport: T, policy: RetryPolicy) -> Self {
        Self {
            queue,
            transport,
            policy,
            state: DriverState::Idle,
            current: None,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The entry being delivered or awaiting a retry.
    pub fn current(&self) -> Option<&QueuedRequest> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Makes one delivery attempt. Returns `None` when there is nothing to
    /// send. A retry outcome keeps the entry as the current one; the caller
    /// decides how long to wait before the next step.
    pub async fn step(&mut self) -> Result<Option<Outcome>, TrackerError> {
        let entry = match self.current.clone() {
            Some(entry) => entry,
            None => match self.queue.next_entry()? {
                Some(entry) => {
                    self.current = Some(entry.clone());
                    entry
                }
                None => {
                    self.state = DriverState::Idle;
                    return Ok(None);
                }
            },
        };

        self.state = DriverState::Sending;
        tracing::debug!(id = %entry.id, url = %entry.url, "sending request");
        let result = self.transport.send(&entry.url).await;
        let outcome = classify(result, &self.policy);
        self.state = outcome.state();

        match &outcome {
            Outcome::Completed(value) => {
                tracing::debug!(id = %entry.id, "request delivered");
                self.finish(&entry, Ok(value.clone()))?;
            }
            Outcome::PermanentFailure(error) => {
                tracing::warn!(id = %entry.id, url = %entry.url, error = %error, "dropping request after permanent failure");
                self.finish(&entry, Err(error.clone()))?;
            }
            Outcome::Retry { error, delay } => {
                tracing::info!(
                    id = %entry.id,
                    code = error.code.as_str(),
                    delay_ms = delay.as_millis() as u64,
                    "delivery failed, will retry"
                );
            }
        }
        Ok(Some(outcome))
    }

    fn finish(
        &mut self,
        entry: &QueuedRequest,
        result: Result<Option<Value>, TrackerError>,
    ) -> Result<(), TrackerError> {
        self.queue.complete(&entry.id, result)?;
        self.current = None;
        self.state = DriverState::Idle;
        Ok(())
    }

    /// Delivers until the queue is empty. With `wait == false` the run stops
    /// at the first retryable failure, leaving that entry at the head; with
    /// `wait == true` it sleeps out the retry delay and keeps going.
    pub async fn drain(&mut self, wait: bool) -> Result<DrainReport, TrackerError> {
        let mut report = DrainReport::default();
        while let Some(outcome) = self.step().await? {
            match outcome {
                Outcome::Completed(_) => report.delivered += 1,
                Outcome::PermanentFailure(_) => report.failed += 1,
                Outcome::Retry { error, delay } => {
                    if wait {
                        tokio::time::sleep(delay).await;
                    } else {
                        report.stalled_on = Some(error);
                        break;
                    }
                }
            }
        }
        report.pending = self.queue.len();
        Ok(report)
    }

    /// Runs forever, sleeping while the queue is empty and waking on enqueue.
    /// A local storage failure is logged and the step retried after the
    /// short retry delay.
    pub async fn run(mut self) {
        loop {
            match self.step().await {
                Ok(Some(Outcome::Retry { delay, .. })) => tokio::time::sleep(delay).await,
                Ok(Some(_)) => {}
                Ok(None) => self.queue.wait_for_work().await,
                Err(error) => {
                    tracing::error!(
                        code = error.code.as_str(),
                        error = %error,
                        state = self.state.as_str(),
                        "local queue storage failed, backing off"
                    );
                    tokio::time::sleep(self.policy.corrupted).await;
                }
            }
        }
    }
}
