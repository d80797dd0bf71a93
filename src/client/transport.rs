//! Transport port used by the delivery driver, plus the live HTTP adapter.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;

use crate::error::TrackerError;

/// Boxed future type alias used by [`Transport`] to keep the trait dyn-compatible.
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, TrackerError>> + Send + 'a>>;

/// A fully received response. `status == 0` means no connection was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one queued request.
pub trait Transport: Send + Sync {
    /// Issues a GET for `url` (path plus query) and reads the whole body.
    ///
    /// # Errors
    ///
    /// `TRANSIENT_NETWORK` when no response arrived, `CORRUPTED_RESPONSE`
    /// when the body could not be read to the end.
    fn send(&self, url: &str) -> TransportFuture<'_>;
}

/// Live transport over `reqwest`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, url: &str) -> TransportFuture<'_> {
        let target = format!("{}{}", self.base_url, url);

        Box::pin(async move {
            let response = self
                .client
                .get(&target)
                .send()
                .await
                .map_err(|e| TrackerError::transient_network(format!("Request to {target} failed: {e}")))?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|e| {
                TrackerError::corrupted_response(format!("Incomplete response from {target}: {e}"))
            })?;

            Ok(TransportResponse { status, body })
        })
    }
}
