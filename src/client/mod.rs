//! Offline-tolerant client: local mirror, durable request queue and the
//! driver that delivers it.

pub mod driver;
pub mod mirror;
pub mod queue;
pub mod storage;
pub mod transport;

use std::sync::Arc;

use crate::config::Config;
use crate::error::TrackerError;

use self::driver::DeliveryDriver;
use self::mirror::LocalMirror;
use self::queue::RequestQueue;
use self::storage::{LocalStore, SqliteStore};
use self::transport::HttpTransport;

/// Opens the mirror and queue over the client database in the data dir.
pub fn open(config: &Config) -> Result<LocalMirror, TrackerError> {
    let path = config.client_db_path();
    if !path.exists() {
        return Err(TrackerError::not_initialized());
    }
    let store: Arc<dyn LocalStore> = Arc::new(SqliteStore::open(&path)?);
    let queue = RequestQueue::open(store.clone())?;
    LocalMirror::open(store, queue)
}

/// Driver delivering `queue` to the configured server over HTTP.
pub fn http_driver(
    config: &Config,
    queue: RequestQueue,
) -> Result<DeliveryDriver<HttpTransport>, TrackerError> {
    let transport = HttpTransport::new(config.server_url.clone(), config.request_timeout())?;
    Ok(DeliveryDriver::new(queue, transport, config.retry_policy()))
}
