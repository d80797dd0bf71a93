use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TrackerError;

/// Everything except RFC 3986 unreserved characters gets escaped.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A pending outbound request as it is persisted in the local store.
/// Completion callbacks live only in memory and are not part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedRequest {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub tail: bool,
}

/// Builds `path?k1=v1&k2=v2` where every value is serialized as JSON text and
/// then percent-encoded.
pub fn compose_url(path: &str, params: &[(String, Value)]) -> Result<String, TrackerError> {
    if path.trim().is_empty() {
        return Err(TrackerError::invalid_request("Request url must not be empty"));
    }
    let mut url = path.to_string();
    for (i, (key, value)) in params.iter().enumerate() {
        if key.is_empty() {
            return Err(TrackerError::invalid_request("Request parameter name must not be empty"));
        }
        let json = serde_json::to_string(value)?;
        url.push(if i == 0 && !path.contains('?') { '?' } else { '&' });
        url.extend(utf8_percent_encode(key, QUERY_VALUE));
        url.push('=');
        url.extend(utf8_percent_encode(&json, QUERY_VALUE));
    }
    Ok(url)
}
