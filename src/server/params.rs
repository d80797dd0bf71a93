//! Query parameters carry JSON text, one value per key.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::TrackerError;
use crate::models::coerce;

pub type QueryParams = HashMap<String, String>;

/// Decodes the JSON value of a required parameter.
pub fn required_json(params: &QueryParams, name: &str) -> Result<Value, TrackerError> {
    let raw = params
        .get(name)
        .ok_or_else(|| TrackerError::missing_parameter(name))?;
    serde_json::from_str(raw)
        .map_err(|e| TrackerError::validation(format!("Malformed parameter {name}: {e}")))
}

/// A required id parameter, e.g. `taskId="01H..."`.
pub fn required_id(params: &QueryParams, name: &str) -> Result<String, TrackerError> {
    let value = required_json(params, name)?;
    coerce::required_text(name, Some(&value))
}
