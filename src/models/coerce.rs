//! Coercion from loosely-typed JSON (decoded query parameters, CLI input) to
//! the typed fields of [`Task`](super::Task) and [`Project`](super::Project).

use serde_json::Value;

use crate::error::TrackerError;

/// Text field. Numbers and booleans that arrive where text was expected are
/// turned back into their textual form.
pub fn text(field: &str, value: &Value) -> Result<String, TrackerError> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return Err(TrackerError::validation(format!("{field} must be text"))),
    };
    Ok(s)
}

/// Text field that must contain something other than whitespace.
pub fn required_text(field: &str, value: Option<&Value>) -> Result<String, TrackerError> {
    let value = value.ok_or_else(|| TrackerError::validation(format!("{field} is required")))?;
    let s = text(field, value)?;
    if s.trim().is_empty() {
        return Err(TrackerError::validation(format!("{field} must not be empty")));
    }
    Ok(s)
}

/// Absent and `null` both map to `None`.
pub fn optional_text(field: &str, value: Option<&Value>) -> Result<Option<String>, TrackerError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => text(field, v).map(Some),
    }
}

pub fn number(field: &str, value: &Value) -> Result<f64, TrackerError> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
        .ok_or_else(|| TrackerError::validation(format!("{field} must be a number")))
}

pub fn position(value: &Value) -> Result<i64, TrackerError> {
    let n = number("position", value)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(TrackerError::validation(
            "position must be a non-negative integer",
        ));
    }
    Ok(n as i64)
}

pub fn progress(value: &Value) -> Result<f64, TrackerError> {
    let n = number("progress", value)?;
    if !(0.0..=1.0).contains(&n) {
        return Err(TrackerError::validation("progress must be between 0 and 1"));
    }
    Ok(n)
}

pub fn tags(value: Option<&Value>) -> Result<Vec<String>, TrackerError> {
    let Some(Value::Array(items)) = value else {
        return Err(TrackerError::validation("tags must be a list"));
    };
    if items.is_empty() {
        return Err(TrackerError::validation("tags must not be empty"));
    }
    items
        .iter()
        .map(|item| required_text("tag", Some(item)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn degenerate_text_becomes_string() {
        assert_eq!(text("description", &json!(42)).unwrap(), "42");
        assert_eq!(text("description", &json!(true)).unwrap(), "true");
        assert!(text("description", &json!([1])).is_err());
    }

    #[test]
    fn numeric_strings_coerce_for_position_and_progress() {
        assert_eq!(position(&json!("3")).unwrap(), 3);
        assert_eq!(position(&json!(2)).unwrap(), 2);
        assert!((progress(&json!("0.5")).unwrap() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(position(&json!(-1)).is_err());
        assert!(position(&json!(1.5)).is_err());
        assert!(progress(&json!(1.2)).is_err());
        assert!(progress(&json!("abc")).is_err());
    }

    #[test]
    fn required_text_rejects_blank() {
        assert!(required_text("name", None).is_err());
        assert!(required_text("name", Some(&json!("  "))).is_err());
        assert_eq!(required_text("name", Some(&json!("x"))).unwrap(), "x");
    }

    #[test]
    fn tags_must_be_a_non_empty_list_of_text() {
        assert_eq!(tags(Some(&json!(["a", "b"]))).unwrap(), vec!["a", "b"]);
        assert!(tags(Some(&json!([]))).is_err());
        assert!(tags(Some(&json!("a"))).is_err());
        assert!(tags(Some(&json!(["a", ""]))).is_err());
    }
}
