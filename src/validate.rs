//! Schema checks on extracted model replies.
//!
//! Validation failures are distinct from extraction failures so the
//! pipeline's retry policy can tell "no JSON at all" apart from "JSON of
//! the wrong shape". A count mismatch against the requested number of
//! tasks/subtasks is advisory only - the caller logs it and keeps going.

use serde_json::Value;

/// Structure was present but does not match the expected reply shape.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("decomposition reply has no `tasks` array")]
    MissingTasksArray,
    #[error("subtask reply is not an array (got {0})")]
    NotAnArray(&'static str),
}

/// Advisory comparison between what was requested and what came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountCheck {
    pub returned: usize,
    pub requested: usize,
}

impl CountCheck {
    pub fn mismatch(&self) -> bool {
        self.returned != self.requested
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate a decomposition reply: an object carrying a `tasks` array.
pub fn validate_batch(value: &Value, requested: usize) -> Result<CountCheck, ValidationError> {
    let tasks = value
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or(ValidationError::MissingTasksArray)?;

    Ok(CountCheck {
        returned: tasks.len(),
        requested,
    })
}

/// Validate a subtask reply: the value itself must be an array.
pub fn validate_subtasks(value: &Value, requested: usize) -> Result<CountCheck, ValidationError> {
    let items = value
        .as_array()
        .ok_or_else(|| ValidationError::NotAnArray(kind_of(value)))?;

    Ok(CountCheck {
        returned: items.len(),
        requested,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_requires_tasks_array() {
        let err = validate_batch(&json!({"result": []}), 3).unwrap_err();
        assert!(matches!(err, ValidationError::MissingTasksArray));

        let err = validate_batch(&json!({"tasks": "oops"}), 3).unwrap_err();
        assert!(matches!(err, ValidationError::MissingTasksArray));
    }

    #[test]
    fn test_batch_count_mismatch_is_advisory() {
        let reply = json!({"tasks": [{"id": 1}, {"id": 2}]});
        let check = validate_batch(&reply, 5).unwrap();
        assert!(check.mismatch());
        assert_eq!(check.returned, 2);
    }

    #[test]
    fn test_subtasks_must_be_array() {
        let err = validate_subtasks(&json!({"subtasks": []}), 2).unwrap_err();
        assert!(matches!(err, ValidationError::NotAnArray("object")));
    }

    #[test]
    fn test_subtasks_exact_count_passes_clean() {
        let check = validate_subtasks(&json!([{"id": 1}, {"id": 2}]), 2).unwrap();
        assert!(!check.mismatch());
    }
}
