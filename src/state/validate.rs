//! Structural validation of candidate session documents.
//!
//! Runs on every read (decides whether backup recovery is needed) and
//! immediately before every write (rejects malformed mutations before they
//! reach disk). Cross-field business rules stay with callers.

use chrono::DateTime;
use serde_json::Value;

use crate::error::{DuoError, Result};
use crate::session::SessionState;

/// Top-level fields a session document must carry. `update_field` also
/// uses this to reject unknown field names before touching the document.
pub const SESSION_FIELDS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "status",
    "current_task",
    "complexity",
    "assigned_agent",
    "architectural_design",
    "review_verdict",
    "repair_attempts",
];

const STATUS_VALUES: &[&str] = &["active", "completed", "archived"];
const COMPLEXITY_VALUES: &[&str] = &["simple", "complex"];
const VERDICT_VALUES: &[&str] = &["approved", "needs_repair", "rejected"];

pub fn is_session_field(name: &str) -> bool {
    SESSION_FIELDS.contains(&name)
}

/// Validate a candidate document against the fixed session schema.
pub fn validate(doc: &Value) -> Result<()> {
    let Some(obj) = doc.as_object() else {
        return Err(DuoError::Validation(
            "document is not a JSON object".to_string(),
        ));
    };

    let mut errors = Vec::new();

    for field in SESSION_FIELDS {
        if !obj.contains_key(*field) {
            errors.push(format!("missing field: {}", field));
        }
    }

    check_nonempty_string(obj.get("id"), "id", &mut errors);
    check_timestamp(obj.get("created_at"), "created_at", &mut errors);
    check_timestamp(obj.get("updated_at"), "updated_at", &mut errors);
    check_enum(obj.get("status"), "status", STATUS_VALUES, false, &mut errors);
    check_string(obj.get("current_task"), "current_task", &mut errors);
    check_enum(
        obj.get("complexity"),
        "complexity",
        COMPLEXITY_VALUES,
        false,
        &mut errors,
    );
    check_nonempty_string(obj.get("assigned_agent"), "assigned_agent", &mut errors);
    check_enum(
        obj.get("review_verdict"),
        "review_verdict",
        VERDICT_VALUES,
        true,
        &mut errors,
    );

    match obj.get("architectural_design") {
        None => {}
        Some(Value::Object(_)) => {}
        Some(_) => errors.push("architectural_design must be an object".to_string()),
    }

    match obj.get("repair_attempts") {
        None => {}
        Some(v) if v.as_u64().is_some() => {}
        Some(_) => errors.push("repair_attempts must be a non-negative integer".to_string()),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(DuoError::Validation(errors.join("; ")))
    }
}

/// Validate a typed state by round-tripping through its document form.
pub fn validate_state(state: &SessionState) -> Result<()> {
    validate(&serde_json::to_value(state)?)
}

/// Parse raw file contents into a validated `SessionState`.
pub fn parse_document(raw: &str) -> Result<SessionState> {
    let doc: Value = serde_json::from_str(raw)?;
    validate(&doc)?;
    Ok(serde_json::from_value(doc)?)
}

fn check_string(value: Option<&Value>, field: &str, errors: &mut Vec<String>) {
    if let Some(v) = value
        && !v.is_string()
    {
        errors.push(format!("{} must be a string", field));
    }
}

fn check_nonempty_string(value: Option<&Value>, field: &str, errors: &mut Vec<String>) {
    match value {
        None => {}
        Some(Value::String(s)) if !s.is_empty() => {}
        Some(Value::String(_)) => errors.push(format!("{} must not be empty", field)),
        Some(_) => errors.push(format!("{} must be a string", field)),
    }
}

fn check_timestamp(value: Option<&Value>, field: &str, errors: &mut Vec<String>) {
    match value {
        None => {}
        Some(Value::String(s)) if DateTime::parse_from_rfc3339(s).is_ok() => {}
        Some(_) => errors.push(format!("{} must be an RFC 3339 timestamp", field)),
    }
}

fn check_enum(
    value: Option<&Value>,
    field: &str,
    allowed: &[&str],
    nullable: bool,
    errors: &mut Vec<String>,
) {
    match value {
        None => {}
        Some(Value::Null) if nullable => {}
        Some(Value::String(s)) if allowed.contains(&s.as_str()) => {}
        Some(_) => errors.push(format!(
            "{} must be one of: {}",
            field,
            allowed.join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_doc() -> Value {
        serde_json::to_value(SessionState::new("task", "claude")).unwrap()
    }

    #[test]
    fn test_fresh_session_is_valid() {
        assert!(validate(&valid_doc()).is_ok());
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(validate(&json!([1, 2, 3])).is_err());
        assert!(validate(&json!("state")).is_err());
    }

    #[test]
    fn test_rejects_missing_field() {
        let mut doc = valid_doc();
        doc.as_object_mut().unwrap().remove("current_task");

        let err = validate(&doc).unwrap_err();
        assert!(err.to_string().contains("missing field: current_task"));
    }

    #[test]
    fn test_rejects_bad_enum_values() {
        let mut doc = valid_doc();
        doc["complexity"] = json!("medium");
        assert!(validate(&doc).is_err());

        let mut doc = valid_doc();
        doc["status"] = json!("running");
        assert!(validate(&doc).is_err());

        let mut doc = valid_doc();
        doc["review_verdict"] = json!("maybe");
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_null_verdict_allowed() {
        let mut doc = valid_doc();
        doc["review_verdict"] = Value::Null;
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn test_rejects_negative_repair_attempts() {
        let mut doc = valid_doc();
        doc["repair_attempts"] = json!(-1);
        assert!(validate(&doc).is_err());

        let mut doc = valid_doc();
        doc["repair_attempts"] = json!(2.5);
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_rejects_empty_id_and_agent() {
        let mut doc = valid_doc();
        doc["id"] = json!("");
        assert!(validate(&doc).is_err());

        let mut doc = valid_doc();
        doc["assigned_agent"] = json!(42);
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_rejects_scalar_design_section() {
        let mut doc = valid_doc();
        doc["architectural_design"] = json!("notes");
        assert!(validate(&doc).is_err());
    }

    #[test]
    fn test_collects_multiple_errors() {
        let mut doc = valid_doc();
        doc["status"] = json!("running");
        doc["repair_attempts"] = json!(-3);

        let msg = validate(&doc).unwrap_err().to_string();
        assert!(msg.contains("status"));
        assert!(msg.contains("repair_attempts"));
    }

    #[test]
    fn test_parse_document_rejects_garbage() {
        assert!(parse_document("{ not json").is_err());
        assert!(parse_document("{}").is_err());
    }
}
