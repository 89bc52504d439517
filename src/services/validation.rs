use serde_json::Value;
use validator::ValidateEmail;

use super::{RecordError, RecordResult};
use crate::utils::json::{classify, FieldValue};

/// Trims the input and drops it when nothing is left.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_owned)
}

pub fn check_email(email: &str) -> RecordResult<()> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(RecordError::invalid(format!("email {email:?} is not valid")))
    }
}

pub fn check_length(field: &str, value: &str, max: usize) -> RecordResult<()> {
    if value.chars().count() > max {
        return Err(RecordError::invalid(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(())
}

/// Reads a text key from a partial-update body, skipping falsy values.
///
/// Whitespace-only strings are skipped too; truthy non-strings are rejected.
pub fn truthy_text(body: &Value, field: &str) -> RecordResult<Option<String>> {
    let value = classify(body.get(field));
    if value.is_falsy() {
        return Ok(None);
    }
    match value {
        FieldValue::String(text) => Ok(non_blank(Some(text))),
        other => Err(RecordError::invalid(format!(
            "{field} must be a string, got {}",
            other.kind()
        ))),
    }
}

/// Reads a boolean key that applies whenever it is present, `false` included.
pub fn present_bool(body: &Value, field: &str) -> RecordResult<Option<bool>> {
    let value = classify(body.get(field));
    if !value.is_present() {
        return Ok(None);
    }
    match value {
        FieldValue::Bool(value) => Ok(Some(value)),
        other => Err(RecordError::invalid(format!(
            "{field} must be a boolean, got {}",
            other.kind()
        ))),
    }
}

pub fn ensure_object(body: &Value) -> RecordResult<()> {
    if body.is_object() {
        Ok(())
    } else {
        Err(RecordError::invalid("request body must be a JSON object"))
    }
}
