//! Record operations for the user directory and the protocol tracker.
//!
//! Every operation runs on a borrowed `PgConnection` and leaves uniqueness
//! and referential integrity to Postgres; constraint violations come back
//! translated into [`RecordError`] variants.

use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind};
use thiserror::Error;

pub mod protocols;
pub mod users;
pub mod validation;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("{message}")]
    Validation { message: String, errors: Vec<String> },
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

impl RecordError {
    pub fn invalid(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Validation {
            errors: vec![message.clone()],
            message,
        }
    }

    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::Validation {
            message: format!("required fields: {}", fields.join(", ")),
            errors: fields
                .iter()
                .map(|field| format!("{field} is required"))
                .collect(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Maps a failed INSERT/UPDATE onto the record taxonomy.
pub(crate) fn translate_write_error(err: diesel::result::Error) -> RecordError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, ref info) => {
            RecordError::Conflict(conflict_message(info.as_ref()).to_string())
        }
        diesel::result::Error::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            RecordError::NotFound("user not found")
        }
        other => RecordError::Database(other),
    }
}

/// Escapes LIKE metacharacters and wraps the text for a substring match.
pub(crate) fn like_pattern(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len() + 2);
    escaped.push('%');
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn conflict_message(info: &dyn DatabaseErrorInformation) -> &'static str {
    conflict_message_for(info.constraint_name())
}

fn conflict_message_for(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "email already registered",
        Some("users_registration_id_key") => "registration id already registered",
        Some("protocols_protocol_number_key") => "protocol number already exists",
        _ => "record already exists",
    }
}
